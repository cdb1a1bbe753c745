//! Infrastructure Database Layer
//!
//! PostgreSQL adapters for the ledger core ports, built on SQLx:
//!
//! - [`PostgresLedgerStore`] implements `LedgerStore`
//! - [`PostgresRateSource`] implements `RateSource` over the `fx_rates` table
//!
//! The schema lives in the workspace `migrations/` directory and is applied
//! with [`run_migrations`].
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresLedgerStore, PostgresRateSource};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/ledger")).await?;
//! run_migrations(&pool).await?;
//!
//! let ledger = Ledger::new(
//!     LedgerConfig::load(None)?,
//!     Arc::new(PostgresLedgerStore::new(pool.clone())),
//!     Arc::new(PostgresRateSource::new(pool)),
//! )?;
//! ```

pub mod error;
mod health;
pub mod ledger_store;
pub mod pool;
pub mod rate_source;
pub mod rows;

pub use error::DatabaseError;
pub use ledger_store::PostgresLedgerStore;
pub use pool::{create_pool, create_pool_from_url, run_migrations, DatabaseConfig, DatabasePool};
pub use rate_source::PostgresRateSource;
