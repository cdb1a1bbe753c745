//! Test Utilities for the Ledger Core
//!
//! Shared testing infrastructure:
//!
//! - **Fixtures**: pre-built dates, money, documents and a seeded ledger
//! - **Builders**: business events with sensible defaults
//! - **Database**: PostgreSQL containers for adapter tests
//! - **Assertions**: ledger-specific checks with readable failures
//! - **Generators**: proptest strategies for amounts and balanced line sets
//!
//! # Usage
//!
//! ```rust,ignore
//! use test_utils::{fixtures::*, builders::*};
//!
//! let ledger = LedgerFixtures::seeded().await;
//! let invoice = SaleInvoiceBuilder::new().with_amounts(dec!(1000), dec!(200)).build();
//! ```

pub mod assertions;
pub mod builders;
pub mod database;
pub mod fixtures;
pub mod generators;
pub mod logging;

pub use assertions::*;
pub use builders::*;
pub use database::*;
pub use fixtures::*;
pub use generators::*;
pub use logging::init_tracing;
