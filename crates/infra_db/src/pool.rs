//! Connection pool and schema migrations
//!
//! Every ledger mutation runs as one short transaction that takes a
//! transaction-scoped advisory lock, so the pool only needs to cover the
//! number of ledgers written concurrently plus readers.

use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::DatabaseError;

/// Type alias for the PostgreSQL connection pool
pub type DatabasePool = PgPool;

/// Pool settings
///
/// Durations are whole seconds so the struct deserializes from the same
/// TOML or environment sources as the ledger configuration.
///
/// # Example
///
/// ```rust
/// use infra_db::DatabaseConfig;
///
/// let config = DatabaseConfig::new("postgres://localhost/ledger")
///     .max_connections(20)
///     .statement_timeout_secs(5);
/// assert_eq!(config.min_connections, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    /// Server-side limit per statement; 0 leaves the server default
    pub statement_timeout_secs: u64,
    /// Reported in `pg_stat_activity`
    pub application_name: String,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn acquire_timeout_secs(mut self, secs: u64) -> Self {
        self.acquire_timeout_secs = secs;
        self
    }

    pub fn statement_timeout_secs(mut self, secs: u64) -> Self {
        self.statement_timeout_secs = secs;
        self
    }

    /// Reads `DATABASE_URL` and optionally `DATABASE_MAX_CONNECTIONS`
    ///
    /// # Errors
    ///
    /// Returns `ConnectionFailed` if the URL is missing or the connection
    /// count is not a number.
    pub fn from_env() -> Result<Self, DatabaseError> {
        let url = std::env::var("DATABASE_URL")
            .map_err(|_| DatabaseError::ConnectionFailed("DATABASE_URL is not set".to_string()))?;
        let mut config = Self::new(url);
        if let Ok(max) = std::env::var("DATABASE_MAX_CONNECTIONS") {
            config.max_connections = max.parse().map_err(|_| {
                DatabaseError::ConnectionFailed(format!("DATABASE_MAX_CONNECTIONS {:?} is not a number", max))
            })?;
        }
        Ok(config)
    }

    fn connect_options(&self) -> Result<PgConnectOptions, DatabaseError> {
        let mut options = PgConnectOptions::from_str(&self.url)
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?
            .application_name(&self.application_name);
        if self.statement_timeout_secs > 0 {
            let timeout = format!("{}s", self.statement_timeout_secs);
            options = options.options([("statement_timeout", timeout.as_str())]);
        }
        Ok(options)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/ledger".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            statement_timeout_secs: 0,
            application_name: "ledger-core".to_string(),
        }
    }
}

/// Creates a connection pool
///
/// # Errors
///
/// Returns `DatabaseError::ConnectionFailed` if the URL is malformed or the
/// server cannot be reached.
///
/// # Example
///
/// ```rust,ignore
/// use infra_db::{DatabaseConfig, create_pool};
///
/// let pool = create_pool(DatabaseConfig::from_env()?).await?;
/// ```
pub async fn create_pool(config: DatabaseConfig) -> Result<DatabasePool, DatabaseError> {
    info!(
        max_connections = config.max_connections,
        application_name = %config.application_name,
        "Creating database pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect_with(config.connect_options()?)
        .await
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

    info!("Database pool created");
    Ok(pool)
}

/// Creates a connection pool from a URL with default settings
pub async fn create_pool_from_url(url: &str) -> Result<DatabasePool, DatabaseError> {
    create_pool(DatabaseConfig::new(url)).await
}

/// Applies the ledger schema migrations
pub async fn run_migrations(pool: &DatabasePool) -> Result<(), DatabaseError> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    info!("Ledger schema migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_defaults() {
        let config = DatabaseConfig::new("postgres://test")
            .max_connections(50)
            .min_connections(10)
            .acquire_timeout_secs(60);

        assert_eq!(config.url, "postgres://test");
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.min_connections, 10);
        assert_eq!(config.acquire_timeout_secs, 60);
        assert_eq!(config.application_name, "ledger-core");
    }

    #[test]
    fn test_partial_settings_deserialize() {
        let config: DatabaseConfig = serde_json::from_value(serde_json::json!({
            "url": "postgres://db/ledger",
            "statement_timeout_secs": 5
        }))
        .unwrap();

        assert_eq!(config.url, "postgres://db/ledger");
        assert_eq!(config.statement_timeout_secs, 5);
        assert_eq!(config.max_connections, 10);
    }

    #[test]
    fn test_malformed_url_rejected() {
        let result = DatabaseConfig::new("not a url").connect_options();
        assert!(matches!(result, Err(DatabaseError::ConnectionFailed(_))));
    }
}
