//! PostgreSQL exchange rate source
//!
//! Reads daily rates from the `fx_rates` table. Rates are base currency
//! units per unit of the foreign currency.

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{Currency, DomainPort, HealthCheckResult, HealthCheckable, PortError};
use domain_ledger::RateSource;

use crate::error::DatabaseError;

/// Rate feed backed by the `fx_rates` table
#[derive(Debug, Clone)]
pub struct PostgresRateSource {
    pool: PgPool,
}

impl PostgresRateSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stores or replaces the rate of a currency on a date
    ///
    /// # Errors
    ///
    /// Returns `ConstraintViolation` if the rate is not positive.
    #[instrument(skip(self))]
    pub async fn upsert_rate(
        &self,
        currency: Currency,
        date: NaiveDate,
        rate: Decimal,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO fx_rates (currency, rate_date, rate) VALUES ($1, $2, $3)
            ON CONFLICT (currency, rate_date) DO UPDATE SET rate = EXCLUDED.rate
            "#,
        )
        .bind(currency.code())
        .bind(date)
        .bind(rate)
        .execute(&self.pool)
        .await?;
        debug!("Exchange rate stored");
        Ok(())
    }
}

impl DomainPort for PostgresRateSource {}

#[async_trait]
impl HealthCheckable for PostgresRateSource {
    async fn health_check(&self) -> HealthCheckResult {
        crate::health::check(&self.pool, "postgres-rate-source").await
    }
}

#[async_trait]
impl RateSource for PostgresRateSource {
    async fn get_rate(&self, currency: Currency, date: NaiveDate) -> Result<Option<Decimal>, PortError> {
        let rate: Option<Decimal> =
            sqlx::query_scalar("SELECT rate FROM fx_rates WHERE currency = $1 AND rate_date = $2")
                .bind(currency.code())
                .bind(date)
                .fetch_optional(&self.pool)
                .await
                .map_err(DatabaseError::from)?;
        Ok(rate)
    }
}
