//! Currency conversion at posting time
//!
//! Rates are quoted as base currency units per one unit of the foreign
//! currency. Conversions round half away from zero to the base currency's
//! minor unit.

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use core_kernel::{Currency, DomainPort, Money, MoneyError, PortError};

use crate::error::LedgerError;

/// Port to an external exchange rate feed
#[async_trait]
pub trait RateSource: DomainPort {
    /// Rate valid on exactly `date`, if the feed knows one
    async fn get_rate(&self, currency: Currency, date: NaiveDate) -> Result<Option<Decimal>, PortError>;
}

/// Converts a foreign amount to the base currency at the given rate
pub fn to_base(amount: &Money, rate: Decimal, base: Currency) -> Result<Money, MoneyError> {
    let converted = amount
        .amount()
        .checked_mul(rate)
        .ok_or(MoneyError::Overflow)?;
    Ok(Money::new(converted, base).round_to_currency())
}

/// In-memory rate table
#[derive(Debug, Default, Clone)]
pub struct StaticRateTable {
    rates: HashMap<(Currency, NaiveDate), Decimal>,
}

impl StaticRateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(mut self, currency: Currency, date: NaiveDate, rate: Decimal) -> Self {
        self.rates.insert((currency, date), rate);
        self
    }

    pub fn insert(&mut self, currency: Currency, date: NaiveDate, rate: Decimal) {
        self.rates.insert((currency, date), rate);
    }
}

impl DomainPort for StaticRateTable {}

#[async_trait]
impl RateSource for StaticRateTable {
    async fn get_rate(&self, currency: Currency, date: NaiveDate) -> Result<Option<Decimal>, PortError> {
        Ok(self.rates.get(&(currency, date)).copied())
    }
}

/// A converted amount together with the rate that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conversion {
    pub original: Money,
    pub rate: Decimal,
    pub base: Money,
}

/// Currency converter backed by a rate source
#[derive(Clone)]
pub struct CurrencyConverter {
    base: Currency,
    source: Arc<dyn RateSource>,
    lookback_days: u32,
}

impl CurrencyConverter {
    pub fn new(base: Currency, source: Arc<dyn RateSource>) -> Self {
        Self {
            base,
            source,
            lookback_days: 0,
        }
    }

    /// Accept the most recent rate up to `days` before the requested date
    pub fn with_lookback(mut self, days: u32) -> Self {
        self.lookback_days = days;
        self
    }

    pub fn base_currency(&self) -> Currency {
        self.base
    }

    /// Rate for converting `currency` to the base currency on `date`
    ///
    /// # Errors
    ///
    /// Returns `RateUnavailable` if no rate is known within the look-back
    /// window, `Validation` if the feed returns a non-positive rate.
    pub async fn rate(&self, currency: Currency, date: NaiveDate) -> Result<Decimal, LedgerError> {
        if currency == self.base {
            return Ok(Decimal::ONE);
        }

        for offset in 0..=self.lookback_days {
            let Some(day) = date.checked_sub_days(Days::new(u64::from(offset))) else {
                break;
            };
            if let Some(rate) = self.source.get_rate(currency, day).await? {
                if rate <= Decimal::ZERO {
                    return Err(LedgerError::validation(format!(
                        "rate source returned non-positive {} rate {} for {}",
                        currency, rate, day
                    )));
                }
                debug!(%currency, requested = %date, quoted = %day, %rate, "Resolved exchange rate");
                return Ok(rate);
            }
        }

        Err(LedgerError::RateUnavailable { currency, date })
    }

    /// Converts an amount at a rate already resolved for its document
    pub fn convert(&self, amount: Money, rate: Decimal) -> Result<Conversion, LedgerError> {
        let base = to_base(&amount, rate, self.base)?;
        Ok(Conversion {
            original: amount,
            rate,
            base,
        })
    }
}

impl std::fmt::Debug for CurrencyConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrencyConverter")
            .field("base", &self.base)
            .field("lookback_days", &self.lookback_days)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn converter(lookback: u32) -> CurrencyConverter {
        let table = StaticRateTable::new()
            .with_rate(Currency::USD, date(2024, 1, 15), dec!(30.1234))
            .with_rate(Currency::EUR, date(2024, 1, 15), dec!(0));
        CurrencyConverter::new(Currency::TRY, Arc::new(table)).with_lookback(lookback)
    }

    #[tokio::test]
    async fn test_base_currency_converts_at_one() {
        let converter = converter(0);
        let rate = converter.rate(Currency::TRY, date(2030, 1, 1)).await.unwrap();
        let conversion = converter.convert(Money::new(dec!(99.99), Currency::TRY), rate).unwrap();
        assert_eq!(conversion.rate, Decimal::ONE);
        assert_eq!(conversion.base.amount(), dec!(99.99));
    }

    #[tokio::test]
    async fn test_foreign_amount_rounds_half_away_from_zero() {
        let converter = converter(0);
        let rate = converter.rate(Currency::USD, date(2024, 1, 15)).await.unwrap();
        let conversion = converter.convert(Money::new(dec!(10.00), Currency::USD), rate).unwrap();
        // 10 * 30.1234 = 301.234
        assert_eq!(conversion.base, Money::new(dec!(301.23), Currency::TRY));
    }

    #[tokio::test]
    async fn test_exact_date_by_default() {
        let result = converter(0).rate(Currency::USD, date(2024, 1, 16)).await;
        assert!(matches!(
            result,
            Err(LedgerError::RateUnavailable { currency: Currency::USD, .. })
        ));
    }

    #[tokio::test]
    async fn test_lookback_uses_most_recent_rate() {
        let rate = converter(3).rate(Currency::USD, date(2024, 1, 18)).await.unwrap();
        assert_eq!(rate, dec!(30.1234));

        let result = converter(2).rate(Currency::USD, date(2024, 1, 18)).await;
        assert!(matches!(result, Err(LedgerError::RateUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_non_positive_rate_rejected() {
        let result = converter(0).rate(Currency::EUR, date(2024, 1, 15)).await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }
}
