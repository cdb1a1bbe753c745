//! Pre-built Test Fixtures
//!
//! Ready-to-use dates, amounts and ledgers. Every value is deterministic so
//! expected balances can be written down in tests.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use core_kernel::{AccountId, Currency, LedgerId, Money};
use domain_ledger::{Ledger, LedgerConfig, StandardChart, StaticRateTable};

/// Fixture for dates
pub struct DateFixtures;

impl DateFixtures {
    /// Builds a date, panicking on an invalid one
    pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid fixture date")
    }

    /// Standard document date (Jan 15, 2024)
    pub fn invoice_date() -> NaiveDate {
        Self::date(2024, 1, 15)
    }

    /// A later day in the same month
    pub fn later_in_january() -> NaiveDate {
        Self::date(2024, 1, 25)
    }

    pub fn february() -> NaiveDate {
        Self::date(2024, 2, 10)
    }

    pub fn year_start() -> NaiveDate {
        Self::date(2024, 1, 1)
    }

    pub fn year_end() -> NaiveDate {
        Self::date(2024, 12, 31)
    }
}

/// Fixture for money in the default base currency
pub struct MoneyFixtures;

impl MoneyFixtures {
    pub fn lira(amount: Decimal) -> Money {
        Money::new(amount, Currency::TRY)
    }

    pub fn try_1000() -> Money {
        Self::lira(dec!(1000))
    }

    pub fn usd_100() -> Money {
        Money::new(dec!(100), Currency::USD)
    }

    /// USD/TRY rate used by foreign currency fixtures
    pub fn usd_rate() -> Decimal {
        dec!(32.4567)
    }
}

/// Fixture for identifiers
pub struct IdFixtures;

impl IdFixtures {
    /// A deterministic ledger for single-company tests
    pub fn company() -> LedgerId {
        LedgerId::from_uuid(Uuid::from_u128(0x550e8400_e29b_41d4_a716_446655440001))
    }

    /// A second ledger for isolation tests
    pub fn other_company() -> LedgerId {
        LedgerId::from_uuid(Uuid::from_u128(0x550e8400_e29b_41d4_a716_446655440002))
    }
}

/// A ledger over the in-memory store with the standard chart seeded
pub struct SeededLedger {
    pub ledger: Ledger,
    pub company: LedgerId,
}

impl SeededLedger {
    /// Resolves an active account by code
    pub async fn account(&self, code: &str) -> AccountId {
        self.ledger
            .chart()
            .resolve(self.company, code)
            .await
            .unwrap_or_else(|e| panic!("account {} should exist: {}", code, e))
            .id
    }
}

/// Fixture for assembled ledgers
pub struct LedgerFixtures;

impl LedgerFixtures {
    /// Default configuration with a USD rate on the invoice and February dates
    pub fn rates() -> StaticRateTable {
        StaticRateTable::new()
            .with_rate(Currency::USD, DateFixtures::invoice_date(), MoneyFixtures::usd_rate())
            .with_rate(Currency::USD, DateFixtures::february(), dec!(33.0000))
    }

    /// A TRY-based in-memory ledger with the standard trading company chart
    pub async fn seeded() -> SeededLedger {
        Self::seeded_with(LedgerConfig::default(), Self::rates()).await
    }

    pub async fn seeded_with(config: LedgerConfig, rates: StaticRateTable) -> SeededLedger {
        let ledger = Ledger::in_memory(config, rates).expect("valid ledger configuration");
        let company = IdFixtures::company();
        ledger
            .chart()
            .seed(company, &StandardChart::trading_company())
            .await
            .expect("standard chart seeds");
        SeededLedger { ledger, company }
    }
}
