//! Ledger domain errors

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use core_kernel::{AccountingPeriod, Currency, MoneyError, PortError, TemporalError};

use crate::store::StoreError;

/// Errors that can occur in the ledger domain
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed input to a ledger call
    #[error("Validation error: {0}")]
    Validation(String),

    /// Debits and credits of an entry differ (base currency amounts)
    #[error("Unbalanced entry: debits={debits}, credits={credits}")]
    Imbalance {
        debits: Decimal,
        credits: Decimal,
    },

    /// Illegal state transition
    #[error("Invalid state: {0}")]
    State(String),

    /// The target accounting period is closed
    #[error("Accounting period {period} is locked")]
    PeriodLocked {
        period: AccountingPeriod,
    },

    /// A posting rule references an account that is not configured
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Entity already exists
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Account still has active children
    #[error("Account {0} has active child accounts")]
    HasChildren(String),

    /// Account is referenced by journal lines
    #[error("Account {0} is referenced by journal lines")]
    InUse(String),

    /// No exchange rate known for the requested date
    #[error("No {currency} rate available for {date}")]
    RateUnavailable {
        currency: Currency,
        date: NaiveDate,
    },

    /// Backend failure in a storage or rate adapter
    #[error("Storage error: {0}")]
    Storage(#[from] PortError),
}

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation(message.into())
    }

    pub fn state(message: impl Into<String>) -> Self {
        LedgerError::State(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        LedgerError::Configuration(message.into())
    }

    pub fn not_found(entity: &str, id: impl std::fmt::Display) -> Self {
        LedgerError::NotFound(format!("{} {}", entity, id))
    }

    /// Returns true if the failure was caused by a closed period
    pub fn is_period_locked(&self) -> bool {
        matches!(self, LedgerError::PeriodLocked { .. })
    }

    /// Returns true if retrying the same call may succeed without any correction
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Storage(e) if e.is_transient())
    }
}

impl From<MoneyError> for LedgerError {
    fn from(err: MoneyError) -> Self {
        LedgerError::Validation(err.to_string())
    }
}

impl From<TemporalError> for LedgerError {
    fn from(err: TemporalError) -> Self {
        LedgerError::Validation(err.to_string())
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(what) => LedgerError::Duplicate(what),
            StoreError::NotFound(what) => LedgerError::NotFound(what),
            StoreError::PeriodLocked(period) => LedgerError::PeriodLocked { period },
            StoreError::StatusConflict { entry_id, expected, found } => LedgerError::State(format!(
                "entry {} is {}, expected {}",
                entry_id, found, expected
            )),
            StoreError::InUse(what) => LedgerError::InUse(what),
            StoreError::Unbalanced { entry_id, .. } => {
                LedgerError::State(format!("lines of entry {} changed while posting", entry_id))
            }
            StoreError::Backend(e) => LedgerError::Storage(e),
        }
    }
}
