//! Period lock registry
//!
//! A locked accounting period refuses new POSTED entries dated inside it.
//! Locking and unlocking hold the ledger's writer guard, so a lock never
//! lands between a posting's check and its commit.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

use core_kernel::{AccountingPeriod, LedgerId, PeriodLockId};

use crate::error::LedgerError;
use crate::store::{LedgerStore, StoreError};
use crate::writers::LedgerWriters;

/// Lock record for one accounting period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodLock {
    pub id: PeriodLockId,
    pub ledger_id: LedgerId,
    pub period: AccountingPeriod,
    pub is_locked: bool,
    pub locked_at: DateTime<Utc>,
    pub locked_by: String,
}

impl PeriodLock {
    pub fn new(ledger_id: LedgerId, period: AccountingPeriod, locked_by: impl Into<String>) -> Self {
        Self {
            id: PeriodLockId::new_v7(),
            ledger_id,
            period,
            is_locked: true,
            locked_at: Utc::now(),
            locked_by: locked_by.into(),
        }
    }

    pub fn year(&self) -> i32 {
        self.period.year()
    }

    pub fn month(&self) -> u32 {
        self.period.month()
    }
}

/// Tracks which periods are closed to new postings
pub struct PeriodLockRegistry {
    store: Arc<dyn LedgerStore>,
    writers: Arc<LedgerWriters>,
}

impl PeriodLockRegistry {
    pub fn new(store: Arc<dyn LedgerStore>, writers: Arc<LedgerWriters>) -> Self {
        Self { store, writers }
    }

    /// Closes a period
    ///
    /// # Errors
    ///
    /// Returns `Duplicate` if the period is already locked, `Validation` for
    /// an invalid month.
    #[instrument(skip(self), fields(ledger_id = %ledger))]
    pub async fn lock(
        &self,
        ledger: LedgerId,
        year: i32,
        month: u32,
        locked_by: &str,
    ) -> Result<PeriodLock, LedgerError> {
        let period = AccountingPeriod::new(year, month)?;

        let _writer = self.writers.acquire(ledger).await;
        let lock = PeriodLock::new(ledger, period, locked_by);
        match self.store.lock_period(&lock).await {
            Ok(()) => {}
            Err(StoreError::Duplicate(_)) => {
                return Err(LedgerError::Duplicate(format!("period {} is already locked", period)))
            }
            Err(e) => return Err(e.into()),
        }

        info!(%period, locked_by, "Period locked");
        Ok(lock)
    }

    /// Reopens a period; a no-op if it is not locked
    #[instrument(skip(self), fields(ledger_id = %ledger))]
    pub async fn unlock(&self, ledger: LedgerId, year: i32, month: u32) -> Result<(), LedgerError> {
        let period = AccountingPeriod::new(year, month)?;

        let _writer = self.writers.acquire(ledger).await;
        if self.store.unlock_period(ledger, period).await? {
            info!(%period, "Period unlocked");
        }
        Ok(())
    }

    /// Returns true if the period containing `date` is locked
    pub async fn is_locked(&self, ledger: LedgerId, date: NaiveDate) -> Result<bool, LedgerError> {
        let lock = self
            .store
            .find_period_lock(ledger, AccountingPeriod::of(date))
            .await?;
        Ok(lock.map_or(false, |l| l.is_locked))
    }

    /// Currently locked periods in calendar order
    pub async fn locked_periods(&self, ledger: LedgerId) -> Result<Vec<PeriodLock>, LedgerError> {
        let mut locks: Vec<PeriodLock> = self
            .store
            .list_period_locks(ledger)
            .await?
            .into_iter()
            .filter(|l| l.is_locked)
            .collect();
        locks.sort_by_key(|l| l.period);
        Ok(locks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryLedgerStore;

    fn registry() -> PeriodLockRegistry {
        PeriodLockRegistry::new(Arc::new(InMemoryLedgerStore::new()), Arc::new(LedgerWriters::new()))
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_lock_covers_whole_month() {
        let registry = registry();
        let ledger = LedgerId::new();

        registry.lock(ledger, 2024, 1, "controller").await.unwrap();

        assert!(registry.is_locked(ledger, date(2024, 1, 1)).await.unwrap());
        assert!(registry.is_locked(ledger, date(2024, 1, 31)).await.unwrap());
        assert!(!registry.is_locked(ledger, date(2024, 2, 1)).await.unwrap());
        assert!(!registry.is_locked(LedgerId::new(), date(2024, 1, 15)).await.unwrap());
    }

    #[tokio::test]
    async fn test_double_lock_is_duplicate() {
        let registry = registry();
        let ledger = LedgerId::new();

        registry.lock(ledger, 2024, 3, "controller").await.unwrap();
        let result = registry.lock(ledger, 2024, 3, "auditor").await;
        assert!(matches!(result, Err(LedgerError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_unlock_is_idempotent() {
        let registry = registry();
        let ledger = LedgerId::new();

        registry.unlock(ledger, 2024, 5).await.unwrap();
        registry.lock(ledger, 2024, 5, "controller").await.unwrap();
        registry.unlock(ledger, 2024, 5).await.unwrap();
        registry.unlock(ledger, 2024, 5).await.unwrap();

        assert!(!registry.is_locked(ledger, date(2024, 5, 10)).await.unwrap());
        // an unlocked period can be locked again
        registry.lock(ledger, 2024, 5, "controller").await.unwrap();
        assert_eq!(registry.locked_periods(ledger).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_month_rejected() {
        let result = registry().lock(LedgerId::new(), 2024, 13, "controller").await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }
}
