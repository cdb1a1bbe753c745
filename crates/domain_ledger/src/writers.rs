//! Per-ledger write serialization
//!
//! Every mutating ledger call holds its ledger's writer guard for its whole
//! validate-then-commit sequence. Different ledgers never contend.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use core_kernel::LedgerId;

/// Registry of one async mutex per ledger
#[derive(Debug, Default)]
pub struct LedgerWriters {
    locks: Mutex<HashMap<LedgerId, Arc<Mutex<()>>>>,
}

impl LedgerWriters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive write access to a ledger
    pub async fn acquire(&self, ledger: LedgerId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(ledger).or_default())
        };
        lock.lock_owned().await
    }
}
