//! In-memory ledger store
//!
//! Each ledger's state sits behind its own `RwLock`; a commit holds the write
//! half for its whole check-and-write, so readers see either none or all of it.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use core_kernel::{
    AccountId, AccountingPeriod, DomainPort, HealthCheckResult, HealthCheckable,
    JournalEntryId, LedgerId,
};

use crate::account::Account;
use crate::journal::{EntryStatus, EntryWithLines, JournalEntry, JournalLine, Side, SourceRef};
use crate::period::PeriodLock;

use super::{EntryQuery, LedgerCommit, LedgerStore, LineQuery, PostedLine, StoreError};

#[derive(Debug, Default)]
struct LedgerState {
    accounts: HashMap<AccountId, Account>,
    codes: HashMap<String, AccountId>,
    period_locks: BTreeMap<AccountingPeriod, PeriodLock>,
    sequences: HashMap<i32, u64>,
    entries: HashMap<JournalEntryId, JournalEntry>,
    lines: HashMap<JournalEntryId, Vec<JournalLine>>,
}

impl LedgerState {
    fn ensure_unlocked(&self, period: AccountingPeriod) -> Result<(), StoreError> {
        match self.period_locks.get(&period) {
            Some(lock) if lock.is_locked => Err(StoreError::PeriodLocked(period)),
            _ => Ok(()),
        }
    }

    fn ensure_source_free(&self, source: Option<SourceRef>) -> Result<(), StoreError> {
        let Some(source) = source else {
            return Ok(());
        };
        let taken = self
            .entries
            .values()
            .any(|e| e.status == EntryStatus::Posted && e.source == Some(source));
        if taken {
            return Err(StoreError::Duplicate(format!("posted entry for {}", source)));
        }
        Ok(())
    }

    fn entry_in_status(
        &self,
        id: JournalEntryId,
        expected: EntryStatus,
    ) -> Result<&JournalEntry, StoreError> {
        let entry = self
            .entries
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(format!("journal entry {}", id)))?;
        if entry.status != expected {
            return Err(StoreError::StatusConflict {
                entry_id: id,
                expected,
                found: entry.status,
            });
        }
        Ok(entry)
    }

    fn ensure_lines_total(&self, id: JournalEntryId, debit: i64, credit: i64) -> Result<(), StoreError> {
        let (mut stored_debit, mut stored_credit) = (0i64, 0i64);
        for line in self.lines.get(&id).into_iter().flatten() {
            match line.side() {
                Side::Debit => stored_debit = stored_debit.saturating_add(line.amount_base),
                Side::Credit => stored_credit = stored_credit.saturating_add(line.amount_base),
            }
        }
        if stored_debit != stored_credit || (stored_debit, stored_credit) != (debit, credit) {
            return Err(StoreError::Unbalanced {
                entry_id: id,
                debit: stored_debit,
                credit: stored_credit,
            });
        }
        Ok(())
    }

    fn ensure_number_free(&self, entry: &JournalEntry) -> Result<(), StoreError> {
        if self
            .entries
            .values()
            .any(|e| e.id != entry.id && e.number == entry.number)
        {
            return Err(StoreError::Duplicate(format!("entry number {}", entry.number)));
        }
        Ok(())
    }

    fn insert_entry(&mut self, entry: JournalEntry, lines: Vec<JournalLine>) {
        self.lines.insert(entry.id, lines);
        self.entries.insert(entry.id, entry);
    }
}

/// Ledger store that keeps everything in process memory
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    ledgers: RwLock<HashMap<LedgerId, Arc<RwLock<LedgerState>>>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn state(&self, ledger: LedgerId) -> Arc<RwLock<LedgerState>> {
        {
            let ledgers = self.ledgers.read().await;
            if let Some(state) = ledgers.get(&ledger) {
                return Arc::clone(state);
            }
        }
        let mut ledgers = self.ledgers.write().await;
        Arc::clone(ledgers.entry(ledger).or_default())
    }
}

impl DomainPort for InMemoryLedgerStore {}

#[async_trait]
impl HealthCheckable for InMemoryLedgerStore {
    async fn health_check(&self) -> HealthCheckResult {
        let ledgers = self.ledgers.read().await.len();
        HealthCheckResult::healthy("in-memory-ledger-store", 0)
            .with_message(format!("{} ledgers loaded", ledgers))
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn insert_account(&self, account: &Account) -> Result<(), StoreError> {
        let state = self.state(account.ledger_id).await;
        let mut state = state.write().await;

        if state.codes.contains_key(&account.code) {
            return Err(StoreError::Duplicate(format!("account code {}", account.code)));
        }
        state.codes.insert(account.code.clone(), account.id);
        state.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn update_account(&self, account: &Account) -> Result<(), StoreError> {
        let state = self.state(account.ledger_id).await;
        let mut state = state.write().await;

        let stored = state
            .accounts
            .get_mut(&account.id)
            .ok_or_else(|| StoreError::NotFound(format!("account {}", account.id)))?;
        stored.name = account.name.clone();
        stored.parent_id = account.parent_id;
        stored.is_active = account.is_active;
        Ok(())
    }

    async fn get_account(&self, ledger: LedgerId, id: AccountId) -> Result<Option<Account>, StoreError> {
        let state = self.state(ledger).await;
        let state = state.read().await;
        Ok(state.accounts.get(&id).cloned())
    }

    async fn find_account_by_code(&self, ledger: LedgerId, code: &str) -> Result<Option<Account>, StoreError> {
        let state = self.state(ledger).await;
        let state = state.read().await;
        Ok(state
            .codes
            .get(code)
            .and_then(|id| state.accounts.get(id))
            .cloned())
    }

    async fn list_accounts(&self, ledger: LedgerId) -> Result<Vec<Account>, StoreError> {
        let state = self.state(ledger).await;
        let state = state.read().await;
        let mut accounts: Vec<Account> = state.accounts.values().cloned().collect();
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(accounts)
    }

    async fn account_in_use(&self, ledger: LedgerId, id: AccountId) -> Result<bool, StoreError> {
        let state = self.state(ledger).await;
        let state = state.read().await;
        Ok(state.lines.values().flatten().any(|l| l.account_id == id))
    }

    async fn delete_account(&self, ledger: LedgerId, id: AccountId) -> Result<(), StoreError> {
        let state = self.state(ledger).await;
        let mut state = state.write().await;

        if state.lines.values().flatten().any(|l| l.account_id == id) {
            return Err(StoreError::InUse(format!("account {}", id)));
        }
        let removed = state
            .accounts
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(format!("account {}", id)))?;
        state.codes.remove(&removed.code);
        for child in state.accounts.values_mut() {
            if child.parent_id == Some(id) {
                child.parent_id = removed.parent_id;
            }
        }
        debug!(ledger_id = %ledger, code = %removed.code, "Account deleted");
        Ok(())
    }

    async fn lock_period(&self, lock: &PeriodLock) -> Result<(), StoreError> {
        let state = self.state(lock.ledger_id).await;
        let mut state = state.write().await;

        if let Some(existing) = state.period_locks.get(&lock.period) {
            if existing.is_locked {
                return Err(StoreError::Duplicate(format!("period lock {}", lock.period)));
            }
        }
        state.period_locks.insert(lock.period, lock.clone());
        Ok(())
    }

    async fn unlock_period(&self, ledger: LedgerId, period: AccountingPeriod) -> Result<bool, StoreError> {
        let state = self.state(ledger).await;
        let mut state = state.write().await;

        match state.period_locks.get_mut(&period) {
            Some(lock) if lock.is_locked => {
                lock.is_locked = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_period_lock(
        &self,
        ledger: LedgerId,
        period: AccountingPeriod,
    ) -> Result<Option<PeriodLock>, StoreError> {
        let state = self.state(ledger).await;
        let state = state.read().await;
        Ok(state.period_locks.get(&period).cloned())
    }

    async fn list_period_locks(&self, ledger: LedgerId) -> Result<Vec<PeriodLock>, StoreError> {
        let state = self.state(ledger).await;
        let state = state.read().await;
        Ok(state.period_locks.values().cloned().collect())
    }

    async fn next_entry_sequence(&self, ledger: LedgerId, year: i32) -> Result<u64, StoreError> {
        let state = self.state(ledger).await;
        let mut state = state.write().await;
        let sequence = state.sequences.entry(year).or_insert(0);
        *sequence += 1;
        Ok(*sequence)
    }

    async fn insert_draft(&self, entry: &JournalEntry, lines: &[JournalLine]) -> Result<(), StoreError> {
        let state = self.state(entry.ledger_id).await;
        let mut state = state.write().await;

        if state.entries.contains_key(&entry.id) {
            return Err(StoreError::Duplicate(format!("journal entry {}", entry.id)));
        }
        state.ensure_number_free(entry)?;
        state.insert_entry(entry.clone(), lines.to_vec());
        Ok(())
    }

    async fn replace_draft(&self, entry: &JournalEntry, lines: &[JournalLine]) -> Result<(), StoreError> {
        let state = self.state(entry.ledger_id).await;
        let mut state = state.write().await;

        state.entry_in_status(entry.id, EntryStatus::Draft)?;
        state.insert_entry(entry.clone(), lines.to_vec());
        Ok(())
    }

    async fn delete_draft(&self, ledger: LedgerId, id: JournalEntryId) -> Result<(), StoreError> {
        let state = self.state(ledger).await;
        let mut state = state.write().await;

        state.entry_in_status(id, EntryStatus::Draft)?;
        state.entries.remove(&id);
        state.lines.remove(&id);
        Ok(())
    }

    async fn get_entry(&self, ledger: LedgerId, id: JournalEntryId) -> Result<Option<EntryWithLines>, StoreError> {
        let state = self.state(ledger).await;
        let state = state.read().await;
        Ok(state.entries.get(&id).map(|entry| EntryWithLines {
            entry: entry.clone(),
            lines: state.lines.get(&id).cloned().unwrap_or_default(),
        }))
    }

    async fn list_entries(&self, ledger: LedgerId, query: &EntryQuery) -> Result<Vec<JournalEntry>, StoreError> {
        let state = self.state(ledger).await;
        let state = state.read().await;
        let mut entries: Vec<JournalEntry> = state
            .entries
            .values()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.number.cmp(&b.number)));
        Ok(entries)
    }

    async fn commit(&self, commit: LedgerCommit) -> Result<(), StoreError> {
        let state = self.state(commit.ledger_id()).await;
        let mut state = state.write().await;
        let kind = commit.kind();

        match commit {
            LedgerCommit::Post {
                entry_id,
                total_debit,
                total_credit,
                posted_at,
                ..
            } => {
                let draft = state.entry_in_status(entry_id, EntryStatus::Draft)?;
                let (period, source) = (draft.period(), draft.source);
                state.ensure_unlocked(period)?;
                state.ensure_source_free(source)?;
                state.ensure_lines_total(entry_id, total_debit, total_credit)?;

                if let Some(entry) = state.entries.get_mut(&entry_id) {
                    entry.status = EntryStatus::Posted;
                    entry.total_debit = total_debit;
                    entry.total_credit = total_credit;
                    entry.posted_at = Some(posted_at);
                }
            }
            LedgerCommit::Insert { entry, lines } => {
                state.ensure_unlocked(entry.period())?;
                state.ensure_source_free(entry.source)?;
                state.ensure_number_free(&entry)?;
                state.insert_entry(entry, lines);
            }
            LedgerCommit::Reverse {
                original_id,
                reversal,
                lines,
            } => {
                state.entry_in_status(original_id, EntryStatus::Posted)?;
                state.ensure_unlocked(reversal.period())?;
                state.ensure_number_free(&reversal)?;

                let reversal_id = reversal.id;
                state.insert_entry(reversal, lines);
                if let Some(original) = state.entries.get_mut(&original_id) {
                    original.status = EntryStatus::Reversed;
                    original.reversed_by = Some(reversal_id);
                }
            }
        }

        debug!(kind, "Ledger commit applied");
        Ok(())
    }

    async fn posted_lines(&self, ledger: LedgerId, query: &LineQuery) -> Result<Vec<PostedLine>, StoreError> {
        let state = self.state(ledger).await;
        let state = state.read().await;

        let mut rows = Vec::new();
        for entry in state.entries.values().filter(|e| query.admits(e)) {
            let Some(posted_at) = entry.posted_at else {
                continue;
            };
            let lines = state.lines.get(&entry.id).map(Vec::as_slice).unwrap_or_default();
            for line in lines {
                if query.account_id.map_or(true, |id| id == line.account_id) {
                    rows.push(PostedLine {
                        entry_id: entry.id,
                        entry_number: entry.number.clone(),
                        entry_date: entry.date,
                        entry_description: entry.description.clone(),
                        posted_at,
                        line: line.clone(),
                    });
                }
            }
        }
        Ok(rows)
    }
}
