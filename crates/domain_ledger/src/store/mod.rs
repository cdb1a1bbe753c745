//! Storage port for ledger state
//!
//! The ledger services depend only on the [`LedgerStore`] trait. Two adapters
//! exist: [`memory::InMemoryLedgerStore`] in this crate and the PostgreSQL
//! adapter in `infra_db`.
//!
//! # Atomicity
//!
//! A [`LedgerCommit`] is applied all-or-nothing. Readers never observe an
//! entry header without all of its lines, and the period lock is re-checked
//! inside the same atomic section that writes the entry.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;

use core_kernel::{
    AccountId, AccountingPeriod, DateRange, DomainPort, HealthCheckable, JournalEntryId, LedgerId,
    PortError,
};

use crate::account::Account;
use crate::journal::{EntryStatus, EntryWithLines, JournalEntry, JournalLine, SourceRef};
use crate::period::PeriodLock;

pub use memory::InMemoryLedgerStore;

/// Errors returned by storage adapters
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness rule was violated
    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The commit targets a locked period
    #[error("Accounting period {0} is locked")]
    PeriodLocked(AccountingPeriod),

    /// The entry was not in the status the write requires
    #[error("Entry {entry_id} is {found}, expected {expected}")]
    StatusConflict {
        entry_id: JournalEntryId,
        expected: EntryStatus,
        found: EntryStatus,
    },

    /// The account is referenced by journal lines
    #[error("In use: {0}")]
    InUse(String),

    /// Stored lines disagree with the totals the commit was validated against
    #[error("Entry {entry_id} lines total {debit} debit and {credit} credit")]
    Unbalanced {
        entry_id: JournalEntryId,
        debit: i64,
        credit: i64,
    },

    #[error(transparent)]
    Backend(#[from] PortError),
}

/// An atomic write that commits entries to the permanent ledger
#[derive(Debug, Clone)]
pub enum LedgerCommit {
    /// Moves a stored draft to POSTED with fixed totals
    Post {
        ledger_id: LedgerId,
        entry_id: JournalEntryId,
        total_debit: i64,
        total_credit: i64,
        posted_at: DateTime<Utc>,
    },
    /// Stores a new entry that is already POSTED
    Insert {
        entry: JournalEntry,
        lines: Vec<JournalLine>,
    },
    /// Stores a POSTED reversal and marks the original REVERSED
    Reverse {
        original_id: JournalEntryId,
        reversal: JournalEntry,
        lines: Vec<JournalLine>,
    },
}

impl LedgerCommit {
    pub fn ledger_id(&self) -> LedgerId {
        match self {
            LedgerCommit::Post { ledger_id, .. } => *ledger_id,
            LedgerCommit::Insert { entry, .. } => entry.ledger_id,
            LedgerCommit::Reverse { reversal, .. } => reversal.ledger_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LedgerCommit::Post { .. } => "post",
            LedgerCommit::Insert { .. } => "insert",
            LedgerCommit::Reverse { .. } => "reverse",
        }
    }
}

/// Filter for listing entry headers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryQuery {
    pub range: Option<DateRange>,
    pub status: Option<EntryStatus>,
    pub source: Option<SourceRef>,
}

impl EntryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_range(mut self, range: DateRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_status(mut self, status: EntryStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_source(mut self, source: SourceRef) -> Self {
        self.source = Some(source);
        self
    }

    pub fn matches(&self, entry: &JournalEntry) -> bool {
        self.range.map_or(true, |r| r.contains(entry.date))
            && self.status.map_or(true, |s| s == entry.status)
            && self.source.map_or(true, |s| entry.source == Some(s))
    }
}

/// Filter for reading committed lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineQuery {
    pub range: DateRange,
    pub account_id: Option<AccountId>,
    /// When false, reversed originals and their reversal entries are skipped
    pub include_reversed: bool,
}

impl LineQuery {
    /// Returns true if a committed entry passes the reversal filter
    pub fn admits(&self, entry: &JournalEntry) -> bool {
        entry.status.is_committed()
            && self.range.contains(entry.date)
            && (self.include_reversed
                || (entry.status == EntryStatus::Posted && entry.reverses.is_none()))
    }
}

/// A committed line joined with its entry header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedLine {
    pub entry_id: JournalEntryId,
    pub entry_number: String,
    pub entry_date: NaiveDate,
    pub entry_description: String,
    pub posted_at: DateTime<Utc>,
    pub line: JournalLine,
}

/// Storage port for the ledger core
///
/// Every method is scoped to one ledger. Adapters must apply each call
/// atomically.
#[async_trait]
pub trait LedgerStore: DomainPort + HealthCheckable {
    // ========================================================================
    // Chart of accounts
    // ========================================================================

    /// Stores a new account; `Duplicate` if the code is taken in the ledger
    async fn insert_account(&self, account: &Account) -> Result<(), StoreError>;

    /// Replaces name, parent and activity of an existing account
    async fn update_account(&self, account: &Account) -> Result<(), StoreError>;

    async fn get_account(&self, ledger: LedgerId, id: AccountId) -> Result<Option<Account>, StoreError>;

    async fn find_account_by_code(&self, ledger: LedgerId, code: &str) -> Result<Option<Account>, StoreError>;

    /// All accounts of the ledger ordered by code
    async fn list_accounts(&self, ledger: LedgerId) -> Result<Vec<Account>, StoreError>;

    /// Returns true if any journal line, draft or committed, references the account
    async fn account_in_use(&self, ledger: LedgerId, id: AccountId) -> Result<bool, StoreError>;

    /// Removes an unreferenced account
    ///
    /// Inactive children are moved to the removed account's parent.
    /// Returns `InUse` if a journal line references the account.
    async fn delete_account(&self, ledger: LedgerId, id: AccountId) -> Result<(), StoreError>;

    // ========================================================================
    // Period locks
    // ========================================================================

    /// Locks a period; `Duplicate` if it is already locked
    async fn lock_period(&self, lock: &PeriodLock) -> Result<(), StoreError>;

    /// Unlocks a period; returns false if it was not locked
    async fn unlock_period(&self, ledger: LedgerId, period: AccountingPeriod) -> Result<bool, StoreError>;

    async fn find_period_lock(
        &self,
        ledger: LedgerId,
        period: AccountingPeriod,
    ) -> Result<Option<PeriodLock>, StoreError>;

    async fn list_period_locks(&self, ledger: LedgerId) -> Result<Vec<PeriodLock>, StoreError>;

    // ========================================================================
    // Journal
    // ========================================================================

    /// Allocates the next entry sequence number for a ledger and year, starting at 1
    async fn next_entry_sequence(&self, ledger: LedgerId, year: i32) -> Result<u64, StoreError>;

    async fn insert_draft(&self, entry: &JournalEntry, lines: &[JournalLine]) -> Result<(), StoreError>;

    /// Replaces header fields and all lines of a draft; `StatusConflict` once posted
    async fn replace_draft(&self, entry: &JournalEntry, lines: &[JournalLine]) -> Result<(), StoreError>;

    /// Deletes a draft with its lines; `StatusConflict` for committed entries
    async fn delete_draft(&self, ledger: LedgerId, id: JournalEntryId) -> Result<(), StoreError>;

    async fn get_entry(&self, ledger: LedgerId, id: JournalEntryId) -> Result<Option<EntryWithLines>, StoreError>;

    /// Entry headers ordered by date, then number
    async fn list_entries(&self, ledger: LedgerId, query: &EntryQuery) -> Result<Vec<JournalEntry>, StoreError>;

    /// Applies a commit atomically
    ///
    /// Fails with `PeriodLocked` if the target period is locked,
    /// `StatusConflict` if the entry moved on concurrently, and `Duplicate`
    /// if another POSTED entry already carries the same source reference.
    async fn commit(&self, commit: LedgerCommit) -> Result<(), StoreError>;

    // ========================================================================
    // Projections
    // ========================================================================

    /// Committed lines matching the query, never lines of drafts
    async fn posted_lines(&self, ledger: LedgerId, query: &LineQuery) -> Result<Vec<PostedLine>, StoreError>;
}
