//! Journal engine
//!
//! Owns the entry state machine `DRAFT -> POSTED -> REVERSED` and is the only
//! component that writes journal entries. Every posting path validates lines,
//! balance, account activity and period lock while holding the ledger's
//! writer guard, then hands a single atomic commit to the store.

use chrono::{Datelike, NaiveDate, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use core_kernel::{AccountingPeriod, Currency, DateRange, JournalEntryId, LedgerId, Money};

use crate::error::LedgerError;
use crate::journal::{
    base_totals, build_lines, ensure_balanced, EntryStatus, EntryWithLines, JournalEntry,
    JournalLine, NewEntry,
};
use crate::store::{EntryQuery, LedgerCommit, LedgerStore, StoreError};
use crate::writers::LedgerWriters;

/// The journal engine
pub struct JournalEngine {
    store: Arc<dyn LedgerStore>,
    writers: Arc<LedgerWriters>,
    base_currency: Currency,
    number_prefix: String,
}

impl JournalEngine {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        writers: Arc<LedgerWriters>,
        base_currency: Currency,
        number_prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            writers,
            base_currency,
            number_prefix: number_prefix.into(),
        }
    }

    pub fn base_currency(&self) -> Currency {
        self.base_currency
    }

    /// Stores a new draft entry
    ///
    /// Drafts need not balance yet; they are never visible to projections.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if there are no lines or a line is malformed, and
    /// `Validation` if a line references an unknown or inactive account.
    #[instrument(skip(self, entry), fields(ledger_id = %ledger, date = %entry.date))]
    pub async fn create_draft(&self, ledger: LedgerId, entry: NewEntry) -> Result<JournalEntryId, LedgerError> {
        let id = JournalEntryId::new_v7();
        let lines = build_lines(id, &entry.lines, self.base_currency)?;
        self.ensure_accounts_active(ledger, &lines).await?;

        let number = self.allocate_number(ledger, entry.date).await?;
        let header = self.header(ledger, id, number, &entry, EntryStatus::Draft, &lines)?;
        self.store.insert_draft(&header, &lines).await?;

        debug!(entry_id = %id, number = %header.number, "Draft created");
        Ok(id)
    }

    /// Replaces the description, date and lines of a draft
    ///
    /// # Errors
    ///
    /// Returns `State` if the entry is no longer a draft.
    #[instrument(skip(self, entry), fields(ledger_id = %ledger, entry_id = %id))]
    pub async fn update_draft(
        &self,
        ledger: LedgerId,
        id: JournalEntryId,
        entry: NewEntry,
    ) -> Result<(), LedgerError> {
        let _writer = self.writers.acquire(ledger).await;

        let existing = self.get(ledger, id).await?.entry;
        ensure_status(&existing, EntryStatus::Draft, "update")?;

        let lines = build_lines(id, &entry.lines, self.base_currency)?;
        self.ensure_accounts_active(ledger, &lines).await?;

        let mut header = self.header(ledger, id, existing.number, &entry, EntryStatus::Draft, &lines)?;
        header.created_at = existing.created_at;
        self.store.replace_draft(&header, &lines).await?;
        Ok(())
    }

    /// Abandons a draft without trace
    #[instrument(skip(self), fields(ledger_id = %ledger, entry_id = %id))]
    pub async fn delete_draft(&self, ledger: LedgerId, id: JournalEntryId) -> Result<(), LedgerError> {
        let _writer = self.writers.acquire(ledger).await;

        let existing = self.get(ledger, id).await?.entry;
        ensure_status(&existing, EntryStatus::Draft, "delete")?;
        self.store.delete_draft(ledger, id).await?;
        Ok(())
    }

    /// Posts a draft
    ///
    /// # Errors
    ///
    /// - `State` if the entry is not a draft
    /// - `Imbalance` if base-currency debits and credits differ
    /// - `PeriodLocked` if the entry's period is locked
    #[instrument(skip(self), fields(ledger_id = %ledger, entry_id = %id))]
    pub async fn post(&self, ledger: LedgerId, id: JournalEntryId) -> Result<(), LedgerError> {
        let _writer = self.writers.acquire(ledger).await;

        let result = self.post_locked(ledger, id).await;
        if let Err(err) = &result {
            warn!(error = %err, "Posting rejected");
        }
        result
    }

    async fn post_locked(&self, ledger: LedgerId, id: JournalEntryId) -> Result<(), LedgerError> {
        let EntryWithLines { entry, lines } = self.get(ledger, id).await?;
        ensure_status(&entry, EntryStatus::Draft, "post")?;

        let (debit, credit) = base_totals(&lines)?;
        ensure_balanced(debit, credit, self.base_currency)?;
        self.ensure_accounts_active(ledger, &lines).await?;
        self.ensure_unlocked(ledger, entry.period()).await?;

        self.store
            .commit(LedgerCommit::Post {
                ledger_id: ledger,
                entry_id: id,
                total_debit: debit,
                total_credit: credit,
                posted_at: Utc::now(),
            })
            .await
            .map_err(|err| match err {
                StoreError::Unbalanced { debit, credit, .. } if debit != credit => LedgerError::Imbalance {
                    debits: Money::from_minor(debit, self.base_currency).amount(),
                    credits: Money::from_minor(credit, self.base_currency).amount(),
                },
                other => other.into(),
            })?;

        info!(number = %entry.number, total = debit, "Entry posted");
        Ok(())
    }

    /// Validates and posts a new entry in one step
    ///
    /// Same failure modes as [`create_draft`](Self::create_draft) followed
    /// by [`post`](Self::post). Additionally returns `Duplicate` if a POSTED
    /// entry with the same source reference exists.
    #[instrument(skip(self, entry), fields(ledger_id = %ledger, date = %entry.date))]
    pub async fn post_direct(&self, ledger: LedgerId, entry: NewEntry) -> Result<JournalEntryId, LedgerError> {
        let _writer = self.writers.acquire(ledger).await;

        let result = self.post_direct_locked(ledger, entry).await;
        if let Err(err) = &result {
            warn!(error = %err, "Posting rejected");
        }
        result
    }

    async fn post_direct_locked(&self, ledger: LedgerId, entry: NewEntry) -> Result<JournalEntryId, LedgerError> {
        let id = JournalEntryId::new_v7();
        let lines = build_lines(id, &entry.lines, self.base_currency)?;
        let (debit, credit) = base_totals(&lines)?;
        ensure_balanced(debit, credit, self.base_currency)?;
        self.ensure_accounts_active(ledger, &lines).await?;
        self.ensure_unlocked(ledger, AccountingPeriod::of(entry.date)).await?;
        if let Some(source) = entry.source {
            let existing = self
                .store
                .list_entries(ledger, &EntryQuery::new().with_source(source).with_status(EntryStatus::Posted))
                .await?;
            if let Some(posted) = existing.first() {
                return Err(LedgerError::Duplicate(format!(
                    "{} is already posted as {}",
                    source, posted.number
                )));
            }
        }

        let number = self.allocate_number(ledger, entry.date).await?;
        let mut header = self.header(ledger, id, number, &entry, EntryStatus::Posted, &lines)?;
        header.posted_at = Some(header.created_at);
        let number = header.number.clone();

        self.store.commit(LedgerCommit::Insert { entry: header, lines }).await?;

        info!(entry_id = %id, %number, total = debit, "Entry posted");
        Ok(id)
    }

    /// Reverses a posted entry
    ///
    /// The reversal is dated `on`, or today, and is created already POSTED
    /// with every line's side swapped. The original becomes REVERSED.
    ///
    /// # Errors
    ///
    /// Returns `State` unless the entry is POSTED and `PeriodLocked` if the
    /// reversal date falls in a locked period.
    #[instrument(skip(self), fields(ledger_id = %ledger, entry_id = %id))]
    pub async fn reverse(
        &self,
        ledger: LedgerId,
        id: JournalEntryId,
        on: Option<NaiveDate>,
    ) -> Result<JournalEntryId, LedgerError> {
        let _writer = self.writers.acquire(ledger).await;

        let result = self.reverse_locked(ledger, id, on).await;
        if let Err(err) = &result {
            warn!(error = %err, "Reversal rejected");
        }
        result
    }

    async fn reverse_locked(
        &self,
        ledger: LedgerId,
        id: JournalEntryId,
        on: Option<NaiveDate>,
    ) -> Result<JournalEntryId, LedgerError> {
        let EntryWithLines { entry: original, lines } = self.get(ledger, id).await?;
        ensure_status(&original, EntryStatus::Posted, "reverse")?;

        let date = on.unwrap_or_else(|| Utc::now().date_naive());
        self.ensure_unlocked(ledger, AccountingPeriod::of(date)).await?;

        let reversal_id = JournalEntryId::new_v7();
        let mirrored: Vec<JournalLine> = lines.iter().map(|l| l.mirrored(reversal_id)).collect();
        let now = Utc::now();
        let reversal = JournalEntry {
            id: reversal_id,
            ledger_id: ledger,
            number: self.allocate_number(ledger, date).await?,
            date,
            description: format!("Reversal of {}", original.number),
            status: EntryStatus::Posted,
            total_debit: original.total_credit,
            total_credit: original.total_debit,
            source: None,
            reverses: Some(id),
            reversed_by: None,
            created_at: now,
            posted_at: Some(now),
        };
        let number = reversal.number.clone();

        self.store
            .commit(LedgerCommit::Reverse {
                original_id: id,
                reversal,
                lines: mirrored,
            })
            .await?;

        info!(original = %original.number, reversal = %number, "Entry reversed");
        Ok(reversal_id)
    }

    /// Gets an entry with its lines
    pub async fn get(&self, ledger: LedgerId, id: JournalEntryId) -> Result<EntryWithLines, LedgerError> {
        self.store
            .get_entry(ledger, id)
            .await?
            .ok_or_else(|| LedgerError::not_found("journal entry", id))
    }

    /// Entry headers in a date range, optionally filtered by status
    pub async fn entries(
        &self,
        ledger: LedgerId,
        range: DateRange,
        status: Option<EntryStatus>,
    ) -> Result<Vec<JournalEntry>, LedgerError> {
        let mut query = EntryQuery::new().in_range(range);
        query.status = status;
        Ok(self.store.list_entries(ledger, &query).await?)
    }

    async fn allocate_number(&self, ledger: LedgerId, date: NaiveDate) -> Result<String, LedgerError> {
        let year = date.year();
        let sequence = self.store.next_entry_sequence(ledger, year).await?;
        Ok(format!("{}-{:04}-{:06}", self.number_prefix, year, sequence))
    }

    fn header(
        &self,
        ledger: LedgerId,
        id: JournalEntryId,
        number: String,
        entry: &NewEntry,
        status: EntryStatus,
        lines: &[JournalLine],
    ) -> Result<JournalEntry, LedgerError> {
        let description = entry.description.trim();
        if description.is_empty() {
            return Err(LedgerError::validation("entry description must not be empty"));
        }
        let (total_debit, total_credit) = base_totals(lines)?;
        Ok(JournalEntry {
            id,
            ledger_id: ledger,
            number,
            date: entry.date,
            description: description.to_string(),
            status,
            total_debit,
            total_credit,
            source: entry.source,
            reverses: None,
            reversed_by: None,
            created_at: Utc::now(),
            posted_at: None,
        })
    }

    async fn ensure_accounts_active(&self, ledger: LedgerId, lines: &[JournalLine]) -> Result<(), LedgerError> {
        let ids: HashSet<_> = lines.iter().map(|l| l.account_id).collect();
        for id in ids {
            match self.store.get_account(ledger, id).await? {
                Some(account) if account.is_active => {}
                Some(account) => {
                    return Err(LedgerError::validation(format!("account {} is inactive", account.code)))
                }
                None => {
                    return Err(LedgerError::validation(format!(
                        "account {} does not exist in ledger {}",
                        id, ledger
                    )))
                }
            }
        }
        Ok(())
    }

    /// Authoritative lock check, never cached
    async fn ensure_unlocked(&self, ledger: LedgerId, period: AccountingPeriod) -> Result<(), LedgerError> {
        match self.store.find_period_lock(ledger, period).await? {
            Some(lock) if lock.is_locked => Err(LedgerError::PeriodLocked { period }),
            _ => Ok(()),
        }
    }
}

fn ensure_status(entry: &JournalEntry, expected: EntryStatus, action: &str) -> Result<(), LedgerError> {
    if entry.status != expected {
        return Err(LedgerError::state(format!(
            "cannot {} entry {}: status is {}, expected {}",
            action, entry.number, entry.status, expected
        )));
    }
    Ok(())
}
