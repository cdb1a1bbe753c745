//! PostgreSQL Ledger Store
//!
//! Implements the [`LedgerStore`] port on PostgreSQL.
//!
//! # Concurrency
//!
//! Every write that touches period locks or commits entries first takes a
//! transaction-scoped advisory lock keyed by the ledger, so a lock and a
//! commit for the same ledger serialize across processes. A partial unique
//! index on `(ledger_id, source_kind, source_id) WHERE status = 'POSTED'`
//! backs the source-reference rule.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresLedgerStore};
//! use std::sync::Arc;
//!
//! let pool = create_pool(DatabaseConfig::from_env()?).await?;
//! run_migrations(&pool).await?;
//! let store: Arc<dyn LedgerStore> = Arc::new(PostgresLedgerStore::new(pool));
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use core_kernel::{
    AccountId, AccountingPeriod, DateRange, DomainPort, HealthCheckResult,
    HealthCheckable, JournalEntryId, LedgerId,
};
use domain_ledger::{
    Account, EntryQuery, EntryStatus, EntryWithLines, JournalEntry, JournalLine, LedgerCommit,
    LedgerStore, LineQuery, PeriodLock, PostedLine, SourceRef, StoreError,
};

use crate::error::{store_err, DatabaseError};
use crate::rows::{parse_status, AccountRow, EntryRow, LineRow, PeriodLockRow, PostedLineRow};

const ENTRY_COLUMNS: &str = "entry_id, ledger_id, entry_number, entry_date, description, status, \
     total_debit, total_credit, source_kind, source_id, reverses, reversed_by, created_at, posted_at";

const LINE_COLUMNS: &str =
    "line_id, entry_id, line_no, account_id, debit, credit, currency, fx_rate, amount_base, description";

const ACCOUNT_COLUMNS: &str =
    "account_id, ledger_id, code, name, account_type, parent_id, is_active, created_at";

/// PostgreSQL-backed implementation of the [`LedgerStore`] port
#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    /// Creates a new store with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Serializes writers of one ledger until the transaction ends
async fn lock_ledger(tx: &mut Transaction<'_, Postgres>, ledger: LedgerId) -> Result<(), StoreError> {
    let (key, _) = ledger.as_uuid().as_u64_pair();
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(key as i64)
        .execute(&mut **tx)
        .await
        .map_err(store_err)?;
    Ok(())
}

async fn ensure_unlocked(
    tx: &mut Transaction<'_, Postgres>,
    ledger: LedgerId,
    period: AccountingPeriod,
) -> Result<(), StoreError> {
    let locked: Option<bool> = sqlx::query_scalar(
        "SELECT is_locked FROM period_locks WHERE ledger_id = $1 AND year = $2 AND month = $3",
    )
    .bind(Uuid::from(ledger))
    .bind(period.year())
    .bind(period.month() as i32)
    .fetch_optional(&mut **tx)
    .await
    .map_err(store_err)?;

    match locked {
        Some(true) => Err(StoreError::PeriodLocked(period)),
        _ => Ok(()),
    }
}

async fn ensure_source_free(
    tx: &mut Transaction<'_, Postgres>,
    ledger: LedgerId,
    source: Option<SourceRef>,
) -> Result<(), StoreError> {
    let Some(source) = source else {
        return Ok(());
    };
    let taken: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS (
            SELECT 1 FROM journal_entries
            WHERE ledger_id = $1 AND status = 'POSTED' AND source_kind = $2 AND source_id = $3
        )
        "#,
    )
    .bind(Uuid::from(ledger))
    .bind(source.kind.as_str())
    .bind(source.id)
    .fetch_one(&mut **tx)
    .await
    .map_err(store_err)?;

    if taken {
        return Err(StoreError::Duplicate(format!("posted entry for {}", source)));
    }
    Ok(())
}

/// Sums the stored base amounts of an entry and compares them to the commit
async fn ensure_lines_total(
    tx: &mut Transaction<'_, Postgres>,
    id: JournalEntryId,
    debit: i64,
    credit: i64,
) -> Result<(), StoreError> {
    let (stored_debit, stored_credit): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COALESCE(SUM(amount_base) FILTER (WHERE debit > 0), 0)::BIGINT,
            COALESCE(SUM(amount_base) FILTER (WHERE credit > 0), 0)::BIGINT
        FROM journal_lines
        WHERE entry_id = $1
        "#,
    )
    .bind(Uuid::from(id))
    .fetch_one(&mut **tx)
    .await
    .map_err(store_err)?;

    if stored_debit != stored_credit || (stored_debit, stored_credit) != (debit, credit) {
        return Err(StoreError::Unbalanced {
            entry_id: id,
            debit: stored_debit,
            credit: stored_credit,
        });
    }
    Ok(())
}

/// Reads an entry's status and date, locking the row
async fn entry_in_status(
    tx: &mut Transaction<'_, Postgres>,
    ledger: LedgerId,
    id: JournalEntryId,
    expected: EntryStatus,
) -> Result<EntryRow, StoreError> {
    let sql = format!(
        "SELECT {} FROM journal_entries WHERE ledger_id = $1 AND entry_id = $2 FOR UPDATE",
        ENTRY_COLUMNS
    );
    let row: EntryRow = sqlx::query_as(&sql)
        .bind(Uuid::from(ledger))
        .bind(Uuid::from(id))
        .fetch_optional(&mut **tx)
        .await
        .map_err(store_err)?
        .ok_or_else(|| StoreError::NotFound(format!("journal entry {}", id)))?;

    let found = parse_status(row.entry_id, &row.status)?;
    if found != expected {
        return Err(StoreError::StatusConflict {
            entry_id: id,
            expected,
            found,
        });
    }
    Ok(row)
}

async fn insert_entry(
    tx: &mut Transaction<'_, Postgres>,
    entry: &JournalEntry,
    lines: &[JournalLine],
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO journal_entries (
            entry_id, ledger_id, entry_number, entry_date, description, status,
            total_debit, total_credit, source_kind, source_id, reverses, reversed_by,
            created_at, posted_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(Uuid::from(entry.id))
    .bind(Uuid::from(entry.ledger_id))
    .bind(&entry.number)
    .bind(entry.date)
    .bind(&entry.description)
    .bind(entry.status.as_str())
    .bind(entry.total_debit)
    .bind(entry.total_credit)
    .bind(entry.source.map(|s| s.kind.as_str()))
    .bind(entry.source.map(|s| s.id))
    .bind(entry.reverses.map(Uuid::from))
    .bind(entry.reversed_by.map(Uuid::from))
    .bind(entry.created_at)
    .bind(entry.posted_at)
    .execute(&mut **tx)
    .await
    .map_err(store_err)?;

    insert_lines(tx, lines).await
}

async fn insert_lines(tx: &mut Transaction<'_, Postgres>, lines: &[JournalLine]) -> Result<(), StoreError> {
    for line in lines {
        let line_no = i32::try_from(line.line_no)
            .map_err(|_| StoreError::from(DatabaseError::serialization(format!("line_no {}", line.line_no))))?;
        sqlx::query(
            r#"
            INSERT INTO journal_lines (
                line_id, entry_id, line_no, account_id, debit, credit,
                currency, fx_rate, amount_base, description
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(Uuid::from(line.id))
        .bind(Uuid::from(line.entry_id))
        .bind(line_no)
        .bind(Uuid::from(line.account_id))
        .bind(line.debit)
        .bind(line.credit)
        .bind(line.currency.code())
        .bind(line.fx_rate)
        .bind(line.amount_base)
        .bind(&line.description)
        .execute(&mut **tx)
        .await
        .map_err(store_err)?;
    }
    Ok(())
}

/// Open-ended bounds are passed as NULL so PostgreSQL never sees dates outside its range
fn bounds(range: DateRange) -> (Option<NaiveDate>, Option<NaiveDate>) {
    let from = (range.from != NaiveDate::MIN).then_some(range.from);
    let to = (range.to != NaiveDate::MAX).then_some(range.to);
    (from, to)
}

fn into_accounts(rows: Vec<AccountRow>) -> Result<Vec<Account>, StoreError> {
    rows.into_iter()
        .map(|r| Account::try_from(r).map_err(StoreError::from))
        .collect()
}

impl DomainPort for PostgresLedgerStore {}

#[async_trait]
impl HealthCheckable for PostgresLedgerStore {
    async fn health_check(&self) -> HealthCheckResult {
        crate::health::check(&self.pool, "postgres-ledger-store").await
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    // ========================================================================
    // Chart of accounts
    // ========================================================================

    #[instrument(skip(self, account), fields(ledger_id = %account.ledger_id, code = %account.code))]
    async fn insert_account(&self, account: &Account) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (
                account_id, ledger_id, code, name, account_type, parent_id, is_active, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::from(account.id))
        .bind(Uuid::from(account.ledger_id))
        .bind(&account.code)
        .bind(&account.name)
        .bind(account.account_type.as_str())
        .bind(account.parent_id.map(Uuid::from))
        .bind(account.is_active)
        .bind(account.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match store_err(e) {
            StoreError::Duplicate(_) => StoreError::Duplicate(format!("account code {}", account.code)),
            other => other,
        })?;
        Ok(())
    }

    async fn update_account(&self, account: &Account) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts SET name = $3, parent_id = $4, is_active = $5
            WHERE ledger_id = $1 AND account_id = $2
            "#,
        )
        .bind(Uuid::from(account.ledger_id))
        .bind(Uuid::from(account.id))
        .bind(&account.name)
        .bind(account.parent_id.map(Uuid::from))
        .bind(account.is_active)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("account {}", account.id)));
        }
        Ok(())
    }

    async fn get_account(&self, ledger: LedgerId, id: AccountId) -> Result<Option<Account>, StoreError> {
        let sql = format!(
            "SELECT {} FROM accounts WHERE ledger_id = $1 AND account_id = $2",
            ACCOUNT_COLUMNS
        );
        let row: Option<AccountRow> = sqlx::query_as(&sql)
            .bind(Uuid::from(ledger))
            .bind(Uuid::from(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(row.map(Account::try_from).transpose()?)
    }

    async fn find_account_by_code(&self, ledger: LedgerId, code: &str) -> Result<Option<Account>, StoreError> {
        let sql = format!(
            "SELECT {} FROM accounts WHERE ledger_id = $1 AND code = $2",
            ACCOUNT_COLUMNS
        );
        let row: Option<AccountRow> = sqlx::query_as(&sql)
            .bind(Uuid::from(ledger))
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(row.map(Account::try_from).transpose()?)
    }

    async fn list_accounts(&self, ledger: LedgerId) -> Result<Vec<Account>, StoreError> {
        let sql = format!(
            "SELECT {} FROM accounts WHERE ledger_id = $1 ORDER BY code",
            ACCOUNT_COLUMNS
        );
        let rows: Vec<AccountRow> = sqlx::query_as(&sql)
            .bind(Uuid::from(ledger))
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;
        into_accounts(rows)
    }

    async fn account_in_use(&self, ledger: LedgerId, id: AccountId) -> Result<bool, StoreError> {
        let in_use: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM journal_lines l
                JOIN journal_entries e ON e.entry_id = l.entry_id
                WHERE e.ledger_id = $1 AND l.account_id = $2
            )
            "#,
        )
        .bind(Uuid::from(ledger))
        .bind(Uuid::from(id))
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(in_use)
    }

    #[instrument(skip(self), fields(ledger_id = %ledger, account_id = %id))]
    async fn delete_account(&self, ledger: LedgerId, id: AccountId) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let parent: Option<Option<Uuid>> = sqlx::query_scalar(
            "SELECT parent_id FROM accounts WHERE ledger_id = $1 AND account_id = $2 FOR UPDATE",
        )
        .bind(Uuid::from(ledger))
        .bind(Uuid::from(id))
        .fetch_optional(&mut *tx)
        .await
        .map_err(store_err)?;
        let parent = parent.ok_or_else(|| StoreError::NotFound(format!("account {}", id)))?;

        let referenced: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM journal_lines WHERE account_id = $1)")
                .bind(Uuid::from(id))
                .fetch_one(&mut *tx)
                .await
                .map_err(store_err)?;
        if referenced {
            return Err(StoreError::InUse(format!("account {}", id)));
        }

        sqlx::query("UPDATE accounts SET parent_id = $2 WHERE parent_id = $1")
            .bind(Uuid::from(id))
            .bind(parent)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        sqlx::query("DELETE FROM accounts WHERE account_id = $1")
            .bind(Uuid::from(id))
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;
        debug!("Account deleted");
        Ok(())
    }

    // ========================================================================
    // Period locks
    // ========================================================================

    #[instrument(skip(self, lock), fields(ledger_id = %lock.ledger_id, period = %lock.period))]
    async fn lock_period(&self, lock: &PeriodLock) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        lock_ledger(&mut tx, lock.ledger_id).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO period_locks (lock_id, ledger_id, year, month, is_locked, locked_at, locked_by)
            VALUES ($1, $2, $3, $4, TRUE, $5, $6)
            ON CONFLICT (ledger_id, year, month) DO UPDATE
                SET lock_id = EXCLUDED.lock_id,
                    is_locked = TRUE,
                    locked_at = EXCLUDED.locked_at,
                    locked_by = EXCLUDED.locked_by
                WHERE period_locks.is_locked = FALSE
            "#,
        )
        .bind(Uuid::from(lock.id))
        .bind(Uuid::from(lock.ledger_id))
        .bind(lock.year())
        .bind(lock.month() as i32)
        .bind(lock.locked_at)
        .bind(&lock.locked_by)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Duplicate(format!("period lock {}", lock.period)));
        }
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn unlock_period(&self, ledger: LedgerId, period: AccountingPeriod) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        lock_ledger(&mut tx, ledger).await?;

        let result = sqlx::query(
            r#"
            UPDATE period_locks SET is_locked = FALSE
            WHERE ledger_id = $1 AND year = $2 AND month = $3 AND is_locked
            "#,
        )
        .bind(Uuid::from(ledger))
        .bind(period.year())
        .bind(period.month() as i32)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_period_lock(
        &self,
        ledger: LedgerId,
        period: AccountingPeriod,
    ) -> Result<Option<PeriodLock>, StoreError> {
        let row: Option<PeriodLockRow> = sqlx::query_as(
            r#"
            SELECT lock_id, ledger_id, year, month, is_locked, locked_at, locked_by
            FROM period_locks WHERE ledger_id = $1 AND year = $2 AND month = $3
            "#,
        )
        .bind(Uuid::from(ledger))
        .bind(period.year())
        .bind(period.month() as i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(row.map(PeriodLock::try_from).transpose()?)
    }

    async fn list_period_locks(&self, ledger: LedgerId) -> Result<Vec<PeriodLock>, StoreError> {
        let rows: Vec<PeriodLockRow> = sqlx::query_as(
            r#"
            SELECT lock_id, ledger_id, year, month, is_locked, locked_at, locked_by
            FROM period_locks WHERE ledger_id = $1 ORDER BY year, month
            "#,
        )
        .bind(Uuid::from(ledger))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        rows.into_iter()
            .map(|r| PeriodLock::try_from(r).map_err(StoreError::from))
            .collect()
    }

    // ========================================================================
    // Journal
    // ========================================================================

    async fn next_entry_sequence(&self, ledger: LedgerId, year: i32) -> Result<u64, StoreError> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO entry_sequences (ledger_id, year, last_value) VALUES ($1, $2, 1)
            ON CONFLICT (ledger_id, year) DO UPDATE SET last_value = entry_sequences.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(Uuid::from(ledger))
        .bind(year)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        u64::try_from(value)
            .map_err(|_| DatabaseError::serialization(format!("entry sequence {}", value)).into())
    }

    async fn insert_draft(&self, entry: &JournalEntry, lines: &[JournalLine]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        insert_entry(&mut tx, entry, lines).await?;
        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn replace_draft(&self, entry: &JournalEntry, lines: &[JournalLine]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        lock_ledger(&mut tx, entry.ledger_id).await?;
        entry_in_status(&mut tx, entry.ledger_id, entry.id, EntryStatus::Draft).await?;

        sqlx::query(
            r#"
            UPDATE journal_entries
            SET entry_date = $2, description = $3, source_kind = $4, source_id = $5
            WHERE entry_id = $1
            "#,
        )
        .bind(Uuid::from(entry.id))
        .bind(entry.date)
        .bind(&entry.description)
        .bind(entry.source.map(|s| s.kind.as_str()))
        .bind(entry.source.map(|s| s.id))
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        sqlx::query("DELETE FROM journal_lines WHERE entry_id = $1")
            .bind(Uuid::from(entry.id))
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        insert_lines(&mut tx, lines).await?;

        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn delete_draft(&self, ledger: LedgerId, id: JournalEntryId) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        lock_ledger(&mut tx, ledger).await?;
        entry_in_status(&mut tx, ledger, id, EntryStatus::Draft).await?;

        sqlx::query("DELETE FROM journal_entries WHERE entry_id = $1")
            .bind(Uuid::from(id))
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn get_entry(&self, ledger: LedgerId, id: JournalEntryId) -> Result<Option<EntryWithLines>, StoreError> {
        let sql = format!(
            "SELECT {} FROM journal_entries WHERE ledger_id = $1 AND entry_id = $2",
            ENTRY_COLUMNS
        );
        let Some(row) = sqlx::query_as::<_, EntryRow>(&sql)
            .bind(Uuid::from(ledger))
            .bind(Uuid::from(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?
        else {
            return Ok(None);
        };

        let sql = format!(
            "SELECT {} FROM journal_lines WHERE entry_id = $1 ORDER BY line_no",
            LINE_COLUMNS
        );
        let lines: Vec<LineRow> = sqlx::query_as(&sql)
            .bind(Uuid::from(id))
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;

        Ok(Some(EntryWithLines {
            entry: JournalEntry::try_from(row)?,
            lines: lines
                .into_iter()
                .map(JournalLine::try_from)
                .collect::<Result<_, _>>()?,
        }))
    }

    async fn list_entries(&self, ledger: LedgerId, query: &EntryQuery) -> Result<Vec<JournalEntry>, StoreError> {
        let (from, to) = query.range.map(bounds).unwrap_or((None, None));
        let sql = format!(
            r#"
            SELECT {} FROM journal_entries
            WHERE ledger_id = $1
              AND ($2::date IS NULL OR entry_date >= $2)
              AND ($3::date IS NULL OR entry_date <= $3)
              AND ($4::varchar IS NULL OR status = $4)
              AND ($5::varchar IS NULL OR (source_kind = $5 AND source_id = $6))
            ORDER BY entry_date, entry_number
            "#,
            ENTRY_COLUMNS
        );
        let rows: Vec<EntryRow> = sqlx::query_as(&sql)
            .bind(Uuid::from(ledger))
            .bind(from)
            .bind(to)
            .bind(query.status.map(|s| s.as_str()))
            .bind(query.source.map(|s| s.kind.as_str()))
            .bind(query.source.map(|s| s.id))
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;

        rows.into_iter()
            .map(|r| JournalEntry::try_from(r).map_err(StoreError::from))
            .collect()
    }

    #[instrument(skip(self, commit), fields(ledger_id = %commit.ledger_id(), kind = commit.kind()))]
    async fn commit(&self, commit: LedgerCommit) -> Result<(), StoreError> {
        let ledger = commit.ledger_id();
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        lock_ledger(&mut tx, ledger).await?;

        match &commit {
            LedgerCommit::Post {
                entry_id,
                total_debit,
                total_credit,
                posted_at,
                ..
            } => {
                let draft = JournalEntry::try_from(
                    entry_in_status(&mut tx, ledger, *entry_id, EntryStatus::Draft).await?,
                )?;
                ensure_unlocked(&mut tx, ledger, draft.period()).await?;
                ensure_source_free(&mut tx, ledger, draft.source).await?;
                ensure_lines_total(&mut tx, *entry_id, *total_debit, *total_credit).await?;

                sqlx::query(
                    r#"
                    UPDATE journal_entries
                    SET status = 'POSTED', total_debit = $2, total_credit = $3, posted_at = $4
                    WHERE entry_id = $1
                    "#,
                )
                .bind(Uuid::from(*entry_id))
                .bind(*total_debit)
                .bind(*total_credit)
                .bind(*posted_at)
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
            }
            LedgerCommit::Insert { entry, lines } => {
                ensure_unlocked(&mut tx, ledger, entry.period()).await?;
                ensure_source_free(&mut tx, ledger, entry.source).await?;
                insert_entry(&mut tx, entry, lines).await?;
            }
            LedgerCommit::Reverse {
                original_id,
                reversal,
                lines,
            } => {
                entry_in_status(&mut tx, ledger, *original_id, EntryStatus::Posted).await?;
                ensure_unlocked(&mut tx, ledger, reversal.period()).await?;
                insert_entry(&mut tx, reversal, lines).await?;

                sqlx::query(
                    "UPDATE journal_entries SET status = 'REVERSED', reversed_by = $2 WHERE entry_id = $1",
                )
                .bind(Uuid::from(*original_id))
                .bind(Uuid::from(reversal.id))
                .execute(&mut *tx)
                .await
                .map_err(store_err)?;
            }
        }

        tx.commit().await.map_err(store_err)?;
        debug!("Ledger commit applied");
        Ok(())
    }

    // ========================================================================
    // Projections
    // ========================================================================

    async fn posted_lines(&self, ledger: LedgerId, query: &LineQuery) -> Result<Vec<PostedLine>, StoreError> {
        let (from, to) = bounds(query.range);
        let rows: Vec<PostedLineRow> = sqlx::query_as(
            r#"
            SELECT e.entry_number, e.entry_date, e.description AS entry_description, e.posted_at,
                   l.line_id, l.entry_id, l.line_no, l.account_id, l.debit, l.credit,
                   l.currency, l.fx_rate, l.amount_base, l.description
            FROM journal_lines l
            JOIN journal_entries e ON e.entry_id = l.entry_id
            WHERE e.ledger_id = $1
              AND e.status IN ('POSTED', 'REVERSED')
              AND ($2::date IS NULL OR e.entry_date >= $2)
              AND ($3::date IS NULL OR e.entry_date <= $3)
              AND ($4::uuid IS NULL OR l.account_id = $4)
              AND ($5 OR (e.status = 'POSTED' AND e.reverses IS NULL))
            ORDER BY e.entry_date, e.posted_at, e.entry_number, l.line_no
            "#,
        )
        .bind(Uuid::from(ledger))
        .bind(from)
        .bind(to)
        .bind(query.account_id.map(Uuid::from))
        .bind(query.include_reversed)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.into_iter()
            .map(|r| PostedLine::try_from(r).map_err(StoreError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_bounds_become_null() {
        assert_eq!(bounds(DateRange::all_time()), (None, None));

        let from = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let range = DateRange::new(from, to).unwrap();
        assert_eq!(bounds(range), (Some(from), Some(to)));
    }
}
