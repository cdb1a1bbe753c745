//! Database row types and their conversion to ledger types

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

use core_kernel::{AccountingPeriod, Currency};
use domain_ledger::{
    Account, AccountType, EntryStatus, JournalEntry, JournalLine, PeriodLock, PostedLine, SourceKind,
    SourceRef,
};

use crate::error::DatabaseError;

#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub account_id: Uuid,
    pub ledger_id: Uuid,
    pub code: String,
    pub name: String,
    pub account_type: String,
    pub parent_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = DatabaseError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let account_type: AccountType = row
            .account_type
            .parse()
            .map_err(|e| DatabaseError::serialization(format!("account {}: {}", row.account_id, e)))?;
        Ok(Account {
            id: row.account_id.into(),
            ledger_id: row.ledger_id.into(),
            code: row.code,
            name: row.name,
            account_type,
            parent_id: row.parent_id.map(Into::into),
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PeriodLockRow {
    pub lock_id: Uuid,
    pub ledger_id: Uuid,
    pub year: i32,
    pub month: i32,
    pub is_locked: bool,
    pub locked_at: DateTime<Utc>,
    pub locked_by: String,
}

impl TryFrom<PeriodLockRow> for PeriodLock {
    type Error = DatabaseError;

    fn try_from(row: PeriodLockRow) -> Result<Self, Self::Error> {
        let month = u32::try_from(row.month)
            .map_err(|_| DatabaseError::serialization(format!("period lock {}: month {}", row.lock_id, row.month)))?;
        let period = AccountingPeriod::new(row.year, month)
            .map_err(|e| DatabaseError::serialization(e.to_string()))?;
        Ok(PeriodLock {
            id: row.lock_id.into(),
            ledger_id: row.ledger_id.into(),
            period,
            is_locked: row.is_locked,
            locked_at: row.locked_at,
            locked_by: row.locked_by,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct EntryRow {
    pub entry_id: Uuid,
    pub ledger_id: Uuid,
    pub entry_number: String,
    pub entry_date: NaiveDate,
    pub description: String,
    pub status: String,
    pub total_debit: i64,
    pub total_credit: i64,
    pub source_kind: Option<String>,
    pub source_id: Option<Uuid>,
    pub reverses: Option<Uuid>,
    pub reversed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub posted_at: Option<DateTime<Utc>>,
}

pub(crate) fn parse_status(entry_id: Uuid, status: &str) -> Result<EntryStatus, DatabaseError> {
    status
        .parse()
        .map_err(|e| DatabaseError::serialization(format!("entry {}: {}", entry_id, e)))
}

impl TryFrom<EntryRow> for JournalEntry {
    type Error = DatabaseError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        let status = parse_status(row.entry_id, &row.status)?;
        let source = match (row.source_kind, row.source_id) {
            (Some(kind), Some(id)) => {
                let kind: SourceKind = kind
                    .parse()
                    .map_err(|e| DatabaseError::serialization(format!("entry {}: {}", row.entry_id, e)))?;
                Some(SourceRef { kind, id })
            }
            _ => None,
        };
        Ok(JournalEntry {
            id: row.entry_id.into(),
            ledger_id: row.ledger_id.into(),
            number: row.entry_number,
            date: row.entry_date,
            description: row.description,
            status,
            total_debit: row.total_debit,
            total_credit: row.total_credit,
            source,
            reverses: row.reverses.map(Into::into),
            reversed_by: row.reversed_by.map(Into::into),
            created_at: row.created_at,
            posted_at: row.posted_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct LineRow {
    pub line_id: Uuid,
    pub entry_id: Uuid,
    pub line_no: i32,
    pub account_id: Uuid,
    pub debit: i64,
    pub credit: i64,
    pub currency: String,
    pub fx_rate: Decimal,
    pub amount_base: i64,
    pub description: Option<String>,
}

impl TryFrom<LineRow> for JournalLine {
    type Error = DatabaseError;

    fn try_from(row: LineRow) -> Result<Self, Self::Error> {
        let line_no = u32::try_from(row.line_no)
            .map_err(|_| DatabaseError::serialization(format!("line {}: line_no {}", row.line_id, row.line_no)))?;
        let currency: Currency = row
            .currency
            .parse()
            .map_err(|e| DatabaseError::serialization(format!("line {}: {}", row.line_id, e)))?;
        Ok(JournalLine {
            id: row.line_id.into(),
            entry_id: row.entry_id.into(),
            line_no,
            account_id: row.account_id.into(),
            debit: row.debit,
            credit: row.credit,
            currency,
            fx_rate: row.fx_rate,
            amount_base: row.amount_base,
            description: row.description,
        })
    }
}

/// A committed line joined with its entry header
#[derive(Debug, Clone, FromRow)]
pub struct PostedLineRow {
    pub entry_number: String,
    pub entry_date: NaiveDate,
    pub entry_description: String,
    pub posted_at: DateTime<Utc>,
    #[sqlx(flatten)]
    pub line: LineRow,
}

impl TryFrom<PostedLineRow> for PostedLine {
    type Error = DatabaseError;

    fn try_from(row: PostedLineRow) -> Result<Self, Self::Error> {
        let line = JournalLine::try_from(row.line)?;
        Ok(PostedLine {
            entry_id: line.entry_id,
            entry_number: row.entry_number,
            entry_date: row.entry_date,
            entry_description: row.entry_description,
            posted_at: row.posted_at,
            line,
        })
    }
}
