//! Journal entry and line model
//!
//! Amounts on persisted lines are integer minor units. Each line keeps its
//! transaction currency amount next to the base-currency amount used for the
//! balance check.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use core_kernel::{AccountId, AccountingPeriod, Currency, JournalEntryId, JournalLineId, LedgerId, Money};

use crate::currency::to_base;
use crate::error::LedgerError;

/// Lifecycle status of a journal entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    Draft,
    Posted,
    Reversed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Draft => "DRAFT",
            EntryStatus::Posted => "POSTED",
            EntryStatus::Reversed => "REVERSED",
        }
    }

    /// Posted and reversed entries are part of the permanent ledger
    pub fn is_committed(&self) -> bool {
        !matches!(self, EntryStatus::Draft)
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(EntryStatus::Draft),
            "POSTED" => Ok(EntryStatus::Posted),
            "REVERSED" => Ok(EntryStatus::Reversed),
            other => Err(LedgerError::validation(format!("unknown entry status {}", other))),
        }
    }
}

/// Debit or credit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Debit,
    Credit,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Debit => Side::Credit,
            Side::Credit => Side::Debit,
        }
    }
}

/// Kind of business document an entry was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    SaleInvoice,
    SaleInvoiceCancellation,
    PurchaseInvoice,
    PurchaseInvoiceCancellation,
    CashTransaction,
    StockMovement,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::SaleInvoice => "sale_invoice",
            SourceKind::SaleInvoiceCancellation => "sale_invoice_cancellation",
            SourceKind::PurchaseInvoice => "purchase_invoice",
            SourceKind::PurchaseInvoiceCancellation => "purchase_invoice_cancellation",
            SourceKind::CashTransaction => "cash_transaction",
            SourceKind::StockMovement => "stock_movement",
        }
    }
}

impl FromStr for SourceKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sale_invoice" => Ok(SourceKind::SaleInvoice),
            "sale_invoice_cancellation" => Ok(SourceKind::SaleInvoiceCancellation),
            "purchase_invoice" => Ok(SourceKind::PurchaseInvoice),
            "purchase_invoice_cancellation" => Ok(SourceKind::PurchaseInvoiceCancellation),
            "cash_transaction" => Ok(SourceKind::CashTransaction),
            "stock_movement" => Ok(SourceKind::StockMovement),
            other => Err(LedgerError::validation(format!("unknown source kind {}", other))),
        }
    }
}

/// Reference from an entry back to the document it was derived from
///
/// At most one POSTED entry may carry a given source reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub kind: SourceKind,
    pub id: Uuid,
}

impl SourceRef {
    pub fn new(kind: SourceKind, id: impl Into<Uuid>) -> Self {
        Self { kind, id: id.into() }
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

/// A journal entry header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: JournalEntryId,
    pub ledger_id: LedgerId,
    /// Human-readable number, unique per ledger
    pub number: String,
    pub date: NaiveDate,
    pub description: String,
    pub status: EntryStatus,
    /// Base currency minor units over debit lines
    pub total_debit: i64,
    /// Base currency minor units over credit lines
    pub total_credit: i64,
    pub source: Option<SourceRef>,
    /// Set on reversal entries
    pub reverses: Option<JournalEntryId>,
    /// Set on originals once reversed
    pub reversed_by: Option<JournalEntryId>,
    pub created_at: DateTime<Utc>,
    pub posted_at: Option<DateTime<Utc>>,
}

impl JournalEntry {
    pub fn period(&self) -> AccountingPeriod {
        AccountingPeriod::of(self.date)
    }

    pub fn is_balanced(&self) -> bool {
        self.total_debit == self.total_credit
    }
}

/// One debit-or-credit leg of an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    pub id: JournalLineId,
    pub entry_id: JournalEntryId,
    /// 1-based position within the entry
    pub line_no: u32,
    pub account_id: AccountId,
    /// Transaction currency minor units; zero on credit lines
    pub debit: i64,
    /// Transaction currency minor units; zero on debit lines
    pub credit: i64,
    pub currency: Currency,
    /// Base currency units per unit of `currency`
    pub fx_rate: Decimal,
    /// Base currency minor units
    pub amount_base: i64,
    pub description: Option<String>,
}

impl JournalLine {
    pub fn side(&self) -> Side {
        if self.debit != 0 {
            Side::Debit
        } else {
            Side::Credit
        }
    }

    /// The non-zero leg in transaction currency minor units
    pub fn amount_minor(&self) -> i64 {
        self.debit.max(self.credit)
    }

    pub fn amount(&self) -> Money {
        Money::from_minor(self.amount_minor(), self.currency)
    }

    /// The same line on the opposite side, for a reversal entry
    pub fn mirrored(&self, entry_id: JournalEntryId) -> JournalLine {
        JournalLine {
            id: JournalLineId::new_v7(),
            entry_id,
            line_no: self.line_no,
            account_id: self.account_id,
            debit: self.credit,
            credit: self.debit,
            currency: self.currency,
            fx_rate: self.fx_rate,
            amount_base: self.amount_base,
            description: self.description.clone(),
        }
    }
}

/// An entry together with its lines, in line order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryWithLines {
    pub entry: JournalEntry,
    pub lines: Vec<JournalLine>,
}

/// A candidate line handed to the journal engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineDraft {
    pub account_id: AccountId,
    pub debit: Option<Money>,
    pub credit: Option<Money>,
    /// Required for foreign currency lines; absent or 1 for base currency lines
    pub fx_rate: Option<Decimal>,
    /// Precomputed base amount; when absent it is derived from the rate
    pub amount_base: Option<Money>,
    pub description: Option<String>,
}

impl LineDraft {
    pub fn debit(account_id: AccountId, amount: Money) -> Self {
        Self {
            account_id,
            debit: Some(amount),
            credit: None,
            fx_rate: None,
            amount_base: None,
            description: None,
        }
    }

    pub fn credit(account_id: AccountId, amount: Money) -> Self {
        Self {
            account_id,
            debit: None,
            credit: Some(amount),
            fx_rate: None,
            amount_base: None,
            description: None,
        }
    }

    pub fn on_side(side: Side, account_id: AccountId, amount: Money) -> Self {
        match side {
            Side::Debit => Self::debit(account_id, amount),
            Side::Credit => Self::credit(account_id, amount),
        }
    }

    pub fn with_fx_rate(mut self, rate: Decimal) -> Self {
        self.fx_rate = Some(rate);
        self
    }

    /// Fixes the base amount instead of deriving it from the rate
    ///
    /// Used where several converted legs must agree to the minor unit.
    pub fn with_base_amount(mut self, amount: Money) -> Self {
        self.amount_base = Some(amount);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Content of an entry before it is numbered and stored
///
/// # Example
///
/// ```rust,ignore
/// let entry = NewEntry::new("Opening capital", date)
///     .debit(cash, Money::new(dec!(5000), Currency::TRY))
///     .credit(capital, Money::new(dec!(5000), Currency::TRY));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub description: String,
    pub date: NaiveDate,
    pub lines: Vec<LineDraft>,
    pub source: Option<SourceRef>,
}

impl NewEntry {
    pub fn new(description: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            description: description.into(),
            date,
            lines: Vec::new(),
            source: None,
        }
    }

    pub fn debit(mut self, account_id: AccountId, amount: Money) -> Self {
        self.lines.push(LineDraft::debit(account_id, amount));
        self
    }

    pub fn credit(mut self, account_id: AccountId, amount: Money) -> Self {
        self.lines.push(LineDraft::credit(account_id, amount));
        self
    }

    pub fn line(mut self, line: LineDraft) -> Self {
        self.lines.push(line);
        self
    }

    pub fn with_source(mut self, source: SourceRef) -> Self {
        self.source = Some(source);
        self
    }
}

/// Validates candidate lines and converts them to stored lines
///
/// # Errors
///
/// Returns `Validation` if there are no lines, if a line sets both or neither
/// side, if an amount is not positive or has sub-minor precision, or if the
/// exchange rate does not fit the line currency.
pub fn build_lines(
    entry_id: JournalEntryId,
    drafts: &[LineDraft],
    base: Currency,
) -> Result<Vec<JournalLine>, LedgerError> {
    if drafts.is_empty() {
        return Err(LedgerError::validation("entry must have at least one line"));
    }

    drafts
        .iter()
        .enumerate()
        .map(|(index, draft)| {
            let line_no = index as u32 + 1;
            let (side, amount) = match (draft.debit, draft.credit) {
                (Some(amount), None) => (Side::Debit, amount),
                (None, Some(amount)) => (Side::Credit, amount),
                (Some(_), Some(_)) => {
                    return Err(LedgerError::validation(format!(
                        "line {} sets both debit and credit",
                        line_no
                    )))
                }
                (None, None) => {
                    return Err(LedgerError::validation(format!(
                        "line {} sets neither debit nor credit",
                        line_no
                    )))
                }
            };

            if !amount.is_positive() {
                return Err(LedgerError::validation(format!(
                    "line {} amount must be positive, got {}",
                    line_no, amount
                )));
            }

            let rate = line_rate(line_no, amount.currency(), base, draft.fx_rate)?;
            let minor = amount.to_minor()?;
            let amount_base = match draft.amount_base {
                Some(fixed) => fixed_base(line_no, fixed, base)?,
                None => to_base(&amount, rate, base)?.to_minor()?,
            };
            if amount_base == 0 {
                return Err(LedgerError::validation(format!(
                    "line {} rounds to zero in {}",
                    line_no, base
                )));
            }

            let (debit, credit) = match side {
                Side::Debit => (minor, 0),
                Side::Credit => (0, minor),
            };

            Ok(JournalLine {
                id: JournalLineId::new_v7(),
                entry_id,
                line_no,
                account_id: draft.account_id,
                debit,
                credit,
                currency: amount.currency(),
                fx_rate: rate,
                amount_base,
                description: draft.description.clone(),
            })
        })
        .collect()
}

fn fixed_base(line_no: u32, fixed: Money, base: Currency) -> Result<i64, LedgerError> {
    if fixed.currency() != base {
        return Err(LedgerError::validation(format!(
            "line {} base amount is in {}, expected {}",
            line_no,
            fixed.currency(),
            base
        )));
    }
    if fixed.is_negative() {
        return Err(LedgerError::validation(format!(
            "line {} base amount must be positive, got {}",
            line_no, fixed
        )));
    }
    Ok(fixed.to_minor()?)
}

fn line_rate(
    line_no: u32,
    currency: Currency,
    base: Currency,
    rate: Option<Decimal>,
) -> Result<Decimal, LedgerError> {
    match rate {
        None if currency == base => Ok(Decimal::ONE),
        Some(rate) if currency == base && rate == Decimal::ONE => Ok(Decimal::ONE),
        Some(rate) if currency == base => Err(LedgerError::validation(format!(
            "line {} is in base currency {} but carries rate {}",
            line_no, base, rate
        ))),
        None => Err(LedgerError::validation(format!(
            "line {} is in {} and needs an exchange rate to {}",
            line_no, currency, base
        ))),
        Some(rate) if rate <= Decimal::ZERO => Err(LedgerError::validation(format!(
            "line {} exchange rate must be positive, got {}",
            line_no, rate
        ))),
        Some(rate) => Ok(rate),
    }
}

/// Sums base amounts per side
pub fn base_totals(lines: &[JournalLine]) -> Result<(i64, i64), LedgerError> {
    let mut debit: i64 = 0;
    let mut credit: i64 = 0;
    for line in lines {
        let total = match line.side() {
            Side::Debit => &mut debit,
            Side::Credit => &mut credit,
        };
        *total = total
            .checked_add(line.amount_base)
            .ok_or_else(|| LedgerError::validation("entry total overflows"))?;
    }
    Ok((debit, credit))
}

/// Rejects totals that differ by even one minor unit
pub fn ensure_balanced(debit: i64, credit: i64, base: Currency) -> Result<(), LedgerError> {
    if debit != credit {
        return Err(LedgerError::Imbalance {
            debits: Money::from_minor(debit, base).amount(),
            credits: Money::from_minor(credit, base).amount(),
        });
    }
    Ok(())
}
