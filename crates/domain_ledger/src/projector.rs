//! Ledger projections
//!
//! Read-only aggregation over committed lines, in base currency. Drafts never
//! appear: the store only hands out lines of POSTED and REVERSED entries.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use core_kernel::{AccountId, Currency, DateRange, JournalEntryId, LedgerId, Money};

use crate::account::{Account, AccountType};
use crate::error::LedgerError;
use crate::journal::Side;
use crate::store::{LedgerStore, LineQuery, PostedLine};

/// Options shared by every projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectionOptions {
    /// Include reversed originals and their reversals
    pub include_reversed: bool,
}

impl Default for ProjectionOptions {
    fn default() -> Self {
        Self {
            include_reversed: true,
        }
    }
}

/// Net balance of one account on its natural side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceRow {
    pub account_id: AccountId,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub debit_balance: Money,
    pub credit_balance: Money,
}

/// Trial balance over a date range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalance {
    pub range: DateRange,
    /// Ordered by account code
    pub rows: Vec<TrialBalanceRow>,
    pub total_debit: Money,
    pub total_credit: Money,
    pub is_balanced: bool,
}

impl TrialBalance {
    pub fn row(&self, code: &str) -> Option<&TrialBalanceRow> {
        self.rows.iter().find(|r| r.code == code)
    }
}

/// One line of an account's ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub date: NaiveDate,
    pub posted_at: DateTime<Utc>,
    pub entry_id: JournalEntryId,
    pub entry_number: String,
    pub line_no: u32,
    pub description: String,
    pub debit: Money,
    pub credit: Money,
    /// Transaction currency amount and rate when the line was foreign
    pub original: Option<(Money, Decimal)>,
    /// Running `debit - credit`
    pub running_balance: Money,
}

/// Totals trailer of an account statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementSummary {
    pub total_debit: Money,
    pub total_credit: Money,
    pub final_balance: Money,
}

/// An account's ledger with a summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStatement {
    pub account: Account,
    pub range: DateRange,
    pub rows: Vec<LedgerRow>,
    pub summary: StatementSummary,
}

/// Read-only projector
pub struct LedgerProjector {
    store: Arc<dyn LedgerStore>,
    base_currency: Currency,
}

impl LedgerProjector {
    pub fn new(store: Arc<dyn LedgerStore>, base_currency: Currency) -> Self {
        Self { store, base_currency }
    }

    /// Trial balance with default options
    pub async fn trial_balance(
        &self,
        ledger: LedgerId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<TrialBalance, LedgerError> {
        self.trial_balance_with(ledger, from, to, ProjectionOptions::default()).await
    }

    /// Nets every account's lines on its natural side
    ///
    /// Accounts whose debits and credits cancel out are omitted.
    pub async fn trial_balance_with(
        &self,
        ledger: LedgerId,
        from: NaiveDate,
        to: NaiveDate,
        options: ProjectionOptions,
    ) -> Result<TrialBalance, LedgerError> {
        let range = DateRange::new(from, to)?;
        let lines = self.lines(ledger, range, None, options).await?;

        let mut sums: BTreeMap<AccountId, (i64, i64)> = BTreeMap::new();
        for posted in &lines {
            let (debit, credit) = sums.entry(posted.line.account_id).or_insert((0, 0));
            let total = match posted.line.side() {
                Side::Debit => debit,
                Side::Credit => credit,
            };
            *total = checked(total.checked_add(posted.line.amount_base))?;
        }

        let accounts: BTreeMap<AccountId, Account> = self
            .store
            .list_accounts(ledger)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();

        let mut rows = Vec::new();
        let (mut total_debit, mut total_credit) = (0i64, 0i64);
        for (account_id, (debit, credit)) in sums {
            let account = accounts
                .get(&account_id)
                .ok_or_else(|| LedgerError::not_found("account", account_id))?;
            let (debit_balance, credit_balance) = match account.normal_side() {
                Side::Debit => (checked(debit.checked_sub(credit))?, 0),
                Side::Credit => (0, checked(credit.checked_sub(debit))?),
            };
            if debit_balance == 0 && credit_balance == 0 {
                continue;
            }
            total_debit = checked(total_debit.checked_add(debit_balance))?;
            total_credit = checked(total_credit.checked_add(credit_balance))?;
            rows.push(TrialBalanceRow {
                account_id,
                code: account.code.clone(),
                name: account.name.clone(),
                account_type: account.account_type,
                debit_balance: self.money(debit_balance),
                credit_balance: self.money(credit_balance),
            });
        }
        rows.sort_by(|a, b| a.code.cmp(&b.code));

        debug!(ledger_id = %ledger, accounts = rows.len(), "Trial balance computed");
        Ok(TrialBalance {
            range,
            rows,
            total_debit: self.money(total_debit),
            total_credit: self.money(total_credit),
            is_balanced: total_debit == total_credit,
        })
    }

    /// General ledger with default options
    pub async fn general_ledger(
        &self,
        ledger: LedgerId,
        account_id: AccountId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<LedgerRow>, LedgerError> {
        self.general_ledger_with(ledger, account_id, from, to, ProjectionOptions::default())
            .await
    }

    /// Lines of one account ordered by date, posting time, entry number and line number
    ///
    /// The running balance is a plain `debit - credit` total starting at zero
    /// on `from`.
    pub async fn general_ledger_with(
        &self,
        ledger: LedgerId,
        account_id: AccountId,
        from: NaiveDate,
        to: NaiveDate,
        options: ProjectionOptions,
    ) -> Result<Vec<LedgerRow>, LedgerError> {
        let range = DateRange::new(from, to)?;
        self.account(ledger, account_id).await?;
        self.ledger_rows(ledger, account_id, range, options).await
    }

    /// Account statement with default options
    pub async fn account_statement(
        &self,
        ledger: LedgerId,
        account_id: AccountId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<AccountStatement, LedgerError> {
        self.account_statement_with(ledger, account_id, from, to, ProjectionOptions::default())
            .await
    }

    /// General ledger rows packaged with totals
    pub async fn account_statement_with(
        &self,
        ledger: LedgerId,
        account_id: AccountId,
        from: NaiveDate,
        to: NaiveDate,
        options: ProjectionOptions,
    ) -> Result<AccountStatement, LedgerError> {
        let range = DateRange::new(from, to)?;
        let account = self.account(ledger, account_id).await?;
        let rows = self.ledger_rows(ledger, account_id, range, options).await?;

        let zero = Money::zero(self.base_currency);
        let mut total_debit = zero;
        let mut total_credit = zero;
        for row in &rows {
            total_debit = total_debit.checked_add(&row.debit)?;
            total_credit = total_credit.checked_add(&row.credit)?;
        }
        let final_balance = rows.last().map_or(zero, |r| r.running_balance);

        Ok(AccountStatement {
            account,
            range,
            rows,
            summary: StatementSummary {
                total_debit,
                total_credit,
                final_balance,
            },
        })
    }

    async fn account(&self, ledger: LedgerId, account_id: AccountId) -> Result<Account, LedgerError> {
        self.store
            .get_account(ledger, account_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("account", account_id))
    }

    async fn ledger_rows(
        &self,
        ledger: LedgerId,
        account_id: AccountId,
        range: DateRange,
        options: ProjectionOptions,
    ) -> Result<Vec<LedgerRow>, LedgerError> {
        let mut lines = self.lines(ledger, range, Some(account_id), options).await?;
        lines.sort_by(|a, b| {
            a.entry_date
                .cmp(&b.entry_date)
                .then_with(|| a.posted_at.cmp(&b.posted_at))
                .then_with(|| a.entry_number.cmp(&b.entry_number))
                .then_with(|| a.line.line_no.cmp(&b.line.line_no))
        });

        let mut running: i64 = 0;
        let mut rows = Vec::with_capacity(lines.len());
        for posted in lines {
            let (debit, credit) = match posted.line.side() {
                Side::Debit => (posted.line.amount_base, 0),
                Side::Credit => (0, posted.line.amount_base),
            };
            running = checked(running.checked_add(debit).and_then(|r| r.checked_sub(credit)))?;

            let original = (posted.line.currency != self.base_currency)
                .then(|| (posted.line.amount(), posted.line.fx_rate));
            rows.push(LedgerRow {
                date: posted.entry_date,
                posted_at: posted.posted_at,
                entry_id: posted.entry_id,
                entry_number: posted.entry_number,
                line_no: posted.line.line_no,
                description: posted.line.description.unwrap_or(posted.entry_description),
                debit: self.money(debit),
                credit: self.money(credit),
                original,
                running_balance: self.money(running),
            });
        }
        Ok(rows)
    }

    async fn lines(
        &self,
        ledger: LedgerId,
        range: DateRange,
        account_id: Option<AccountId>,
        options: ProjectionOptions,
    ) -> Result<Vec<PostedLine>, LedgerError> {
        let query = LineQuery {
            range,
            account_id,
            include_reversed: options.include_reversed,
        };
        Ok(self.store.posted_lines(ledger, &query).await?)
    }

    fn money(&self, minor: i64) -> Money {
        Money::from_minor(minor, self.base_currency)
    }
}

fn checked(value: Option<i64>) -> Result<i64, LedgerError> {
    value.ok_or_else(|| LedgerError::validation("balance overflows"))
}
