//! Account types for the chart of accounts
//!
//! This module defines the account structure for double-entry bookkeeping
//! and the standard chart a new ledger is seeded with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{AccountId, LedgerId};

use crate::error::LedgerError;
use crate::journal::Side;

/// Types of accounts in the chart of accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    /// Asset accounts (debit normal balance)
    Asset,
    /// Liability accounts (credit normal balance)
    Liability,
    /// Equity accounts (credit normal balance)
    Equity,
    /// Income accounts (credit normal balance)
    Income,
    /// Expense accounts (debit normal balance)
    Expense,
}

impl AccountType {
    /// Returns true if this account type has a debit normal balance
    pub fn is_debit_normal(&self) -> bool {
        matches!(self, AccountType::Asset | AccountType::Expense)
    }

    /// The side on which this account type accumulates a positive balance
    pub fn normal_side(&self) -> Side {
        if self.is_debit_normal() {
            Side::Debit
        } else {
            Side::Credit
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Asset => "ASSET",
            AccountType::Liability => "LIABILITY",
            AccountType::Equity => "EQUITY",
            AccountType::Income => "INCOME",
            AccountType::Expense => "EXPENSE",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASSET" => Ok(AccountType::Asset),
            "LIABILITY" => Ok(AccountType::Liability),
            "EQUITY" => Ok(AccountType::Equity),
            "INCOME" => Ok(AccountType::Income),
            "EXPENSE" => Ok(AccountType::Expense),
            other => Err(LedgerError::validation(format!("unknown account type {}", other))),
        }
    }
}

/// An account in the chart of accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier
    pub id: AccountId,
    /// Owning ledger
    pub ledger_id: LedgerId,
    /// Account code (e.g., "100", "120.01")
    pub code: String,
    /// Account name
    pub name: String,
    /// Account type
    pub account_type: AccountType,
    /// Parent account ID (for hierarchical charts)
    pub parent_id: Option<AccountId>,
    /// Whether account is active
    pub is_active: bool,
    /// When the account was created
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Creates a new active account
    ///
    /// # Arguments
    ///
    /// * `ledger_id` - Owning ledger
    /// * `code` - Account code
    /// * `name` - Account name
    /// * `account_type` - Type of account
    pub fn new(
        ledger_id: LedgerId,
        code: impl Into<String>,
        name: impl Into<String>,
        account_type: AccountType,
    ) -> Self {
        Self {
            id: AccountId::new_v7(),
            ledger_id,
            code: code.into(),
            name: name.into(),
            account_type,
            parent_id: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    /// Sets the parent account
    pub fn with_parent(mut self, parent_id: AccountId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn normal_side(&self) -> Side {
        self.account_type.normal_side()
    }
}

/// Validates an account code
///
/// Codes are digit segments optionally separated by single dots:
/// `100`, `120.01` and `7.70.1` are valid; `12a`, `.100`, `100.` and `1..2` are not.
pub fn validate_code(code: &str) -> Result<(), LedgerError> {
    if code.is_empty() {
        return Err(LedgerError::validation("account code must not be empty"));
    }
    let well_formed = code
        .split('.')
        .all(|segment| !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()));
    if !well_formed {
        return Err(LedgerError::validation(format!(
            "account code {:?} must be digits optionally separated by dots",
            code
        )));
    }
    Ok(())
}

/// One row of a standard chart template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandardAccount {
    pub code: &'static str,
    pub name: &'static str,
    pub account_type: AccountType,
    pub parent_code: Option<&'static str>,
}

const fn group(code: &'static str, name: &'static str, account_type: AccountType) -> StandardAccount {
    StandardAccount {
        code,
        name,
        account_type,
        parent_code: None,
    }
}

const fn leaf(
    code: &'static str,
    name: &'static str,
    account_type: AccountType,
    parent: &'static str,
) -> StandardAccount {
    StandardAccount {
        code,
        name,
        account_type,
        parent_code: Some(parent),
    }
}

/// Standard chart of accounts for a trading company
pub struct StandardChart;

impl StandardChart {
    /// Accounts in seeding order (parents precede their children)
    ///
    /// Includes every account the default posting roles reference.
    pub fn trading_company() -> Vec<StandardAccount> {
        use AccountType::*;

        vec![
            // Assets
            group("10", "Liquid Assets", Asset),
            leaf("100", "Cash on Hand", Asset, "10"),
            leaf("102", "Bank Accounts", Asset, "10"),
            group("12", "Trade Receivables", Asset),
            leaf("120", "Accounts Receivable", Asset, "12"),
            group("15", "Inventories", Asset),
            leaf("153", "Merchandise Inventory", Asset, "15"),
            group("19", "Other Current Assets", Asset),
            leaf("191", "Deductible VAT", Asset, "19"),

            // Liabilities
            group("32", "Trade Payables", Liability),
            leaf("320", "Accounts Payable", Liability, "32"),
            group("39", "Other Current Liabilities", Liability),
            leaf("391", "VAT Payable", Liability, "39"),

            // Equity
            group("50", "Paid-in Capital", Equity),
            leaf("500", "Capital", Equity, "50"),

            // Income
            group("60", "Gross Sales", Income),
            leaf("600", "Domestic Sales", Income, "60"),
            group("64", "Other Operating Income", Income),
            leaf("642", "Interest Income", Income, "64"),
            leaf("649", "Other Operating Income", Income, "64"),
            group("67", "Extraordinary Income", Income),
            leaf("679", "Other Extraordinary Income", Income, "67"),

            // Expenses
            group("62", "Cost of Sales", Expense),
            leaf("621", "Cost of Goods Sold", Expense, "62"),
            group("65", "Other Operating Expenses", Expense),
            leaf("653", "Commission Expenses", Expense, "65"),
            leaf("659", "Other Operating Expenses", Expense, "65"),
            group("68", "Extraordinary Expenses", Expense),
            leaf("689", "Other Extraordinary Expenses", Expense, "68"),
            group("77", "General Administrative Expenses", Expense),
            leaf("770", "General Administrative Expenses", Expense, "77"),
            group("78", "Financing Expenses", Expense),
            leaf("780", "Financing Expenses", Expense, "78"),
        ]
    }
}
