//! Account roles and cash classification
//!
//! Templates name the accounts they touch by role; a [`RoleMap`] turns each
//! role into an account code of the ledger's chart.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::LedgerError;

/// Role an account plays in a posting template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccountRole {
    AccountsReceivable,
    SalesRevenue,
    OutputVat,
    PurchaseExpense,
    InputVat,
    AccountsPayable,
    Cash,
    OtherIncome,
    OtherExpense,
    Inventory,
    CostOfGoodsSold,
    InventoryGain,
    InventoryLoss,
}

impl AccountRole {
    pub fn all() -> &'static [AccountRole] {
        use AccountRole::*;
        &[
            AccountsReceivable,
            SalesRevenue,
            OutputVat,
            PurchaseExpense,
            InputVat,
            AccountsPayable,
            Cash,
            OtherIncome,
            OtherExpense,
            Inventory,
            CostOfGoodsSold,
            InventoryGain,
            InventoryLoss,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountRole::AccountsReceivable => "accounts-receivable",
            AccountRole::SalesRevenue => "sales-revenue",
            AccountRole::OutputVat => "output-vat",
            AccountRole::PurchaseExpense => "purchase-expense",
            AccountRole::InputVat => "input-vat",
            AccountRole::AccountsPayable => "accounts-payable",
            AccountRole::Cash => "cash",
            AccountRole::OtherIncome => "other-income",
            AccountRole::OtherExpense => "other-expense",
            AccountRole::Inventory => "inventory",
            AccountRole::CostOfGoodsSold => "cost-of-goods-sold",
            AccountRole::InventoryGain => "inventory-gain",
            AccountRole::InventoryLoss => "inventory-loss",
        }
    }

    /// Code of the standard chart account that plays this role
    pub fn standard_code(&self) -> &'static str {
        match self {
            AccountRole::AccountsReceivable => "120",
            AccountRole::SalesRevenue => "600",
            AccountRole::OutputVat => "391",
            AccountRole::PurchaseExpense => "770",
            AccountRole::InputVat => "191",
            AccountRole::AccountsPayable => "320",
            AccountRole::Cash => "100",
            AccountRole::OtherIncome => "649",
            AccountRole::OtherExpense => "659",
            AccountRole::Inventory => "153",
            AccountRole::CostOfGoodsSold => "621",
            AccountRole::InventoryGain => "679",
            AccountRole::InventoryLoss => "689",
        }
    }
}

impl fmt::Display for AccountRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role to account code mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleMap(HashMap<AccountRole, String>);

impl RoleMap {
    /// A map with no roles assigned
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Every role mapped to its standard chart code
    pub fn standard() -> Self {
        Self(
            AccountRole::all()
                .iter()
                .map(|role| (*role, role.standard_code().to_string()))
                .collect(),
        )
    }

    pub fn with(mut self, role: AccountRole, code: impl Into<String>) -> Self {
        self.0.insert(role, code.into());
        self
    }

    pub fn without(mut self, role: AccountRole) -> Self {
        self.0.remove(&role);
        self
    }

    pub fn code_for(&self, role: AccountRole) -> Option<&str> {
        self.0.get(&role).map(String::as_str)
    }

    /// Assigns the standard code to every role left unmapped
    pub fn fill_missing(mut self) -> Self {
        for role in AccountRole::all() {
            self.0
                .entry(*role)
                .or_insert_with(|| role.standard_code().to_string());
        }
        self
    }
}

impl Default for RoleMap {
    fn default() -> Self {
        Self::standard()
    }
}

/// Subtypes of cash transactions that are neither receipts nor payments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashSubtype {
    Interest,
    Commission,
    Expense,
    BankCharge,
    TaxPayment,
    InterestIncome,
    Dividend,
    OtherIncome,
}

impl CashSubtype {
    pub fn all() -> &'static [CashSubtype] {
        use CashSubtype::*;
        &[
            Interest,
            Commission,
            Expense,
            BankCharge,
            TaxPayment,
            InterestIncome,
            Dividend,
            OtherIncome,
        ]
    }
}

/// Which way money moves through the cash account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashDirection {
    /// Debit cash, credit income
    Inflow,
    /// Debit expense, credit cash
    Outflow,
}

/// Direction of every cash subtype
///
/// Must cover the whole [`CashSubtype`] enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CashClassification(HashMap<CashSubtype, CashDirection>);

impl CashClassification {
    /// Builds a classification, rejecting tables that miss a subtype
    pub fn new(table: HashMap<CashSubtype, CashDirection>) -> Result<Self, LedgerError> {
        let classification = Self(table);
        classification.validate()?;
        Ok(classification)
    }

    /// Interest, commission, expense, bank charge and tax payments flow out
    pub fn standard() -> Self {
        use CashDirection::*;
        use CashSubtype::*;

        Self(HashMap::from([
            (Interest, Outflow),
            (Commission, Outflow),
            (Expense, Outflow),
            (BankCharge, Outflow),
            (TaxPayment, Outflow),
            (InterestIncome, Inflow),
            (Dividend, Inflow),
            (OtherIncome, Inflow),
        ]))
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        let missing: Vec<String> = CashSubtype::all()
            .iter()
            .filter(|s| !self.0.contains_key(*s))
            .map(|s| format!("{:?}", s))
            .collect();
        if !missing.is_empty() {
            return Err(LedgerError::configuration(format!(
                "cash classification does not cover subtypes: {}",
                missing.join(", ")
            )));
        }
        Ok(())
    }

    pub fn direction(&self, subtype: CashSubtype) -> Result<CashDirection, LedgerError> {
        self.0.get(&subtype).copied().ok_or_else(|| {
            LedgerError::configuration(format!("cash subtype {:?} is not classified", subtype))
        })
    }
}

impl Default for CashClassification {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::StandardChart;

    #[test]
    fn test_standard_roles_exist_in_standard_chart() {
        let chart = StandardChart::trading_company();
        for role in AccountRole::all() {
            assert!(
                chart.iter().any(|a| a.code == role.standard_code()),
                "role {} maps to missing code {}",
                role,
                role.standard_code()
            );
        }
    }

    #[test]
    fn test_fill_missing_keeps_overrides() {
        let roles = RoleMap::empty().with(AccountRole::Cash, "102").fill_missing();
        assert_eq!(roles.code_for(AccountRole::Cash), Some("102"));
        assert_eq!(roles.code_for(AccountRole::SalesRevenue), Some("600"));
    }

    #[test]
    fn test_standard_classification_is_complete() {
        let standard = CashClassification::standard();
        standard.validate().unwrap();
        assert_eq!(standard.direction(CashSubtype::Commission).unwrap(), CashDirection::Outflow);
        assert_eq!(standard.direction(CashSubtype::Dividend).unwrap(), CashDirection::Inflow);
    }

    #[test]
    fn test_incomplete_classification_rejected() {
        let table = HashMap::from([(CashSubtype::Interest, CashDirection::Outflow)]);
        let result = CashClassification::new(table);
        assert!(matches!(result, Err(LedgerError::Configuration(ref m)) if m.contains("Dividend")));
    }

    #[test]
    fn test_classification_from_config_keys() {
        let json = r#"{"interest":"outflow","commission":"outflow","expense":"outflow",
            "bank_charge":"outflow","tax_payment":"outflow","interest_income":"inflow",
            "dividend":"inflow","other_income":"inflow"}"#;
        let parsed: CashClassification = serde_json::from_str(json).unwrap();
        parsed.validate().unwrap();
    }
}
