//! Ledger configuration
//!
//! Loaded from built-in defaults, then an optional TOML file, then
//! environment variables such as `LEDGER_BASE_CURRENCY` or
//! `LEDGER_ROLES__CASH`.

use serde::{Deserialize, Serialize};
use std::path::Path;

use core_kernel::{CoreError, Currency};

use crate::posting::roles::{CashClassification, RoleMap};

/// Ledger core configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Currency all balances are kept in
    pub base_currency: Currency,
    /// Prefix of entry numbers (`<prefix>-<year>-<sequence>`)
    pub entry_number_prefix: String,
    /// Days a rate may be older than the document date; 0 means exact date
    pub rate_lookback_days: u32,
    /// Account codes per role; unmapped roles use the standard chart codes
    pub roles: RoleMap,
    /// Direction of each cash subtype; must be complete when given
    pub cash_classification: Option<CashClassification>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_currency: Currency::TRY,
            entry_number_prefix: "JV".to_string(),
            rate_lookback_days: 0,
            roles: RoleMap::standard(),
            cash_classification: None,
        }
    }
}

impl LedgerConfig {
    /// Loads `.env`, the optional file, then `LEDGER_*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let config: LedgerConfig = builder
            .add_source(
                config::Environment::with_prefix("LEDGER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| CoreError::configuration(e.to_string()))?;
        config.normalized()
    }

    /// Parses configuration from TOML text
    pub fn from_toml_str(toml: &str) -> Result<Self, CoreError> {
        let config: LedgerConfig = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| CoreError::configuration(e.to_string()))?;
        config.normalized()
    }

    /// Fills unmapped roles and validates the rest
    pub fn normalized(mut self) -> Result<Self, CoreError> {
        self.roles = self.roles.fill_missing();
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.entry_number_prefix.trim().is_empty() {
            return Err(CoreError::configuration("entry_number_prefix must not be empty"));
        }
        if let Some(classification) = &self.cash_classification {
            classification
                .validate()
                .map_err(|e| CoreError::configuration(e.to_string()))?;
        }
        Ok(())
    }

    pub fn cash_classification(&self) -> CashClassification {
        self.cash_classification.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posting::roles::{AccountRole, CashDirection, CashSubtype};

    #[test]
    fn test_defaults() {
        let config = LedgerConfig::from_toml_str("").unwrap();
        assert_eq!(config, LedgerConfig::default());
        assert_eq!(
            config.cash_classification().direction(CashSubtype::Interest).unwrap(),
            CashDirection::Outflow
        );
    }

    #[test]
    fn test_partial_roles_are_filled() {
        let config = LedgerConfig::from_toml_str(
            r#"
            base_currency = "EUR"
            rate_lookback_days = 3

            [roles]
            cash = "102"
            "#,
        )
        .unwrap();

        assert_eq!(config.base_currency, Currency::EUR);
        assert_eq!(config.rate_lookback_days, 3);
        assert_eq!(config.roles.code_for(AccountRole::Cash), Some("102"));
        assert_eq!(config.roles.code_for(AccountRole::OutputVat), Some("391"));
    }

    #[test]
    fn test_incomplete_cash_classification_rejected() {
        let result = LedgerConfig::from_toml_str(
            r#"
            [cash_classification]
            interest = "outflow"
            "#,
        );
        assert!(matches!(result, Err(CoreError::Configuration(_))));
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let result = LedgerConfig::from_toml_str(r#"entry_number_prefix = " ""#);
        assert!(matches!(result, Err(CoreError::Configuration(_))));
    }
}
