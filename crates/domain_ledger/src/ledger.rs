//! Assembled ledger core
//!
//! Wires the services over one store, one rate source and one writer
//! registry, so that every mutating path serializes on the same per-ledger
//! guard.
//!
//! # Invariants
//!
//! - Every committed entry balances exactly in base currency minor units
//! - No entry is committed into a locked period
//! - Committed entries are never edited, only reversed

use std::sync::Arc;

use crate::chart::ChartOfAccounts;
use crate::config::LedgerConfig;
use crate::currency::{CurrencyConverter, RateSource, StaticRateTable};
use crate::engine::JournalEngine;
use crate::error::LedgerError;
use crate::period::PeriodLockRegistry;
use crate::posting::PostingRuleEngine;
use crate::projector::LedgerProjector;
use crate::store::{InMemoryLedgerStore, LedgerStore};
use crate::writers::LedgerWriters;

/// The ledger core services
///
/// # Example
///
/// ```rust,ignore
/// let ledger = Ledger::new(LedgerConfig::default(), store, rates)?;
/// ledger.chart().seed(company, &StandardChart::trading_company()).await?;
/// ledger.posting().post_event(company, &LedgerEvent::SaleInvoicePosted(invoice)).await?;
/// let tb = ledger.projector().trial_balance(company, from, to).await?;
/// ```
pub struct Ledger {
    config: LedgerConfig,
    chart: Arc<ChartOfAccounts>,
    periods: Arc<PeriodLockRegistry>,
    journal: Arc<JournalEngine>,
    posting: PostingRuleEngine,
    projector: LedgerProjector,
    converter: CurrencyConverter,
}

impl Ledger {
    /// Builds the services
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the configuration is invalid.
    pub fn new(
        config: LedgerConfig,
        store: Arc<dyn LedgerStore>,
        rates: Arc<dyn RateSource>,
    ) -> Result<Self, LedgerError> {
        let config = config
            .normalized()
            .map_err(|e| LedgerError::configuration(e.to_string()))?;
        let writers = Arc::new(LedgerWriters::new());

        let chart = Arc::new(ChartOfAccounts::new(Arc::clone(&store), Arc::clone(&writers)));
        let periods = Arc::new(PeriodLockRegistry::new(Arc::clone(&store), Arc::clone(&writers)));
        let journal = Arc::new(JournalEngine::new(
            Arc::clone(&store),
            Arc::clone(&writers),
            config.base_currency,
            config.entry_number_prefix.clone(),
        ));
        let converter =
            CurrencyConverter::new(config.base_currency, rates).with_lookback(config.rate_lookback_days);
        let posting = PostingRuleEngine::new(
            Arc::clone(&journal),
            Arc::clone(&chart),
            Arc::clone(&store),
            converter.clone(),
            config.roles.clone(),
            config.cash_classification(),
        );
        let projector = LedgerProjector::new(store, config.base_currency);

        Ok(Self {
            config,
            chart,
            periods,
            journal,
            posting,
            projector,
            converter,
        })
    }

    /// Ledger core over an in-memory store
    pub fn in_memory(config: LedgerConfig, rates: StaticRateTable) -> Result<Self, LedgerError> {
        Self::new(config, Arc::new(InMemoryLedgerStore::new()), Arc::new(rates))
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn chart(&self) -> &ChartOfAccounts {
        &self.chart
    }

    pub fn periods(&self) -> &PeriodLockRegistry {
        &self.periods
    }

    pub fn journal(&self) -> &JournalEngine {
        &self.journal
    }

    pub fn posting(&self) -> &PostingRuleEngine {
        &self.posting
    }

    pub fn projector(&self) -> &LedgerProjector {
        &self.projector
    }

    pub fn converter(&self) -> &CurrencyConverter {
        &self.converter
    }
}
