//! Ledger Domain - Double-Entry Accounting Core
//!
//! This crate implements the accounting ledger core: a strict double-entry
//! journal with a DRAFT → POSTED → REVERSED state machine, rule-based posting
//! of business documents, period locks, currency conversion and balance
//! projections.
//!
//! # Double-Entry Accounting Principles
//!
//! Every journal entry creates balanced debits and credits:
//! - Debits increase asset/expense accounts
//! - Credits increase liability/equity/income accounts
//! - The sum of all debits must equal the sum of all credits, exactly, in
//!   base currency minor units
//!
//! # Components
//!
//! - [`ChartOfAccounts`]: accounts, hierarchy and code resolution
//! - [`CurrencyConverter`]: foreign amounts to base currency at posting time
//! - [`PeriodLockRegistry`]: months closed to new postings
//! - [`JournalEngine`]: the only writer of journal entries
//! - [`PostingRuleEngine`]: business events to balanced entries
//! - [`LedgerProjector`]: trial balance, general ledger, account statement
//!
//! Every call takes an explicit [`LedgerId`](core_kernel::LedgerId).
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_ledger::{Ledger, LedgerConfig, NewEntry, StaticRateTable};
//!
//! let ledger = Ledger::in_memory(LedgerConfig::default(), StaticRateTable::new())?;
//!
//! let entry = NewEntry::new("Opening capital", date)
//!     .debit(cash, Money::new(dec!(5000), Currency::TRY))
//!     .credit(capital, Money::new(dec!(5000), Currency::TRY));
//!
//! ledger.journal().post_direct(company, entry).await?;
//! ```

pub mod account;
pub mod chart;
pub mod config;
pub mod currency;
pub mod engine;
pub mod error;
pub mod journal;
pub mod ledger;
pub mod period;
pub mod posting;
pub mod projector;
pub mod store;
pub mod writers;

pub use account::{Account, AccountType, StandardAccount, StandardChart};
pub use chart::ChartOfAccounts;
pub use config::LedgerConfig;
pub use currency::{Conversion, CurrencyConverter, RateSource, StaticRateTable};
pub use engine::JournalEngine;
pub use error::LedgerError;
pub use journal::{
    EntryStatus, EntryWithLines, JournalEntry, JournalLine, LineDraft, NewEntry, Side, SourceKind,
    SourceRef,
};
pub use ledger::Ledger;
pub use period::{PeriodLock, PeriodLockRegistry};
pub use posting::{
    AccountRole, CashClassification, CashDirection, CashSubtype, CashTransaction,
    CashTransactionKind, InventoryCount, LedgerEvent, PostingOutcome, PostingRuleEngine,
    PurchaseInvoice, RoleMap, SaleInvoice, StockMovement,
};
pub use projector::{
    AccountStatement, LedgerProjector, LedgerRow, ProjectionOptions, StatementSummary, TrialBalance,
    TrialBalanceRow,
};
pub use store::{
    EntryQuery, InMemoryLedgerStore, LedgerCommit, LedgerStore, LineQuery, PostedLine, StoreError,
};
pub use writers::LedgerWriters;
