//! Rule-based posting of business events
//!
//! - [`events`]: the closed set of events the ledger consumes
//! - [`roles`]: account roles and the cash subtype classification
//! - [`templates`]: one pure template per event type
//! - [`engine`]: resolution, conversion and submission to the journal engine

pub mod engine;
pub mod events;
pub mod roles;
pub mod templates;

pub use engine::{PostingOutcome, PostingRuleEngine};
pub use events::{
    CashTransaction, CashTransactionKind, InventoryCount, LedgerEvent, PurchaseInvoice, SaleInvoice,
    StockMovement,
};
pub use roles::{AccountRole, CashClassification, CashDirection, CashSubtype, RoleMap};
pub use templates::{AccountRef, Template, TemplateLine};
