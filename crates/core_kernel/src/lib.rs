//! Core Kernel - Foundational types and utilities for the ledger system
//!
//! This crate provides the fundamental building blocks used across the ledger crates:
//! - Money types with precise decimal arithmetic and strict minor-unit conversion
//! - Accounting periods and inclusive date ranges
//! - Strongly-typed identifiers
//! - Port primitives shared by storage adapters

pub mod money;
pub mod temporal;
pub mod identifiers;
pub mod ports;
pub mod error;

pub use money::{Money, Currency, MoneyError};
pub use temporal::{AccountingPeriod, DateRange, TemporalError};
pub use identifiers::{
    LedgerId, AccountId, JournalEntryId, JournalLineId, PeriodLockId,
    InvoiceId, CashTransactionId, StockMovementId,
};
pub use ports::{PortError, DomainPort, AdapterHealth, HealthCheckable, HealthCheckResult};
pub use error::CoreError;
