//! Business events the posting rule engine consumes
//!
//! Each variant carries exactly the fields its template needs. Payloads are
//! assumed to be validated by the document services that emit them.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{CashTransactionId, Currency, InvoiceId, StockMovementId};

use crate::journal::{SourceKind, SourceRef};
use crate::posting::roles::CashSubtype;

/// A finalized sale invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleInvoice {
    pub invoice_id: InvoiceId,
    pub number: String,
    pub date: NaiveDate,
    pub currency: Currency,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    /// Revenue account code overriding the sales-revenue role
    pub revenue_account: Option<String>,
}

/// A finalized purchase invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseInvoice {
    pub invoice_id: InvoiceId,
    pub number: String,
    pub date: NaiveDate,
    pub currency: Currency,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    /// Expense account code overriding the purchase-expense role
    pub expense_account: Option<String>,
}

/// What a cash transaction is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "subtype", rename_all = "snake_case")]
pub enum CashTransactionKind {
    Receipt,
    Payment,
    Other(CashSubtype),
}

/// Money moving in or out of a cash or bank account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashTransaction {
    pub transaction_id: CashTransactionId,
    pub date: NaiveDate,
    pub currency: Currency,
    pub amount: Decimal,
    pub kind: CashTransactionKind,
    pub description: Option<String>,
    /// Cash or bank account code overriding the cash role
    pub cash_account: Option<String>,
    /// Counter-leg account code overriding the role the kind implies
    pub counter_account: Option<String>,
}

/// Goods received into or issued out of stock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub movement_id: StockMovementId,
    pub date: NaiveDate,
    pub currency: Currency,
    pub sku: String,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    /// Counter-leg account code overriding the payable or cost-of-goods role
    pub counter_account: Option<String>,
}

/// A stock count compared with the recorded quantity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryCount {
    pub movement_id: StockMovementId,
    pub date: NaiveDate,
    pub currency: Currency,
    pub sku: String,
    pub counted_quantity: Decimal,
    pub recorded_quantity: Decimal,
    pub unit_cost: Decimal,
}

/// A business event that produces one journal entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    SaleInvoicePosted(SaleInvoice),
    SaleInvoiceCancelled {
        invoice: SaleInvoice,
        cancelled_on: NaiveDate,
    },
    PurchaseInvoicePosted(PurchaseInvoice),
    PurchaseInvoiceCancelled {
        invoice: PurchaseInvoice,
        cancelled_on: NaiveDate,
    },
    CashTransaction(CashTransaction),
    InventoryReceipt(StockMovement),
    InventoryIssue(StockMovement),
    InventoryAdjustment(InventoryCount),
}

impl LedgerEvent {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::SaleInvoicePosted(_) => "sale_invoice_posted",
            LedgerEvent::SaleInvoiceCancelled { .. } => "sale_invoice_cancelled",
            LedgerEvent::PurchaseInvoicePosted(_) => "purchase_invoice_posted",
            LedgerEvent::PurchaseInvoiceCancelled { .. } => "purchase_invoice_cancelled",
            LedgerEvent::CashTransaction(_) => "cash_transaction",
            LedgerEvent::InventoryReceipt(_) => "inventory_receipt",
            LedgerEvent::InventoryIssue(_) => "inventory_issue",
            LedgerEvent::InventoryAdjustment(_) => "inventory_adjustment",
        }
    }

    /// The document reference the derived entry carries
    pub fn source(&self) -> SourceRef {
        match self {
            LedgerEvent::SaleInvoicePosted(inv) => SourceRef::new(SourceKind::SaleInvoice, inv.invoice_id),
            LedgerEvent::SaleInvoiceCancelled { invoice, .. } => {
                SourceRef::new(SourceKind::SaleInvoiceCancellation, invoice.invoice_id)
            }
            LedgerEvent::PurchaseInvoicePosted(inv) => {
                SourceRef::new(SourceKind::PurchaseInvoice, inv.invoice_id)
            }
            LedgerEvent::PurchaseInvoiceCancelled { invoice, .. } => {
                SourceRef::new(SourceKind::PurchaseInvoiceCancellation, invoice.invoice_id)
            }
            LedgerEvent::CashTransaction(tx) => {
                SourceRef::new(SourceKind::CashTransaction, tx.transaction_id)
            }
            LedgerEvent::InventoryReceipt(mv) | LedgerEvent::InventoryIssue(mv) => {
                SourceRef::new(SourceKind::StockMovement, mv.movement_id)
            }
            LedgerEvent::InventoryAdjustment(count) => {
                SourceRef::new(SourceKind::StockMovement, count.movement_id)
            }
        }
    }

    /// For cancellations, the source of the entry being mirrored
    pub fn cancels(&self) -> Option<SourceRef> {
        match self {
            LedgerEvent::SaleInvoiceCancelled { invoice, .. } => {
                Some(SourceRef::new(SourceKind::SaleInvoice, invoice.invoice_id))
            }
            LedgerEvent::PurchaseInvoiceCancelled { invoice, .. } => {
                Some(SourceRef::new(SourceKind::PurchaseInvoice, invoice.invoice_id))
            }
            _ => None,
        }
    }

    /// Date the journal entry is booked on
    pub fn entry_date(&self) -> NaiveDate {
        match self {
            LedgerEvent::SaleInvoicePosted(inv) => inv.date,
            LedgerEvent::SaleInvoiceCancelled { cancelled_on, .. } => *cancelled_on,
            LedgerEvent::PurchaseInvoicePosted(inv) => inv.date,
            LedgerEvent::PurchaseInvoiceCancelled { cancelled_on, .. } => *cancelled_on,
            LedgerEvent::CashTransaction(tx) => tx.date,
            LedgerEvent::InventoryReceipt(mv) | LedgerEvent::InventoryIssue(mv) => mv.date,
            LedgerEvent::InventoryAdjustment(count) => count.date,
        }
    }

    /// Date whose exchange rate applies
    ///
    /// Cancellations convert at the original document's rate so they mirror
    /// the original posting exactly.
    pub fn rate_date(&self) -> NaiveDate {
        match self {
            LedgerEvent::SaleInvoiceCancelled { invoice, .. } => invoice.date,
            LedgerEvent::PurchaseInvoiceCancelled { invoice, .. } => invoice.date,
            other => other.entry_date(),
        }
    }

    pub fn currency(&self) -> Currency {
        match self {
            LedgerEvent::SaleInvoicePosted(inv) => inv.currency,
            LedgerEvent::SaleInvoiceCancelled { invoice, .. } => invoice.currency,
            LedgerEvent::PurchaseInvoicePosted(inv) => inv.currency,
            LedgerEvent::PurchaseInvoiceCancelled { invoice, .. } => invoice.currency,
            LedgerEvent::CashTransaction(tx) => tx.currency,
            LedgerEvent::InventoryReceipt(mv) | LedgerEvent::InventoryIssue(mv) => mv.currency,
            LedgerEvent::InventoryAdjustment(count) => count.currency,
        }
    }
}
