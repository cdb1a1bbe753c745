//! Test Data Builders
//!
//! Builders for business events with consistent defaults: a TRY sale of
//! 1000 + 200 VAT dated Jan 15, 2024, and so on. Tests override only the
//! fields they care about.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{CashTransactionId, Currency, InvoiceId, StockMovementId};
use domain_ledger::{
    CashSubtype, CashTransaction, CashTransactionKind, InventoryCount, LedgerEvent, PurchaseInvoice,
    SaleInvoice, StockMovement,
};

use crate::fixtures::DateFixtures;

/// Builder for sale invoices
#[derive(Debug, Clone)]
pub struct SaleInvoiceBuilder {
    invoice: SaleInvoice,
}

impl Default for SaleInvoiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SaleInvoiceBuilder {
    pub fn new() -> Self {
        Self {
            invoice: SaleInvoice {
                invoice_id: InvoiceId::new(),
                number: "SI-2024-0001".to_string(),
                date: DateFixtures::invoice_date(),
                currency: Currency::TRY,
                subtotal: dec!(1000),
                tax_amount: dec!(200),
                total: dec!(1200),
                revenue_account: None,
            },
        }
    }

    pub fn with_invoice_id(mut self, id: InvoiceId) -> Self {
        self.invoice.invoice_id = id;
        self
    }

    pub fn with_number(mut self, number: impl Into<String>) -> Self {
        self.invoice.number = number.into();
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.invoice.date = date;
        self
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.invoice.currency = currency;
        self
    }

    /// Sets subtotal and tax; the total follows
    pub fn with_amounts(mut self, subtotal: Decimal, tax_amount: Decimal) -> Self {
        self.invoice.subtotal = subtotal;
        self.invoice.tax_amount = tax_amount;
        self.invoice.total = subtotal + tax_amount;
        self
    }

    pub fn with_revenue_account(mut self, code: impl Into<String>) -> Self {
        self.invoice.revenue_account = Some(code.into());
        self
    }

    pub fn build(self) -> SaleInvoice {
        self.invoice
    }

    pub fn posted(self) -> LedgerEvent {
        LedgerEvent::SaleInvoicePosted(self.invoice)
    }

    pub fn cancelled(self, on: NaiveDate) -> LedgerEvent {
        LedgerEvent::SaleInvoiceCancelled {
            invoice: self.invoice,
            cancelled_on: on,
        }
    }
}

/// Builder for purchase invoices
#[derive(Debug, Clone)]
pub struct PurchaseInvoiceBuilder {
    invoice: PurchaseInvoice,
}

impl Default for PurchaseInvoiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PurchaseInvoiceBuilder {
    pub fn new() -> Self {
        Self {
            invoice: PurchaseInvoice {
                invoice_id: InvoiceId::new(),
                number: "PI-2024-0001".to_string(),
                date: DateFixtures::invoice_date(),
                currency: Currency::TRY,
                subtotal: dec!(500),
                tax_amount: dec!(100),
                total: dec!(600),
                expense_account: None,
            },
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.invoice.date = date;
        self
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.invoice.currency = currency;
        self
    }

    pub fn with_amounts(mut self, subtotal: Decimal, tax_amount: Decimal) -> Self {
        self.invoice.subtotal = subtotal;
        self.invoice.tax_amount = tax_amount;
        self.invoice.total = subtotal + tax_amount;
        self
    }

    pub fn with_expense_account(mut self, code: impl Into<String>) -> Self {
        self.invoice.expense_account = Some(code.into());
        self
    }

    pub fn build(self) -> PurchaseInvoice {
        self.invoice
    }

    pub fn posted(self) -> LedgerEvent {
        LedgerEvent::PurchaseInvoicePosted(self.invoice)
    }

    pub fn cancelled(self, on: NaiveDate) -> LedgerEvent {
        LedgerEvent::PurchaseInvoiceCancelled {
            invoice: self.invoice,
            cancelled_on: on,
        }
    }
}

/// Builder for cash transactions
#[derive(Debug, Clone)]
pub struct CashTransactionBuilder {
    tx: CashTransaction,
}

impl Default for CashTransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CashTransactionBuilder {
    /// A TRY 250 receipt
    pub fn new() -> Self {
        Self {
            tx: CashTransaction {
                transaction_id: CashTransactionId::new(),
                date: DateFixtures::invoice_date(),
                currency: Currency::TRY,
                amount: dec!(250),
                kind: CashTransactionKind::Receipt,
                description: None,
                cash_account: None,
                counter_account: None,
            },
        }
    }

    pub fn receipt(self) -> Self {
        self.with_kind(CashTransactionKind::Receipt)
    }

    pub fn payment(self) -> Self {
        self.with_kind(CashTransactionKind::Payment)
    }

    pub fn other(self, subtype: CashSubtype) -> Self {
        self.with_kind(CashTransactionKind::Other(subtype))
    }

    pub fn with_kind(mut self, kind: CashTransactionKind) -> Self {
        self.tx.kind = kind;
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.tx.amount = amount;
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.tx.date = date;
        self
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.tx.currency = currency;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.tx.description = Some(description.into());
        self
    }

    pub fn with_cash_account(mut self, code: impl Into<String>) -> Self {
        self.tx.cash_account = Some(code.into());
        self
    }

    pub fn with_counter_account(mut self, code: impl Into<String>) -> Self {
        self.tx.counter_account = Some(code.into());
        self
    }

    pub fn build(self) -> CashTransaction {
        self.tx
    }

    pub fn event(self) -> LedgerEvent {
        LedgerEvent::CashTransaction(self.tx)
    }
}

/// Builder for stock movements and counts
#[derive(Debug, Clone)]
pub struct StockMovementBuilder {
    movement: StockMovement,
}

impl Default for StockMovementBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StockMovementBuilder {
    /// Ten units at TRY 12.50
    pub fn new() -> Self {
        Self {
            movement: StockMovement {
                movement_id: StockMovementId::new(),
                date: DateFixtures::invoice_date(),
                currency: Currency::TRY,
                sku: "SKU-001".to_string(),
                quantity: dec!(10),
                unit_cost: dec!(12.50),
                counter_account: None,
            },
        }
    }

    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.movement.quantity = quantity;
        self
    }

    pub fn with_unit_cost(mut self, unit_cost: Decimal) -> Self {
        self.movement.unit_cost = unit_cost;
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.movement.date = date;
        self
    }

    pub fn with_counter_account(mut self, code: impl Into<String>) -> Self {
        self.movement.counter_account = Some(code.into());
        self
    }

    pub fn build(self) -> StockMovement {
        self.movement
    }

    pub fn receipt(self) -> LedgerEvent {
        LedgerEvent::InventoryReceipt(self.movement)
    }

    pub fn issue(self) -> LedgerEvent {
        LedgerEvent::InventoryIssue(self.movement)
    }

    /// A count of the same SKU against the recorded quantity
    pub fn counted(self, counted_quantity: Decimal, recorded_quantity: Decimal) -> LedgerEvent {
        LedgerEvent::InventoryAdjustment(InventoryCount {
            movement_id: self.movement.movement_id,
            date: self.movement.date,
            currency: self.movement.currency,
            sku: self.movement.sku,
            counted_quantity,
            recorded_quantity,
            unit_cost: self.movement.unit_cost,
        })
    }
}
