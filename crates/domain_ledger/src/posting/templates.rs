//! Posting templates
//!
//! One pure function per event type. Each produces lines in the document's
//! currency that balance by construction; the journal engine checks again.

use rust_decimal::Decimal;

use core_kernel::{Currency, Money};

use crate::error::LedgerError;
use crate::journal::Side;
use crate::posting::events::{
    CashTransaction, CashTransactionKind, InventoryCount, LedgerEvent, PurchaseInvoice, SaleInvoice,
    StockMovement,
};
use crate::posting::roles::{AccountRole, CashClassification, CashDirection};

/// Where a template line posts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountRef {
    Role(AccountRole),
    /// Explicit code supplied by the document
    Code(String),
}

impl AccountRef {
    fn or_override(role: AccountRole, code: &Option<String>) -> Self {
        match code {
            Some(code) => AccountRef::Code(code.clone()),
            None => AccountRef::Role(role),
        }
    }
}

/// One leg of a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateLine {
    pub account: AccountRef,
    pub side: Side,
    pub amount: Money,
}

/// Candidate entry produced by a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub description: String,
    pub lines: Vec<TemplateLine>,
}

impl Template {
    fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            lines: Vec::new(),
        }
    }

    fn line(mut self, account: AccountRef, side: Side, amount: Money) -> Self {
        self.lines.push(TemplateLine { account, side, amount });
        self
    }

    /// Adds the line unless the amount is zero
    fn optional_line(self, account: AccountRef, side: Side, amount: Money) -> Self {
        if amount.is_zero() {
            self
        } else {
            self.line(account, side, amount)
        }
    }

    /// The same lines with every side swapped
    pub fn mirror(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        for line in &mut self.lines {
            line.side = line.side.opposite();
        }
        self
    }

    /// Sum of the lines on one side
    pub fn total(&self, side: Side) -> Result<Decimal, LedgerError> {
        self.lines
            .iter()
            .filter(|l| l.side == side)
            .try_fold(Decimal::ZERO, |acc, l| {
                acc.checked_add(l.amount.amount())
                    .ok_or_else(|| LedgerError::validation("template total overflows"))
            })
    }
}

/// Sale invoice: debit receivable, credit revenue and output VAT
pub fn sale_invoice(invoice: &SaleInvoice) -> Template {
    let money = |amount| Money::new(amount, invoice.currency);
    Template::new(format!("Sale invoice {}", invoice.number))
        .line(AccountRef::Role(AccountRole::AccountsReceivable), Side::Debit, money(invoice.total))
        .line(
            AccountRef::or_override(AccountRole::SalesRevenue, &invoice.revenue_account),
            Side::Credit,
            money(invoice.subtotal),
        )
        .optional_line(AccountRef::Role(AccountRole::OutputVat), Side::Credit, money(invoice.tax_amount))
}

/// Purchase invoice: debit expense and input VAT, credit payable
pub fn purchase_invoice(invoice: &PurchaseInvoice) -> Template {
    let money = |amount| Money::new(amount, invoice.currency);
    Template::new(format!("Purchase invoice {}", invoice.number))
        .line(
            AccountRef::or_override(AccountRole::PurchaseExpense, &invoice.expense_account),
            Side::Debit,
            money(invoice.subtotal),
        )
        .optional_line(AccountRef::Role(AccountRole::InputVat), Side::Debit, money(invoice.tax_amount))
        .line(AccountRef::Role(AccountRole::AccountsPayable), Side::Credit, money(invoice.total))
}

/// Cash transaction: side chosen by kind, or by classification for other subtypes
pub fn cash_transaction(
    tx: &CashTransaction,
    classification: &CashClassification,
) -> Result<Template, LedgerError> {
    let (direction, counter_role, label) = match tx.kind {
        CashTransactionKind::Receipt => (CashDirection::Inflow, AccountRole::SalesRevenue, "Cash receipt".to_string()),
        CashTransactionKind::Payment => (CashDirection::Outflow, AccountRole::PurchaseExpense, "Cash payment".to_string()),
        CashTransactionKind::Other(subtype) => {
            let direction = classification.direction(subtype)?;
            let role = match direction {
                CashDirection::Inflow => AccountRole::OtherIncome,
                CashDirection::Outflow => AccountRole::OtherExpense,
            };
            (direction, role, format!("Cash transaction ({:?})", subtype))
        }
    };

    let cash = AccountRef::or_override(AccountRole::Cash, &tx.cash_account);
    let counter = AccountRef::or_override(counter_role, &tx.counter_account);
    let amount = Money::new(tx.amount, tx.currency);
    let description = tx.description.clone().unwrap_or(label);

    let template = match direction {
        CashDirection::Inflow => Template::new(description)
            .line(cash, Side::Debit, amount)
            .line(counter, Side::Credit, amount),
        CashDirection::Outflow => Template::new(description)
            .line(counter, Side::Debit, amount)
            .line(cash, Side::Credit, amount),
    };
    Ok(template)
}

/// Goods received: debit inventory, credit payable
pub fn inventory_receipt(movement: &StockMovement) -> Result<Template, LedgerError> {
    let value = movement_value(movement.quantity, movement.unit_cost, movement.currency)?;
    Ok(Template::new(format!("Inventory receipt {}", movement.sku))
        .line(AccountRef::Role(AccountRole::Inventory), Side::Debit, value)
        .line(
            AccountRef::or_override(AccountRole::AccountsPayable, &movement.counter_account),
            Side::Credit,
            value,
        ))
}

/// Goods issued: debit cost of goods sold, credit inventory
pub fn inventory_issue(movement: &StockMovement) -> Result<Template, LedgerError> {
    let value = movement_value(movement.quantity, movement.unit_cost, movement.currency)?;
    Ok(Template::new(format!("Inventory issue {}", movement.sku))
        .line(
            AccountRef::or_override(AccountRole::CostOfGoodsSold, &movement.counter_account),
            Side::Debit,
            value,
        )
        .line(AccountRef::Role(AccountRole::Inventory), Side::Credit, value))
}

/// Stock count: a surplus debits inventory against a gain, a shortage credits it against a loss
///
/// Returns `None` when counted and recorded quantities agree.
pub fn inventory_adjustment(count: &InventoryCount) -> Result<Option<Template>, LedgerError> {
    let difference = count
        .counted_quantity
        .checked_sub(count.recorded_quantity)
        .ok_or_else(|| LedgerError::validation("quantity difference overflows"))?;
    if difference.is_zero() {
        return Ok(None);
    }

    let value = movement_value(difference.abs(), count.unit_cost, count.currency)?;
    let description = format!("Inventory count {}", count.sku);
    let inventory = AccountRef::Role(AccountRole::Inventory);

    let template = if difference > Decimal::ZERO {
        Template::new(description)
            .line(inventory, Side::Debit, value)
            .line(AccountRef::Role(AccountRole::InventoryGain), Side::Credit, value)
    } else {
        Template::new(description)
            .line(AccountRef::Role(AccountRole::InventoryLoss), Side::Debit, value)
            .line(inventory, Side::Credit, value)
    };
    Ok(Some(template))
}

/// Template for any event; `None` if the event books nothing
pub fn for_event(
    event: &LedgerEvent,
    classification: &CashClassification,
) -> Result<Option<Template>, LedgerError> {
    let template = match event {
        LedgerEvent::SaleInvoicePosted(invoice) => sale_invoice(invoice),
        LedgerEvent::SaleInvoiceCancelled { invoice, .. } => {
            sale_invoice(invoice).mirror(format!("Cancellation of sale invoice {}", invoice.number))
        }
        LedgerEvent::PurchaseInvoicePosted(invoice) => purchase_invoice(invoice),
        LedgerEvent::PurchaseInvoiceCancelled { invoice, .. } => purchase_invoice(invoice)
            .mirror(format!("Cancellation of purchase invoice {}", invoice.number)),
        LedgerEvent::CashTransaction(tx) => cash_transaction(tx, classification)?,
        LedgerEvent::InventoryReceipt(movement) => inventory_receipt(movement)?,
        LedgerEvent::InventoryIssue(movement) => inventory_issue(movement)?,
        LedgerEvent::InventoryAdjustment(count) => return inventory_adjustment(count),
    };
    Ok(Some(template))
}

fn movement_value(quantity: Decimal, unit_cost: Decimal, currency: Currency) -> Result<Money, LedgerError> {
    if quantity <= Decimal::ZERO {
        return Err(LedgerError::validation(format!("quantity must be positive, got {}", quantity)));
    }
    if unit_cost <= Decimal::ZERO {
        return Err(LedgerError::validation(format!("unit cost must be positive, got {}", unit_cost)));
    }
    let value = Money::new(unit_cost, currency).checked_mul(quantity)?.round_to_currency();
    if !value.is_positive() {
        return Err(LedgerError::validation(format!(
            "movement of {} at {} rounds to zero",
            quantity, unit_cost
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_kernel::{CashTransactionId, InvoiceId, StockMovementId};
    use rust_decimal_macros::dec;

    use crate::posting::roles::CashSubtype;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    fn invoice(tax: Decimal) -> SaleInvoice {
        SaleInvoice {
            invoice_id: InvoiceId::new(),
            number: "SI-1".to_string(),
            date: date(),
            currency: Currency::TRY,
            subtotal: dec!(1000),
            tax_amount: tax,
            total: dec!(1000) + tax,
            revenue_account: None,
        }
    }

    fn legs(template: &Template) -> Vec<(AccountRef, Side, Decimal)> {
        template
            .lines
            .iter()
            .map(|l| (l.account.clone(), l.side, l.amount.amount()))
            .collect()
    }

    #[test]
    fn test_sale_invoice_legs() {
        let template = sale_invoice(&invoice(dec!(200)));
        assert_eq!(
            legs(&template),
            vec![
                (AccountRef::Role(AccountRole::AccountsReceivable), Side::Debit, dec!(1200)),
                (AccountRef::Role(AccountRole::SalesRevenue), Side::Credit, dec!(1000)),
                (AccountRef::Role(AccountRole::OutputVat), Side::Credit, dec!(200)),
            ]
        );
    }

    #[test]
    fn test_zero_tax_leg_omitted() {
        let template = sale_invoice(&invoice(dec!(0)));
        assert_eq!(template.lines.len(), 2);
        assert_eq!(template.total(Side::Debit).unwrap(), template.total(Side::Credit).unwrap());
    }

    #[test]
    fn test_mirror_swaps_every_side() {
        let original = sale_invoice(&invoice(dec!(200)));
        let mirror = original.clone().mirror("Cancel");
        for (o, m) in original.lines.iter().zip(&mirror.lines) {
            assert_eq!(o.account, m.account);
            assert_eq!(o.amount, m.amount);
            assert_eq!(o.side.opposite(), m.side);
        }
    }

    #[test]
    fn test_purchase_invoice_override() {
        let template = purchase_invoice(&PurchaseInvoice {
            invoice_id: InvoiceId::new(),
            number: "PI-7".to_string(),
            date: date(),
            currency: Currency::TRY,
            subtotal: dec!(500),
            tax_amount: dec!(100),
            total: dec!(600),
            expense_account: Some("653".to_string()),
        });
        assert_eq!(template.lines[0].account, AccountRef::Code("653".to_string()));
        assert_eq!(template.lines[2].side, Side::Credit);
        assert_eq!(template.total(Side::Debit).unwrap(), dec!(600));
    }

    fn cash(kind: CashTransactionKind) -> CashTransaction {
        CashTransaction {
            transaction_id: CashTransactionId::new(),
            date: date(),
            currency: Currency::TRY,
            amount: dec!(42),
            kind,
            description: None,
            cash_account: Some("102".to_string()),
            counter_account: None,
        }
    }

    #[test]
    fn test_cash_sides_follow_classification() {
        let classification = CashClassification::standard();

        let commission = cash_transaction(&cash(CashTransactionKind::Other(CashSubtype::Commission)), &classification)
            .unwrap();
        assert_eq!(commission.lines[0], TemplateLine {
            account: AccountRef::Role(AccountRole::OtherExpense),
            side: Side::Debit,
            amount: Money::new(dec!(42), Currency::TRY),
        });
        assert_eq!(commission.lines[1].account, AccountRef::Code("102".to_string()));
        assert_eq!(commission.lines[1].side, Side::Credit);

        let dividend = cash_transaction(&cash(CashTransactionKind::Other(CashSubtype::Dividend)), &classification)
            .unwrap();
        assert_eq!(dividend.lines[0].side, Side::Debit);
        assert_eq!(dividend.lines[0].account, AccountRef::Code("102".to_string()));
        assert_eq!(dividend.lines[1].account, AccountRef::Role(AccountRole::OtherIncome));
    }

    #[test]
    fn test_receipt_and_payment() {
        let classification = CashClassification::standard();
        let receipt = cash_transaction(&cash(CashTransactionKind::Receipt), &classification).unwrap();
        assert_eq!(receipt.lines[1].account, AccountRef::Role(AccountRole::SalesRevenue));
        assert_eq!(receipt.lines[1].side, Side::Credit);

        let payment = cash_transaction(&cash(CashTransactionKind::Payment), &classification).unwrap();
        assert_eq!(payment.lines[0].account, AccountRef::Role(AccountRole::PurchaseExpense));
        assert_eq!(payment.lines[0].side, Side::Debit);
    }

    fn movement(quantity: Decimal) -> StockMovement {
        StockMovement {
            movement_id: StockMovementId::new(),
            date: date(),
            currency: Currency::TRY,
            sku: "SKU-1".to_string(),
            quantity,
            unit_cost: dec!(12.345),
            counter_account: None,
        }
    }

    #[test]
    fn test_inventory_value_rounds_to_minor_unit() {
        let receipt = inventory_receipt(&movement(dec!(3))).unwrap();
        // 3 * 12.345 = 37.035
        assert_eq!(receipt.lines[0].amount.amount(), dec!(37.04));
        assert!(inventory_issue(&movement(dec!(0))).is_err());
    }

    #[test]
    fn test_zero_cost_movement_rejected_up_front() {
        let free = StockMovement {
            unit_cost: dec!(0),
            ..movement(dec!(3))
        };
        match inventory_receipt(&free) {
            Err(LedgerError::Validation(msg)) => assert!(msg.contains("unit cost must be positive")),
            other => panic!("expected validation error, got {:?}", other),
        }

        let dust = StockMovement {
            unit_cost: dec!(0.001),
            ..movement(dec!(1))
        };
        assert!(matches!(inventory_issue(&dust), Err(LedgerError::Validation(_))));
    }

    #[test]
    fn test_adjustment_direction() {
        let count = |counted| InventoryCount {
            movement_id: StockMovementId::new(),
            date: date(),
            currency: Currency::TRY,
            sku: "SKU-1".to_string(),
            counted_quantity: counted,
            recorded_quantity: dec!(10),
            unit_cost: dec!(5),
        };

        let surplus = inventory_adjustment(&count(dec!(12))).unwrap().unwrap();
        assert_eq!(surplus.lines[0].account, AccountRef::Role(AccountRole::Inventory));
        assert_eq!(surplus.lines[0].side, Side::Debit);
        assert_eq!(surplus.lines[0].amount.amount(), dec!(10));

        let shortage = inventory_adjustment(&count(dec!(7))).unwrap().unwrap();
        assert_eq!(shortage.lines[0].account, AccountRef::Role(AccountRole::InventoryLoss));
        assert_eq!(shortage.lines[1].side, Side::Credit);
        assert_eq!(shortage.lines[1].amount.amount(), dec!(15));

        assert!(inventory_adjustment(&count(dec!(10))).unwrap().is_none());
    }
}
