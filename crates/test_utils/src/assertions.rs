//! Custom Test Assertions
//!
//! Ledger-specific assertion helpers that print the offending entry or row
//! instead of a bare `left != right`.

use rust_decimal::Decimal;

use domain_ledger::{EntryWithLines, Side, TrialBalance};

/// Asserts that an entry's lines balance in base currency and match its totals
///
/// # Panics
///
/// Panics if debit and credit base sums differ or disagree with the header
pub fn assert_entry_balanced(entry: &EntryWithLines) {
    let (mut debit, mut credit) = (0i64, 0i64);
    for line in &entry.lines {
        match line.side() {
            Side::Debit => debit += line.amount_base,
            Side::Credit => credit += line.amount_base,
        }
    }

    assert_eq!(
        debit, credit,
        "Entry {} does not balance: debits={}, credits={}",
        entry.entry.number, debit, credit
    );
    assert_eq!(
        (entry.entry.total_debit, entry.entry.total_credit),
        (debit, credit),
        "Entry {} totals disagree with its lines",
        entry.entry.number
    );
}

/// Asserts that `reversal` swaps every line of `original`
///
/// # Panics
///
/// Panics if the line count, accounts, amounts or sides do not mirror
pub fn assert_mirror(original: &EntryWithLines, reversal: &EntryWithLines) {
    assert_eq!(
        original.lines.len(),
        reversal.lines.len(),
        "Reversal {} has a different number of lines than {}",
        reversal.entry.number,
        original.entry.number
    );

    for (o, r) in original.lines.iter().zip(&reversal.lines) {
        assert_eq!(o.account_id, r.account_id, "Line {} account differs", o.line_no);
        assert_eq!(o.amount_base, r.amount_base, "Line {} base amount differs", o.line_no);
        assert_eq!(o.debit, r.credit, "Line {} debit not mirrored", o.line_no);
        assert_eq!(o.credit, r.debit, "Line {} credit not mirrored", o.line_no);
        assert_eq!(o.currency, r.currency, "Line {} currency differs", o.line_no);
        assert_eq!(o.fx_rate, r.fx_rate, "Line {} rate differs", o.line_no);
    }
    assert_eq!(reversal.entry.reverses, Some(original.entry.id));
}

/// Asserts one trial balance row by account code
///
/// # Panics
///
/// Panics if the row is missing or either balance differs
pub fn assert_trial_balance_row(tb: &TrialBalance, code: &str, debit: Decimal, credit: Decimal) {
    let row = tb
        .row(code)
        .unwrap_or_else(|| panic!("Trial balance has no row for account {}: {:?}", code, tb.rows));

    assert_eq!(
        (row.debit_balance.amount(), row.credit_balance.amount()),
        (debit, credit),
        "Account {} balance mismatch",
        code
    );
}

/// Asserts that a trial balance is balanced and has no row for the given codes
pub fn assert_trial_balance_without(tb: &TrialBalance, codes: &[&str]) {
    assert!(tb.is_balanced, "Trial balance is not balanced: {:?}", tb);
    for code in codes {
        assert!(tb.row(code).is_none(), "Account {} should net to zero", code);
    }
}
