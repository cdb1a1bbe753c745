//! Property-Based Test Generators
//!
//! Proptest strategies for ledger amounts and line sets.

use proptest::prelude::*;
use rust_decimal::Decimal;

use core_kernel::Currency;

/// Debit and credit amounts in minor units that sum to the same total
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalancedAmounts {
    pub debits: Vec<i64>,
    pub credits: Vec<i64>,
}

impl BalancedAmounts {
    pub fn total(&self) -> i64 {
        self.debits.iter().sum()
    }
}

/// Strategy for positive line amounts in minor units
pub fn positive_amount_minor_strategy() -> impl Strategy<Value = i64> {
    1i64..1_000_000_000i64
}

/// Strategy for one to five debits and a split of their total into credits
pub fn balanced_amounts_strategy() -> impl Strategy<Value = BalancedAmounts> {
    (
        proptest::collection::vec(positive_amount_minor_strategy(), 1..=5),
        proptest::collection::vec(1i64..100i64, 1..=4),
    )
        .prop_map(|(debits, weights)| {
            let total: i64 = debits.iter().sum();
            BalancedAmounts {
                credits: split(total, &weights),
                debits,
            }
        })
}

/// Strategy for amounts whose debit and credit totals differ
pub fn unbalanced_amounts_strategy() -> impl Strategy<Value = BalancedAmounts> {
    (balanced_amounts_strategy(), 1i64..10_000i64).prop_map(|(mut amounts, drift)| {
        if let Some(last) = amounts.credits.last_mut() {
            *last += drift;
        }
        amounts
    })
}

/// Strategy for foreign currencies against a TRY base
pub fn foreign_currency_strategy() -> impl Strategy<Value = Currency> {
    prop_oneof![
        Just(Currency::USD),
        Just(Currency::EUR),
        Just(Currency::GBP),
        Just(Currency::CHF),
    ]
}

/// Strategy for exchange rates between 0.0001 and 100 with four decimals
pub fn fx_rate_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=1_000_000i64).prop_map(|n| Decimal::new(n, 4))
}

/// Splits `total` by weight, the last part taking the remainder
///
/// Falls back to a single part when a share would round to zero.
fn split(total: i64, weights: &[i64]) -> Vec<i64> {
    let weight_sum: i64 = weights.iter().sum();
    let mut parts: Vec<i64> = weights[..weights.len() - 1]
        .iter()
        .map(|w| (i128::from(total) * i128::from(*w) / i128::from(weight_sum)) as i64)
        .collect();
    let assigned: i64 = parts.iter().sum();
    parts.push(total - assigned);

    if parts.iter().any(|p| *p <= 0) {
        return vec![total];
    }
    parts
}
