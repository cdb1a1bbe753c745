//! Unit tests for the Money module
//!
//! Tests cover creation, strict minor-unit conversion, rounding,
//! currency handling, and edge cases.

use core_kernel::{Money, Currency, MoneyError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

mod creation {
    use super::*;

    #[test]
    fn test_new_keeps_amount() {
        let m = Money::new(dec!(100.50), Currency::TRY);
        assert_eq!(m.amount(), dec!(100.50));
        assert_eq!(m.currency(), Currency::TRY);
    }

    #[test]
    fn test_from_minor_handles_jpy_no_decimals() {
        let m = Money::from_minor(10000, Currency::JPY);
        assert_eq!(m.amount(), dec!(10000));
    }

    #[test]
    fn test_zero_creates_zero_amount() {
        let m = Money::zero(Currency::EUR);
        assert!(m.is_zero());
        assert!(!m.is_positive());
        assert!(!m.is_negative());
    }

    #[test]
    fn test_negative_amount() {
        let m = Money::new(dec!(-100.00), Currency::USD);
        assert!(m.is_negative());
        assert_eq!(m.abs().amount(), dec!(100));
    }
}

mod minor_units {
    use super::*;

    #[test]
    fn test_trailing_zeros_do_not_matter() {
        let a = Money::new(dec!(1200.00), Currency::TRY);
        let b = Money::new(dec!(1200), Currency::TRY);
        assert_eq!(a.to_minor(), b.to_minor());
    }

    #[test]
    fn test_one_kurus_is_one_minor_unit() {
        assert_eq!(Money::new(dec!(0.01), Currency::TRY).to_minor(), Ok(1));
    }

    #[test]
    fn test_third_decimal_rejected() {
        let m = Money::new(dec!(0.001), Currency::TRY);
        assert!(matches!(m.to_minor(), Err(MoneyError::InvalidAmount(_))));
    }

    #[test]
    fn test_overflow_detected() {
        let m = Money::new(Decimal::MAX, Currency::TRY);
        assert_eq!(m.to_minor(), Err(MoneyError::Overflow));
    }
}

mod arithmetic {
    use super::*;

    #[test]
    fn test_checked_add_same_currency() {
        let a = Money::new(dec!(1000), Currency::TRY);
        let b = Money::new(dec!(200), Currency::TRY);
        assert_eq!(a.checked_add(&b).unwrap().amount(), dec!(1200));
    }

    #[test]
    fn test_checked_sub_mismatch() {
        let a = Money::new(dec!(1000), Currency::TRY);
        let b = Money::new(dec!(200), Currency::USD);
        assert!(matches!(a.checked_sub(&b), Err(MoneyError::CurrencyMismatch(_, _))));
    }

    #[test]
    fn test_checked_mul_by_quantity() {
        let unit_cost = Money::new(dec!(12.50), Currency::TRY);
        assert_eq!(unit_cost.checked_mul(dec!(8)).unwrap().amount(), dec!(100));
    }

    #[test]
    fn test_negation() {
        let m = Money::new(dec!(42), Currency::TRY);
        assert_eq!((-m).amount(), dec!(-42));
    }
}

mod currency {
    use super::*;

    #[test]
    fn test_every_currency_parses_its_own_code() {
        for currency in Currency::all() {
            assert_eq!(currency.code().parse::<Currency>(), Ok(*currency));
        }
    }

    #[test]
    fn test_serde_uses_iso_code() {
        let json = serde_json::to_string(&Currency::TRY).unwrap_or_default();
        assert_eq!(json, "\"TRY\"");
    }
}
