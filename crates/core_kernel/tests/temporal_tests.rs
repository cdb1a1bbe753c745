//! Tests for accounting periods and date ranges

use chrono::NaiveDate;
use core_kernel::temporal::{AccountingPeriod, DateRange, TemporalError};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

mod accounting_period {
    use super::*;

    #[test]
    fn test_parse_round_trips_display() {
        let period: AccountingPeriod = "2024-07".parse().unwrap();
        assert_eq!(period.year(), 2024);
        assert_eq!(period.month(), 7);
        assert_eq!(period.to_string(), "2024-07");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            "July 2024".parse::<AccountingPeriod>(),
            Err(TemporalError::InvalidPeriod(_))
        ));
        assert!("2024-00".parse::<AccountingPeriod>().is_err());
    }

    #[test]
    fn test_contains_only_its_month() {
        let period = AccountingPeriod::new(2024, 1).unwrap();
        assert!(period.contains(date(2024, 1, 15)));
        assert!(!period.contains(date(2023, 1, 15)));
        assert!(!period.contains(date(2024, 2, 1)));
    }

    #[test]
    fn test_serializes_as_string() {
        let period = AccountingPeriod::new(2024, 3).unwrap();
        let json = serde_json::to_string(&period).unwrap();
        assert_eq!(json, "\"2024-03\"");
        let back: AccountingPeriod = serde_json::from_str(&json).unwrap();
        assert_eq!(back, period);
    }

    #[test]
    fn test_ordering_follows_calendar() {
        let dec = AccountingPeriod::new(2023, 12).unwrap();
        let jan = AccountingPeriod::new(2024, 1).unwrap();
        assert!(dec < jan);
    }
}

mod date_range {
    use super::*;

    #[test]
    fn test_single_day_range_is_valid() {
        let day = date(2024, 5, 5);
        let range = DateRange::new(day, day).unwrap();
        assert!(range.contains(day));
    }

    #[test]
    fn test_all_time_contains_everything() {
        let range = DateRange::all_time();
        assert!(range.contains(date(1900, 1, 1)));
        assert!(range.contains(date(2999, 12, 31)));
    }
}
