//! Property-based tests for entry validation rules.
//!
//! - Every accepted amount has exactly one non-zero side
//! - Every entry placed in the period respects its ledger's closing date

use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use rust_decimal::Decimal;
use carnet_shared::types::{DebitCredit, Side};

use super::types::EntryStatus;
use super::validation::{respects_ledger_closing, validate_amount};
use crate::fiscal::{PeriodBounds, initial_status};

/// Strategy to generate an amount from -1,000,000.00 to 1,000,000.00.
fn any_amount() -> impl Strategy<Value = Decimal> {
    (-100_000_000i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate a positive amount (> 0).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn day(offset: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default() + Days::new(offset)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Accepted amounts always have exactly one non-zero, positive side.
    #[test]
    fn prop_accepted_amount_is_exclusive(debit in any_amount(), credit in any_amount()) {
        let pair = DebitCredit::new(debit, credit);
        if let Ok(side) = validate_amount(&pair) {
            let (set, other) = match side {
                Side::Debit => (pair.debit, pair.credit),
                Side::Credit => (pair.credit, pair.debit),
            };
            prop_assert!(set > Decimal::ZERO);
            prop_assert!(other.is_zero());
        } else {
            prop_assert!(
                debit < Decimal::ZERO
                    || credit < Decimal::ZERO
                    || debit.is_zero() == credit.is_zero()
            );
        }
    }

    /// One-sided positive amounts are always accepted.
    #[test]
    fn prop_one_sided_amount_accepted(amount in positive_amount(), debit_side in any::<bool>()) {
        let side = if debit_side { Side::Debit } else { Side::Credit };
        prop_assert_eq!(validate_amount(&DebitCredit::on(side, amount)), Ok(side));
    }

    /// Created entries never violate their ledger's closing date.
    #[test]
    fn prop_created_entry_respects_closing(
        effect in 0u64..800,
        closing in prop::option::of(0u64..800),
        auto_correct in any::<bool>(),
    ) {
        let bounds = PeriodBounds::new(Some(day(0)), Some(day(365)));
        let closing = closing.map(day);
        if let Ok(placed) = initial_status(day(effect), &bounds, closing, auto_correct) {
            prop_assert!(respects_ledger_closing(placed.status, placed.effect_date, closing));
            if placed.status == EntryStatus::Rough {
                prop_assert!(bounds.contains(placed.effect_date));
            }
        } else {
            prop_assert!(!auto_correct);
        }
    }
}
