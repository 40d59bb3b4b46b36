//! Property-based tests for boundary remediation.
//!
//! Tightening a boundary and then applying the exact inverse edit must restore
//! every entry status.

use chrono::{Days, NaiveDate};
use proptest::prelude::*;

use super::period::PeriodBounds;
use super::placement::placement_status;
use super::remediation::BoundaryChange;
use crate::ledger::types::EntryStatus;

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default()
}

fn day(offset: u64) -> NaiveDate {
    base_date() + Days::new(offset)
}

/// Applies one boundary change to every entry, in place.
fn apply_change(
    change: &BoundaryChange,
    bounds: PeriodBounds,
    entries: &mut [(NaiveDate, EntryStatus)],
    closing: Option<NaiveDate>,
) -> PeriodBounds {
    let after = change.apply(bounds);
    for (date, status) in entries.iter_mut() {
        if let Some(next) = change.remediate(*status, *date, &after, closing) {
            *status = next;
        }
    }
    after
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Tightening `end` then restoring it leaves every status unchanged.
    #[test]
    fn prop_end_tighten_then_loosen_restores(
        end_offset in 30u64..365,
        shrink in 1u64..30,
        closing_offset in prop::option::of(0u64..60),
        dates in prop::collection::vec(0u64..500, 1..40),
        deleted_mask in prop::collection::vec(any::<bool>(), 40),
    ) {
        let bounds = PeriodBounds::new(Some(day(0)), Some(day(end_offset)));
        let closing = closing_offset.map(day);
        let original: Vec<(NaiveDate, EntryStatus)> = dates
            .iter()
            .zip(deleted_mask.iter())
            .map(|(offset, deleted)| {
                let date = day(*offset);
                let status = if *deleted {
                    EntryStatus::Deleted
                } else {
                    placement_status(date, &bounds, closing)
                };
                (date, status)
            })
            .collect();

        let tighten = BoundaryChange::end(bounds.end, Some(day(end_offset - shrink)));
        let mut entries = original.clone();
        let tightened = apply_change(&tighten, bounds, &mut entries, closing);
        let restored = apply_change(&tighten.inverse(), tightened, &mut entries, closing);

        prop_assert_eq!(restored, bounds);
        prop_assert_eq!(entries, original);
    }

    /// Setting `begin` where none was set, then unsetting it, leaves every status unchanged.
    #[test]
    fn prop_begin_set_then_unset_restores(
        begin_offset in 1u64..200,
        closing_offset in prop::option::of(0u64..300),
        dates in prop::collection::vec(0u64..400, 1..40),
    ) {
        let bounds = PeriodBounds::new(None, Some(day(365)));
        let closing = closing_offset.map(day);
        let original: Vec<(NaiveDate, EntryStatus)> = dates
            .iter()
            .map(|offset| {
                let date = day(*offset);
                (date, placement_status(date, &bounds, closing))
            })
            .collect();

        let tighten = BoundaryChange::begin(None, Some(day(begin_offset)));
        let mut entries = original.clone();
        let tightened = apply_change(&tighten, bounds, &mut entries, closing);

        for (date, status) in &entries {
            if *status == EntryStatus::Past {
                prop_assert!(*date < day(begin_offset));
            }
        }

        apply_change(&tighten.inverse(), tightened, &mut entries, closing);
        prop_assert_eq!(entries, original);
    }

    /// Validated entries are never moved by a boundary edit.
    #[test]
    fn prop_validated_never_moves(
        date_offset in 0u64..400,
        old_end in prop::option::of(0u64..400),
        new_end in prop::option::of(0u64..400),
    ) {
        let change = BoundaryChange::end(old_end.map(day), new_end.map(day));
        let after = change.apply(PeriodBounds::new(Some(day(0)), old_end.map(day)));
        prop_assert_eq!(
            change.remediate(EntryStatus::Validated, day(date_offset), &after, None),
            None
        );
    }
}
