//! Status computation from effect dates.
//!
//! An entry's status is a function of its effect date, the period bounds and its
//! ledger's closing date:
//! - before `begin` → PAST
//! - after `end` → FUTURE
//! - inside, on or before the ledger closing date → VALIDATED
//! - inside, after the ledger closing date → ROUGH

use chrono::NaiveDate;

use super::period::{PeriodBounds, Placement, minimal_effect_date};
use crate::ledger::error::EntryError;
use crate::ledger::types::EntryStatus;

/// Status and effect date chosen for a new entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placed {
    /// Initial status.
    pub status: EntryStatus,
    /// Effect date, possibly clamped to the ledger minimum.
    pub effect_date: NaiveDate,
}

/// Computes the status an entry dated `effect_date` takes at creation.
///
/// # Errors
///
/// Returns `EntryError::InvalidEffectDate` when the date is inside the period
/// but before the ledger's minimal allowed date and `auto_correct` is off.
pub fn initial_status(
    effect_date: NaiveDate,
    bounds: &PeriodBounds,
    ledger_closing: Option<NaiveDate>,
    auto_correct: bool,
) -> Result<Placed, EntryError> {
    match bounds.place(effect_date) {
        Placement::Before => Ok(Placed {
            status: EntryStatus::Past,
            effect_date,
        }),
        Placement::After => Ok(Placed {
            status: EntryStatus::Future,
            effect_date,
        }),
        Placement::Inside => match minimal_effect_date(bounds, ledger_closing) {
            Some(minimum) if effect_date < minimum => {
                if !auto_correct {
                    return Err(EntryError::InvalidEffectDate {
                        date: effect_date,
                        minimum,
                    });
                }
                // The clamped date may itself fall after `end`.
                initial_status(minimum, bounds, ledger_closing, false)
            }
            _ => Ok(Placed {
                status: EntryStatus::Rough,
                effect_date,
            }),
        },
    }
}

/// Status an existing entry dated `effect_date` takes under the given bounds.
///
/// Unlike [`initial_status`] this never fails: an in-period date on or before
/// the ledger closing date is promoted to VALIDATED.
#[must_use]
pub fn placement_status(
    effect_date: NaiveDate,
    bounds: &PeriodBounds,
    ledger_closing: Option<NaiveDate>,
) -> EntryStatus {
    match bounds.place(effect_date) {
        Placement::Before => EntryStatus::Past,
        Placement::After => EntryStatus::Future,
        Placement::Inside => {
            if ledger_closing.is_some_and(|closing| effect_date <= closing) {
                EntryStatus::Validated
            } else {
                EntryStatus::Rough
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn year_2024() -> PeriodBounds {
        PeriodBounds::new(Some(d(2024, 1, 1)), Some(d(2024, 12, 31)))
    }

    #[rstest]
    #[case(d(2023, 12, 15), EntryStatus::Past)]
    #[case(d(2024, 1, 1), EntryStatus::Rough)]
    #[case(d(2024, 12, 31), EntryStatus::Rough)]
    #[case(d(2025, 1, 2), EntryStatus::Future)]
    fn test_initial_status_without_closing(#[case] date: NaiveDate, #[case] expected: EntryStatus) {
        let placed = initial_status(date, &year_2024(), None, false).unwrap();
        assert_eq!(placed.status, expected);
        assert_eq!(placed.effect_date, date);
    }

    #[test]
    fn test_before_ledger_minimum_rejected() {
        let result = initial_status(d(2024, 3, 20), &year_2024(), Some(d(2024, 3, 31)), false);
        assert_eq!(
            result,
            Err(EntryError::InvalidEffectDate {
                date: d(2024, 3, 20),
                minimum: d(2024, 4, 1),
            })
        );
    }

    #[test]
    fn test_before_ledger_minimum_clamped() {
        let placed = initial_status(d(2024, 3, 20), &year_2024(), Some(d(2024, 3, 31)), true).unwrap();
        assert_eq!(placed.status, EntryStatus::Rough);
        assert_eq!(placed.effect_date, d(2024, 4, 1));
    }

    #[test]
    fn test_clamp_past_period_end_is_future() {
        let placed = initial_status(d(2024, 6, 1), &year_2024(), Some(d(2024, 12, 31)), true).unwrap();
        assert_eq!(placed.status, EntryStatus::Future);
        assert_eq!(placed.effect_date, d(2025, 1, 1));
    }

    #[test]
    fn test_on_closing_date_is_not_allowed() {
        assert!(initial_status(d(2024, 3, 31), &year_2024(), Some(d(2024, 3, 31)), false).is_err());
        assert!(initial_status(d(2024, 4, 1), &year_2024(), Some(d(2024, 3, 31)), false).is_ok());
    }

    #[test]
    fn test_placement_promotes_closed_dates() {
        let closing = Some(d(2024, 3, 31));
        assert_eq!(placement_status(d(2024, 3, 31), &year_2024(), closing), EntryStatus::Validated);
        assert_eq!(placement_status(d(2024, 4, 1), &year_2024(), closing), EntryStatus::Rough);
        assert_eq!(placement_status(d(2023, 3, 1), &year_2024(), closing), EntryStatus::Past);
    }
}
