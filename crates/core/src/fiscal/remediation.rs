//! Status remediation when a period boundary is edited.
//!
//! The algorithm runs once for a `begin` change and once for an `end` change:
//! - unset → unset, or unchanged: nothing to do
//! - tightening (unset → set, or moved inward): ROUGH entries now outside move
//!   to PAST (`begin`) or FUTURE (`end`)
//! - loosening (set → unset, or moved outward): PAST (`begin`) or FUTURE (`end`)
//!   entries now inside come back, promoted to VALIDATED when on or before
//!   their ledger's closing date
//!
//! VALIDATED and DELETED entries are never moved. A tightening that would
//! leave a VALIDATED entry outside the period is refused instead.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::period::PeriodBounds;
use super::placement::placement_status;
use crate::ledger::types::EntryStatus;

/// Which period boundary changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Boundary {
    /// Period begin date.
    Begin,
    /// Period end date.
    End,
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Begin => write!(f, "begin"),
            Self::End => write!(f, "end"),
        }
    }
}

/// Direction of a boundary edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryMove {
    /// Same value before and after.
    Unchanged,
    /// The period got smaller on this side.
    Tightened,
    /// The period got larger on this side.
    Loosened,
}

/// One boundary edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryChange {
    /// The boundary being edited.
    pub boundary: Boundary,
    /// Value before the edit.
    pub previous: Option<NaiveDate>,
    /// Value after the edit.
    pub new: Option<NaiveDate>,
}

impl BoundaryChange {
    /// Creates a change of the `begin` boundary.
    #[must_use]
    pub const fn begin(previous: Option<NaiveDate>, new: Option<NaiveDate>) -> Self {
        Self {
            boundary: Boundary::Begin,
            previous,
            new,
        }
    }

    /// Creates a change of the `end` boundary.
    #[must_use]
    pub const fn end(previous: Option<NaiveDate>, new: Option<NaiveDate>) -> Self {
        Self {
            boundary: Boundary::End,
            previous,
            new,
        }
    }

    /// The change undoing this one.
    #[must_use]
    pub const fn inverse(&self) -> Self {
        Self {
            boundary: self.boundary,
            previous: self.new,
            new: self.previous,
        }
    }

    /// Classifies the edit.
    #[must_use]
    pub fn movement(&self) -> BoundaryMove {
        match (self.previous, self.new) {
            (None, None) => BoundaryMove::Unchanged,
            (None, Some(_)) => BoundaryMove::Tightened,
            (Some(_), None) => BoundaryMove::Loosened,
            (Some(previous), Some(new)) if previous == new => BoundaryMove::Unchanged,
            (Some(previous), Some(new)) => {
                let inward = match self.boundary {
                    Boundary::Begin => new > previous,
                    Boundary::End => new < previous,
                };
                if inward {
                    BoundaryMove::Tightened
                } else {
                    BoundaryMove::Loosened
                }
            }
        }
    }

    /// Applies the edit to `bounds`.
    #[must_use]
    pub fn apply(&self, bounds: PeriodBounds) -> PeriodBounds {
        match self.boundary {
            Boundary::Begin => PeriodBounds::new(self.new, bounds.end),
            Boundary::End => PeriodBounds::new(bounds.begin, self.new),
        }
    }

    /// Returns true when the edit would leave a VALIDATED entry outside
    /// `bounds_after`.
    #[must_use]
    pub fn strands(&self, status: EntryStatus, effect_date: NaiveDate, bounds_after: &PeriodBounds) -> bool {
        status == EntryStatus::Validated
            && self.movement() == BoundaryMove::Tightened
            && !bounds_after.contains(effect_date)
    }

    /// The status an entry must move to, or `None` when it is unaffected.
    ///
    /// `bounds_after` are the full period bounds once this edit is applied.
    #[must_use]
    pub fn remediate(
        &self,
        status: EntryStatus,
        effect_date: NaiveDate,
        bounds_after: &PeriodBounds,
        ledger_closing: Option<NaiveDate>,
    ) -> Option<EntryStatus> {
        match (self.movement(), self.boundary, status) {
            (BoundaryMove::Tightened, Boundary::Begin, EntryStatus::Rough) => bounds_after
                .begin
                .is_some_and(|begin| effect_date < begin)
                .then_some(EntryStatus::Past),
            (BoundaryMove::Tightened, Boundary::End, EntryStatus::Rough) => bounds_after
                .end
                .is_some_and(|end| effect_date > end)
                .then_some(EntryStatus::Future),
            (BoundaryMove::Loosened, Boundary::Begin, EntryStatus::Past)
            | (BoundaryMove::Loosened, Boundary::End, EntryStatus::Future) => {
                let placed = placement_status(effect_date, bounds_after, ledger_closing);
                (placed != status).then_some(placed)
            }
            _ => None,
        }
    }
}
