//! Phases of the period-closing workflow.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One phase of the closing workflow, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosingPhase {
    /// Balance gate; read-only.
    Gate,
    /// Validate remaining ROUGH entries.
    ValidateRough,
    /// Synthesize closing and carried-forward entries.
    SoldeAccounts,
    /// Advance every ledger's closing date to the period end.
    CloseLedgers,
    /// Archive the period and activate the next one.
    ArchivePeriod,
    /// Drop settled and reconciled entries, reset running balances.
    Cleanup,
    /// Insert the carried-forward entries in the new period.
    InsertForwards,
    /// Seed opening balances from the closing balances.
    SeedOpening,
    /// Bring FUTURE entries now inside the new period back.
    MigrateFuture,
}

impl ClosingPhase {
    /// All phases, in execution order.
    pub const ALL: [Self; 9] = [
        Self::Gate,
        Self::ValidateRough,
        Self::SoldeAccounts,
        Self::CloseLedgers,
        Self::ArchivePeriod,
        Self::Cleanup,
        Self::InsertForwards,
        Self::SeedOpening,
        Self::MigrateFuture,
    ];

    /// The phase past which the workflow can no longer be abandoned.
    pub const PIVOT: Self = Self::ArchivePeriod;

    /// One-based position of the phase.
    #[must_use]
    pub const fn number(self) -> usize {
        self as usize + 1
    }

    /// The phase following this one.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        Self::ALL.get(self.number()).copied()
    }

    /// Returns true if the phase runs before the pivot.
    #[must_use]
    pub fn is_before_pivot(self) -> bool {
        self < Self::PIVOT
    }

    /// Human-readable label for progress display.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Gate => "Checking balances",
            Self::ValidateRough => "Validating rough entries",
            Self::SoldeAccounts => "Balancing accounts",
            Self::CloseLedgers => "Closing ledgers",
            Self::ArchivePeriod => "Archiving period",
            Self::Cleanup => "Cleaning up entries",
            Self::InsertForwards => "Inserting carried-forward entries",
            Self::SeedOpening => "Seeding opening balances",
            Self::MigrateFuture => "Migrating future entries",
        }
    }
}

impl fmt::Display for ClosingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "phase {} ({})", self.number(), self.label())
    }
}

/// Per-phase completion flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseFlags([bool; 9]);

impl PhaseFlags {
    /// Marks `phase` done.
    pub fn mark(&mut self, phase: ClosingPhase) {
        self.0[phase as usize] = true;
    }

    /// Returns true if `phase` is done.
    #[must_use]
    pub fn is_done(&self, phase: ClosingPhase) -> bool {
        self.0[phase as usize]
    }

    /// The first phase not yet done.
    #[must_use]
    pub fn next_pending(&self) -> Option<ClosingPhase> {
        ClosingPhase::ALL.into_iter().find(|phase| !self.is_done(*phase))
    }

    /// Returns true if every phase is done.
    #[must_use]
    pub fn all_done(&self) -> bool {
        self.next_pending().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order() {
        assert_eq!(ClosingPhase::Gate.number(), 1);
        assert_eq!(ClosingPhase::MigrateFuture.number(), 9);
        assert_eq!(ClosingPhase::Gate.next(), Some(ClosingPhase::ValidateRough));
        assert_eq!(ClosingPhase::MigrateFuture.next(), None);
        assert!(ClosingPhase::CloseLedgers.is_before_pivot());
        assert!(!ClosingPhase::ArchivePeriod.is_before_pivot());
    }

    #[test]
    fn test_flags_track_progress() {
        let mut flags = PhaseFlags::default();
        assert_eq!(flags.next_pending(), Some(ClosingPhase::Gate));
        flags.mark(ClosingPhase::Gate);
        flags.mark(ClosingPhase::ValidateRough);
        assert_eq!(flags.next_pending(), Some(ClosingPhase::SoldeAccounts));
        for phase in ClosingPhase::ALL {
            flags.mark(phase);
        }
        assert!(flags.all_done());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ClosingPhase::ArchivePeriod.to_string(),
            "phase 5 (Archiving period)"
        );
    }
}
