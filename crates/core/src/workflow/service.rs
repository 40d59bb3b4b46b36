//! Entry status transitions.
//!
//! This module holds the state machine rules; the storage-backed driver applies
//! them to persisted entries and keeps the running balances in step.

use carnet_shared::types::EntryNumber;

use crate::ledger::error::EntryError;
use crate::ledger::types::EntryStatus;

/// Stateless service validating entry status transitions.
pub struct EntryTransitions;

impl EntryTransitions {
    /// Validate a rough entry.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the entry is ROUGH.
    pub fn validate(current: EntryStatus) -> Result<EntryStatus, EntryError> {
        match current {
            EntryStatus::Rough => Ok(EntryStatus::Validated),
            _ => Err(EntryError::InvalidTransition {
                from: current,
                to: EntryStatus::Validated,
            }),
        }
    }

    /// Soft-delete an editable entry.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the entry is ROUGH or FUTURE.
    pub fn delete(current: EntryStatus) -> Result<EntryStatus, EntryError> {
        if current.is_editable() {
            Ok(EntryStatus::Deleted)
        } else {
            Err(EntryError::InvalidTransition {
                from: current,
                to: EntryStatus::Deleted,
            })
        }
    }

    /// Fails unless the entry's fields may be edited.
    ///
    /// # Errors
    ///
    /// Returns `NotEditable` for PAST, VALIDATED and DELETED entries.
    pub fn ensure_editable(number: EntryNumber, current: EntryStatus) -> Result<(), EntryError> {
        if current.is_editable() {
            Ok(())
        } else {
            Err(EntryError::NotEditable {
                number,
                status: current,
            })
        }
    }

    /// Archive an entry when its period is closed.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` for FUTURE and DELETED entries.
    pub fn archive(current: EntryStatus) -> Result<EntryStatus, EntryError> {
        match current {
            EntryStatus::Rough | EntryStatus::Validated | EntryStatus::Past => Ok(EntryStatus::Past),
            _ => Err(EntryError::InvalidTransition {
                from: current,
                to: EntryStatus::Past,
            }),
        }
    }

    /// Returns true if `from → to` is reachable through any engine operation.
    ///
    /// - ROUGH: validate, delete, edit or remediation to PAST/FUTURE
    /// - FUTURE: delete, edit or migration back into the period
    /// - PAST: loosening back into the period
    /// - VALIDATED: archive on closing
    /// - DELETED: terminal
    #[must_use]
    pub fn is_valid_transition(from: EntryStatus, to: EntryStatus) -> bool {
        use EntryStatus::{Deleted, Future, Past, Rough, Validated};
        matches!(
            (from, to),
            (Rough, Validated | Deleted | Past | Future)
                | (Future, Rough | Validated | Deleted | Past)
                | (Past, Rough | Validated)
                | (Validated, Past)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_validate_only_from_rough() {
        assert_eq!(
            EntryTransitions::validate(EntryStatus::Rough),
            Ok(EntryStatus::Validated)
        );
        assert!(EntryTransitions::validate(EntryStatus::Future).is_err());
        assert!(EntryTransitions::validate(EntryStatus::Validated).is_err());
    }

    #[rstest]
    #[case::rough(EntryStatus::Rough, true)]
    #[case::future(EntryStatus::Future, true)]
    #[case::past(EntryStatus::Past, false)]
    #[case::validated(EntryStatus::Validated, false)]
    #[case::deleted(EntryStatus::Deleted, false)]
    fn test_delete_only_from_editable(#[case] current: EntryStatus, #[case] allowed: bool) {
        let result = EntryTransitions::delete(current);
        if allowed {
            assert_eq!(result, Ok(EntryStatus::Deleted));
        } else {
            assert_eq!(
                result,
                Err(EntryError::InvalidTransition {
                    from: current,
                    to: EntryStatus::Deleted,
                })
            );
        }
        assert_eq!(EntryTransitions::is_valid_transition(current, EntryStatus::Deleted), allowed);
    }

    #[test]
    fn test_past_entry_not_editable() {
        let err = EntryTransitions::ensure_editable(EntryNumber::new(4), EntryStatus::Past).unwrap_err();
        assert_eq!(err.error_code(), "ENTRY_NOT_EDITABLE");
    }

    #[test]
    fn test_archive() {
        assert_eq!(EntryTransitions::archive(EntryStatus::Validated), Ok(EntryStatus::Past));
        assert!(EntryTransitions::archive(EntryStatus::Future).is_err());
    }
}
