//! Property-based tests for `EntryTransitions`.

use proptest::prelude::*;
use carnet_shared::types::EntryNumber;

use crate::ledger::types::EntryStatus;
use crate::workflow::service::EntryTransitions;

/// Strategy for generating random `EntryStatus` values.
fn arb_status() -> impl Strategy<Value = EntryStatus> {
    prop_oneof![
        Just(EntryStatus::Rough),
        Just(EntryStatus::Future),
        Just(EntryStatus::Past),
        Just(EntryStatus::Validated),
        Just(EntryStatus::Deleted),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Every transition the service performs is in the transition table.
    #[test]
    fn prop_operations_follow_table(status in arb_status()) {
        for op in [
            EntryTransitions::validate,
            EntryTransitions::delete,
            EntryTransitions::archive,
        ] {
            if let Ok(next) = op(status) {
                prop_assert!(
                    next == status || EntryTransitions::is_valid_transition(status, next),
                    "{} -> {} not in table", status, next
                );
            }
        }
    }

    /// Deleted entries never leave the deleted state.
    #[test]
    fn prop_deleted_is_terminal(target in arb_status()) {
        prop_assert!(!EntryTransitions::is_valid_transition(EntryStatus::Deleted, target));
    }

    /// Editability matches the transition rules for deletion.
    #[test]
    fn prop_editable_iff_deletable(status in arb_status(), number in 1i64..10_000) {
        prop_assert_eq!(
            EntryTransitions::ensure_editable(EntryNumber::new(number), status).is_ok(),
            EntryTransitions::delete(status).is_ok()
        );
    }
}
