//! Reconciliation and settlement errors.

use thiserror::Error;
use carnet_shared::AppError;
use carnet_shared::types::{ConcilementId, EntryNumber, SettlementNumber};

use super::types::MemberRef;

/// Errors raised by the reconciliation and settlement tracker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerError {
    /// The member already belongs to another group.
    #[error("{member} is already reconciled in group {group}")]
    AlreadyReconciled {
        /// The member reference.
        member: MemberRef,
        /// The group holding it.
        group: ConcilementId,
    },

    /// The entry already carries another settlement number.
    #[error("Entry {entry} is already settled under number {existing}")]
    DuplicateSettlement {
        /// The entry.
        entry: EntryNumber,
        /// Its current settlement number.
        existing: SettlementNumber,
    },

    /// The entry is deleted.
    #[error("Entry {0} is deleted")]
    DeletedEntry(EntryNumber),

    /// The entry's account does not allow settlement.
    #[error("Account {account} of entry {entry} is not settleable")]
    NotSettleable {
        /// The entry.
        entry: EntryNumber,
        /// Its account.
        account: String,
    },

    /// The entry's account does not allow reconciliation.
    #[error("Account {account} of entry {entry} is not reconciliable")]
    NotReconciliable {
        /// The entry.
        entry: EntryNumber,
        /// Its account.
        account: String,
    },

    /// Entry not found.
    #[error("Entry {0} not found")]
    EntryNotFound(EntryNumber),

    /// Concilement group not found.
    #[error("Concilement group {0} not found")]
    GroupNotFound(ConcilementId),

    /// Member is not reconciled.
    #[error("{0} is not reconciled")]
    NotReconciled(MemberRef),

    /// Settlement requires at least one entry.
    #[error("Settlement requires at least one entry")]
    EmptySettlement,
}

impl TrackerError {
    /// Returns the stable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::AlreadyReconciled { .. } => "ALREADY_RECONCILED",
            Self::DuplicateSettlement { .. } => "DUPLICATE_SETTLEMENT",
            Self::DeletedEntry(_) => "ENTRY_DELETED",
            Self::NotSettleable { .. } => "ACCOUNT_NOT_SETTLEABLE",
            Self::NotReconciliable { .. } => "ACCOUNT_NOT_RECONCILIABLE",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Self::GroupNotFound(_) => "GROUP_NOT_FOUND",
            Self::NotReconciled(_) => "NOT_RECONCILED",
            Self::EmptySettlement => "EMPTY_SETTLEMENT",
        }
    }
}

impl From<TrackerError> for AppError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::AlreadyReconciled { .. } | TrackerError::DuplicateSettlement { .. } => {
                Self::Conflict(err.to_string())
            }
            TrackerError::EntryNotFound(_)
            | TrackerError::GroupNotFound(_)
            | TrackerError::NotReconciled(_) => Self::NotFound(err.to_string()),
            _ => Self::Validation(err.to_string()),
        }
    }
}
