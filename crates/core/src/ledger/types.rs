//! Entry status and linkage types.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use carnet_shared::types::{ConcilementId, SettlementNumber};

/// Lifecycle status of an accounting entry.
///
/// - `Rough`: in the period, editable
/// - `Future`: dated after the period end, editable
/// - `Past`: dated before the period begin, read-only
/// - `Validated`: locked
/// - `Deleted`: soft-deleted, terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Entry is in the period and can be modified.
    Rough,
    /// Entry is dated after the period end.
    Future,
    /// Entry is dated before the period begin.
    Past,
    /// Entry has been validated (immutable).
    Validated,
    /// Entry has been deleted (immutable).
    Deleted,
}

impl EntryStatus {
    /// All statuses, in storage order.
    pub const ALL: [Self; 5] = [
        Self::Rough,
        Self::Future,
        Self::Past,
        Self::Validated,
        Self::Deleted,
    ];

    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rough => "rough",
            Self::Future => "future",
            Self::Past => "past",
            Self::Validated => "validated",
            Self::Deleted => "deleted",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "rough" => Some(Self::Rough),
            "future" => Some(Self::Future),
            "past" => Some(Self::Past),
            "validated" => Some(Self::Validated),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Returns true if the entry's fields can be modified.
    #[must_use]
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Rough | Self::Future)
    }

    /// Returns true if the entry can take part in a settlement or reconciliation.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Deleted)
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settlement fields stamped on every member of a settlement group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementStamp {
    /// Shared group number.
    pub number: SettlementNumber,
    /// User who settled the group.
    pub user: String,
    /// When the group was settled.
    pub at: NaiveDateTime,
}

/// Reconciliation linkage of an entry, derived from concilement membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    /// The concilement group.
    pub group: ConcilementId,
    /// Bank value date of the group.
    pub value_date: NaiveDate,
    /// User who reconciled.
    pub user: String,
    /// When the group was created.
    pub at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_status_editable() {
        assert!(EntryStatus::Rough.is_editable());
        assert!(EntryStatus::Future.is_editable());
        assert!(!EntryStatus::Past.is_editable());
        assert!(!EntryStatus::Validated.is_editable());
        assert!(!EntryStatus::Deleted.is_editable());
    }

    #[test]
    fn test_entry_status_parse_round_trip() {
        for status in EntryStatus::ALL {
            assert_eq!(EntryStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(EntryStatus::parse(" VALIDATED "), Some(EntryStatus::Validated));
        assert_eq!(EntryStatus::parse("posted"), None);
    }
}
