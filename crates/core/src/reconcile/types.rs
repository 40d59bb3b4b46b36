//! Concilement group and settlement types.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use carnet_shared::types::{BankLineId, ConcilementId, EntryNumber};

/// Kind of object a concilement member refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MemberKind {
    /// An accounting entry.
    #[serde(rename = "entry")]
    Entry,
    /// A line of an imported bank statement.
    #[serde(rename = "bank-statement-line")]
    BankStatementLine,
}

impl MemberKind {
    /// Returns the string representation of the kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::BankStatementLine => "bank-statement-line",
        }
    }

    /// Parses a kind from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "entry" => Some(Self::Entry),
            "bank-statement-line" => Some(Self::BankStatementLine),
            _ => None,
        }
    }
}

/// Reference to one concilement member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberRef {
    /// Kind of the referenced object.
    pub kind: MemberKind,
    /// Its identifier.
    pub id: i64,
}

impl MemberRef {
    /// Reference to an entry.
    #[must_use]
    pub const fn entry(number: EntryNumber) -> Self {
        Self {
            kind: MemberKind::Entry,
            id: number.value(),
        }
    }

    /// Reference to a bank statement line.
    #[must_use]
    pub const fn bank_line(id: BankLineId) -> Self {
        Self {
            kind: MemberKind::BankStatementLine,
            id: id.value(),
        }
    }

    /// The entry number, when this refers to an entry.
    #[must_use]
    pub const fn as_entry(&self) -> Option<EntryNumber> {
        match self.kind {
            MemberKind::Entry => Some(EntryNumber::new(self.id)),
            MemberKind::BankStatementLine => None,
        }
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.as_str(), self.id)
    }
}

/// A reconciliation group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcilementGroup {
    /// Group identifier.
    pub id: ConcilementId,
    /// Bank value date.
    pub value_date: NaiveDate,
    /// User who created the group.
    pub user: String,
    /// When the group was created.
    pub at: NaiveDateTime,
    /// Members of the group.
    pub members: BTreeSet<MemberRef>,
}

impl ConcilementGroup {
    /// Creates an empty group.
    #[must_use]
    pub fn new(id: ConcilementId, value_date: NaiveDate, user: impl Into<String>, at: NaiveDateTime) -> Self {
        Self {
            id,
            value_date,
            user: user.into(),
            at,
            members: BTreeSet::new(),
        }
    }

    /// Entry numbers among the members.
    pub fn entries(&self) -> impl Iterator<Item = EntryNumber> + '_ {
        self.members.iter().filter_map(MemberRef::as_entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_kind_round_trip() {
        for kind in [MemberKind::Entry, MemberKind::BankStatementLine] {
            assert_eq!(MemberKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(MemberKind::parse("invoice"), None);
    }

    #[test]
    fn test_group_entries_skip_bank_lines() {
        let at = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        let mut group = ConcilementGroup::new(ConcilementId::new(1), at.date(), "admin", at);
        group.members.insert(MemberRef::entry(EntryNumber::new(9)));
        group.members.insert(MemberRef::bank_line(BankLineId::new(9)));
        assert_eq!(group.entries().collect::<Vec<_>>(), vec![EntryNumber::new(9)]);
    }
}
