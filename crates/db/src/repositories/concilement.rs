//! Concilement group repository.

use std::collections::BTreeMap;

use carnet_core::reconcile::{ConcilementGroup, MemberKind, MemberRef};
use carnet_shared::types::ConcilementId;

use crate::connection::{Connection, OrderBy, Predicate, StorageError, Table};
use crate::mapping::{group_fields, group_from_row, member_fields, member_from_row};

fn member_key(member: MemberRef) -> Predicate {
    Predicate::equals("kind", member.kind.as_str()).and(Predicate::equals("foreign_id", member.id))
}

/// Concilement group repository.
#[derive(Debug)]
pub struct ConcilementRepository<'a, C: Connection + ?Sized> {
    conn: &'a mut C,
}

impl<'a, C: Connection + ?Sized> ConcilementRepository<'a, C> {
    /// Creates a repository over `conn`.
    pub fn new(conn: &'a mut C) -> Self {
        Self { conn }
    }

    /// Every group with its members.
    pub fn all(&self) -> Result<Vec<ConcilementGroup>, StorageError> {
        let mut groups: BTreeMap<ConcilementId, ConcilementGroup> = self
            .conn
            .select(Table::ConcilementGroups, &Predicate::All, &[OrderBy::number("id")])?
            .iter()
            .map(|row| group_from_row(row).map(|g| (g.id, g)))
            .collect::<Result<_, _>>()?;
        for row in self.conn.select(Table::ConcilementMembers, &Predicate::All, &[])? {
            let (group, member) = member_from_row(&row)?;
            if let Some(g) = groups.get_mut(&group) {
                g.members.insert(member);
            }
        }
        Ok(groups.into_values().collect())
    }

    /// Finds a group with its members.
    pub fn find(&self, id: ConcilementId) -> Result<Option<ConcilementGroup>, StorageError> {
        let Some(row) = self
            .conn
            .select(Table::ConcilementGroups, &Predicate::equals("id", id), &[])?
            .into_iter()
            .next()
        else {
            return Ok(None);
        };
        let mut group = group_from_row(&row)?;
        for row in self.conn.select(
            Table::ConcilementMembers,
            &Predicate::equals("group_id", id),
            &[],
        )? {
            group.members.insert(member_from_row(&row)?.1);
        }
        Ok(Some(group))
    }

    /// Group holding `member`, if any.
    pub fn group_of(&self, member: MemberRef) -> Result<Option<ConcilementId>, StorageError> {
        self.conn
            .select(Table::ConcilementMembers, &member_key(member), &[])?
            .first()
            .map(|row| member_from_row(row).map(|(group, _)| group))
            .transpose()
    }

    /// Group of every reconciled entry, by entry id.
    pub fn entry_groups(&self) -> Result<BTreeMap<i64, ConcilementId>, StorageError> {
        self.conn
            .select(
                Table::ConcilementMembers,
                &Predicate::equals("kind", MemberKind::Entry.as_str()),
                &[],
            )?
            .iter()
            .map(|row| member_from_row(row).map(|(group, member)| (member.id, group)))
            .collect()
    }

    /// Inserts a group and its members.
    pub fn insert(&mut self, group: &ConcilementGroup) -> Result<(), StorageError> {
        self.conn.insert(Table::ConcilementGroups, group_fields(group))?;
        for member in &group.members {
            self.add_member(group.id, *member)?;
        }
        Ok(())
    }

    /// Adds a member to a group. Fails with `Duplicate` if it is in any group.
    pub fn add_member(&mut self, group: ConcilementId, member: MemberRef) -> Result<(), StorageError> {
        self.conn
            .insert(Table::ConcilementMembers, member_fields(group, member))
    }

    /// Removes a member; returns true if it was present.
    pub fn remove_member(&mut self, member: MemberRef) -> Result<bool, StorageError> {
        Ok(self.conn.delete(Table::ConcilementMembers, &member_key(member))? > 0)
    }

    /// Removes the memberships of the given entries.
    pub fn remove_entries(&mut self, entries: &[i64]) -> Result<usize, StorageError> {
        if entries.is_empty() {
            return Ok(0);
        }
        self.conn.delete(
            Table::ConcilementMembers,
            &Predicate::equals("kind", MemberKind::Entry.as_str()).and(Predicate::In(
                "foreign_id",
                entries.iter().map(ToString::to_string).collect(),
            )),
        )
    }

    /// Deletes groups left without members; returns how many.
    pub fn delete_empty(&mut self) -> Result<usize, StorageError> {
        let occupied: Vec<String> = self
            .conn
            .select(Table::ConcilementMembers, &Predicate::All, &[])?
            .iter()
            .filter_map(|row| row.get("group_id").map(ToString::to_string))
            .collect();
        let empty: Vec<String> = self
            .conn
            .select(Table::ConcilementGroups, &Predicate::All, &[])?
            .iter()
            .filter_map(|row| row.get("id").map(ToString::to_string))
            .filter(|id| !occupied.contains(id))
            .collect();
        if empty.is_empty() {
            return Ok(0);
        }
        self.conn
            .delete(Table::ConcilementGroups, &Predicate::In("id", empty))
    }
}
