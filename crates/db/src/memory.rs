//! In-memory reference backend.
//!
//! Enforces the unique keys declared by [`Table::unique_key`], supports a
//! single-level unit of work through a snapshot, and can persist itself as a
//! JSON document.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::connection::{Connection, Fields, OrderBy, Predicate, Row, StorageError, Table};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct Tables(BTreeMap<String, Vec<Row>>);

impl Tables {
    fn rows(&self, table: Table) -> &[Row] {
        self.0.get(table.name()).map_or(&[], Vec::as_slice)
    }

    fn rows_mut(&mut self, table: Table) -> &mut Vec<Row> {
        self.0.entry(table.name().to_string()).or_default()
    }
}

/// In-memory connection.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnection {
    tables: Tables,
    snapshot: Option<Tables>,
    transactions: bool,
    fail_after: Option<usize>,
}

impl MemoryConnection {
    /// Creates an empty store with unit-of-work support.
    #[must_use]
    pub fn new() -> Self {
        Self {
            transactions: true,
            ..Self::default()
        }
    }

    /// Creates an empty store without unit-of-work support.
    #[must_use]
    pub fn without_transactions() -> Self {
        Self::default()
    }

    /// Makes the write after the next `writes` successful ones fail.
    pub fn fail_after(&mut self, writes: usize) {
        self.fail_after = Some(writes);
    }

    /// Number of rows currently in `table`.
    #[must_use]
    pub fn row_count(&self, table: Table) -> usize {
        self.tables.rows(table).len()
    }

    /// Serializes every table as JSON.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Backend` if serialization fails.
    pub fn to_json(&self) -> Result<String, StorageError> {
        serde_json::to_string_pretty(&self.tables).map_err(|e| StorageError::Backend(e.to_string()))
    }

    /// Restores a store serialized by [`Self::to_json`].
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Backend` if the document is not a snapshot.
    pub fn from_json(json: &str) -> Result<Self, StorageError> {
        let tables = serde_json::from_str(json).map_err(|e| StorageError::Backend(e.to_string()))?;
        Ok(Self {
            tables,
            ..Self::new()
        })
    }

    /// Loads a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Backend` if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| StorageError::Backend(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Writes a snapshot file.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Backend` if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        std::fs::write(path, self.to_json()?)
            .map_err(|e| StorageError::Backend(format!("{}: {e}", path.display())))
    }

    fn check_write(&mut self) -> Result<(), StorageError> {
        match self.fail_after {
            Some(0) => {
                self.fail_after = None;
                Err(StorageError::Backend("injected write failure".to_string()))
            }
            Some(n) => {
                self.fail_after = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn check_unique(&self, table: Table, candidate: &Row, skip: Option<usize>) -> Result<(), StorageError> {
        let columns = table.unique_key();
        if columns.is_empty() {
            return Ok(());
        }
        let key = candidate.key(columns);
        let clash = self
            .tables
            .rows(table)
            .iter()
            .enumerate()
            .any(|(i, row)| Some(i) != skip && row.key(columns) == key);
        if clash {
            Err(StorageError::Duplicate { table, key })
        } else {
            Ok(())
        }
    }
}

impl Connection for MemoryConnection {
    fn select(
        &self,
        table: Table,
        predicate: &Predicate,
        order: &[OrderBy],
    ) -> Result<Vec<Row>, StorageError> {
        let mut rows: Vec<Row> = self
            .tables
            .rows(table)
            .iter()
            .filter(|row| predicate.matches(row))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            order
                .iter()
                .map(|key| key.compare(a, b))
                .find(|o| o.is_ne())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(rows)
    }

    fn insert(&mut self, table: Table, fields: Fields) -> Result<(), StorageError> {
        self.check_write()?;
        let row = Row::from(fields);
        self.check_unique(table, &row, None)?;
        self.tables.rows_mut(table).push(row);
        Ok(())
    }

    fn update(
        &mut self,
        table: Table,
        fields: Fields,
        predicate: &Predicate,
    ) -> Result<usize, StorageError> {
        self.check_write()?;
        let targets: Vec<usize> = self
            .tables
            .rows(table)
            .iter()
            .enumerate()
            .filter(|(_, row)| predicate.matches(row))
            .map(|(i, _)| i)
            .collect();
        for &i in &targets {
            let mut updated = self.tables.rows(table)[i].clone();
            updated.apply(&fields);
            self.check_unique(table, &updated, Some(i))?;
            self.tables.rows_mut(table)[i] = updated;
        }
        Ok(targets.len())
    }

    fn delete(&mut self, table: Table, predicate: &Predicate) -> Result<usize, StorageError> {
        self.check_write()?;
        let rows = self.tables.rows_mut(table);
        let before = rows.len();
        rows.retain(|row| !predicate.matches(row));
        Ok(before - rows.len())
    }

    fn supports_transactions(&self) -> bool {
        self.transactions
    }

    fn begin(&mut self) -> Result<(), StorageError> {
        if !self.transactions {
            return Err(StorageError::Unsupported("begin"));
        }
        if self.snapshot.is_some() {
            return Err(StorageError::Backend("unit of work already open".to_string()));
        }
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        self.snapshot
            .take()
            .map(|_| ())
            .ok_or_else(|| StorageError::Backend("no unit of work to commit".to_string()))
    }

    fn rollback(&mut self) -> Result<(), StorageError> {
        let snapshot = self
            .snapshot
            .take()
            .ok_or_else(|| StorageError::Backend("no unit of work to roll back".to_string()))?;
        self.tables = snapshot;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(number: i64) -> Fields {
        Fields::new().set("number", number).set("status", "rough")
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut conn = MemoryConnection::new();
        conn.insert(Table::Entries, entry(1)).unwrap();
        let err = conn.insert(Table::Entries, entry(1)).unwrap_err();
        assert_eq!(err.error_code(), "STORAGE_DUPLICATE");
        assert_eq!(conn.row_count(Table::Entries), 1);
    }

    #[test]
    fn test_update_and_delete_counts() {
        let mut conn = MemoryConnection::new();
        for n in 1..=3 {
            conn.insert(Table::Entries, entry(n)).unwrap();
        }
        let updated = conn
            .update(
                Table::Entries,
                Fields::new().set("status", "validated"),
                &Predicate::Between("number", Some(2), None),
            )
            .unwrap();
        assert_eq!(updated, 2);
        let deleted = conn
            .delete(Table::Entries, &Predicate::equals("status", "validated"))
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(conn.row_count(Table::Entries), 1);
    }

    #[test]
    fn test_rollback_restores() {
        let mut conn = MemoryConnection::new();
        conn.insert(Table::Entries, entry(1)).unwrap();
        conn.begin().unwrap();
        conn.insert(Table::Entries, entry(2)).unwrap();
        conn.rollback().unwrap();
        assert_eq!(conn.row_count(Table::Entries), 1);
    }

    #[test]
    fn test_without_transactions() {
        let mut conn = MemoryConnection::without_transactions();
        assert!(!conn.supports_transactions());
        assert!(matches!(conn.begin(), Err(StorageError::Unsupported(_))));
    }

    #[test]
    fn test_injected_failure() {
        let mut conn = MemoryConnection::new();
        conn.fail_after(1);
        conn.insert(Table::Entries, entry(1)).unwrap();
        assert!(conn.insert(Table::Entries, entry(2)).is_err());
        conn.insert(Table::Entries, entry(3)).unwrap();
    }

    #[test]
    fn test_json_round_trip() {
        let mut conn = MemoryConnection::new();
        conn.insert(Table::Entries, entry(7)).unwrap();
        let restored = MemoryConnection::from_json(&conn.to_json().unwrap()).unwrap();
        let rows = restored
            .select(Table::Entries, &Predicate::All, &[])
            .unwrap();
        assert_eq!(rows[0].get("number"), Some("7"));
    }

    #[test]
    fn test_select_orders() {
        let mut conn = MemoryConnection::new();
        for n in [10, 9, 11] {
            conn.insert(Table::Entries, entry(n)).unwrap();
        }
        let rows = conn
            .select(Table::Entries, &Predicate::All, &[OrderBy::number("number")])
            .unwrap();
        let numbers: Vec<_> = rows.iter().filter_map(|r| r.get("number")).collect();
        assert_eq!(numbers, vec!["9", "10", "11"]);
    }
}
