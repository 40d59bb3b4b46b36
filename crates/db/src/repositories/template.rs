//! Operation template repository.

use crate::connection::{Connection, Fields, OrderBy, Predicate, StorageError, Table};

/// Operation template repository.
#[derive(Debug)]
pub struct TemplateRepository<'a, C: Connection + ?Sized> {
    conn: &'a mut C,
}

impl<'a, C: Connection + ?Sized> TemplateRepository<'a, C> {
    /// Creates a repository over `conn`.
    pub fn new(conn: &'a mut C) -> Self {
        Self { conn }
    }

    /// Returns true if the template exists.
    pub fn exists(&self, id: &str) -> Result<bool, StorageError> {
        Ok(!self
            .conn
            .select(Table::Templates, &Predicate::equals("id", id), &[])?
            .is_empty())
    }

    /// Registers a template unless it already exists.
    pub fn ensure(&mut self, id: &str, label: &str) -> Result<(), StorageError> {
        if self.exists(id)? {
            return Ok(());
        }
        self.conn.insert(
            Table::Templates,
            Fields::new().set("id", id).set("label", label),
        )
    }

    /// Every `(id, label)` pair.
    pub fn all(&self) -> Result<Vec<(String, String)>, StorageError> {
        Ok(self
            .conn
            .select(Table::Templates, &Predicate::All, &[OrderBy::text("id")])?
            .iter()
            .filter_map(|row| {
                row.get("id")
                    .map(|id| (id.to_string(), row.get("label").unwrap_or_default().to_string()))
            })
            .collect())
    }
}
