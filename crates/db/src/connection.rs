//! Storage boundary.
//!
//! The engine never touches storage directly: it issues declarative
//! select/insert/update/delete calls against a [`Connection`] and gets back
//! rows of optional text cells or affected counts.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use carnet_shared::AppError;

/// Tables of the balance ledger store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Table {
    /// Accounting entries.
    Entries,
    /// Chart of accounts with cached balances.
    Accounts,
    /// Ledgers and their closing dates.
    Ledgers,
    /// Per-ledger, per-currency running totals.
    LedgerTotals,
    /// Operation templates.
    Templates,
    /// Reconciliation groups.
    ConcilementGroups,
    /// Reconciliation group members.
    ConcilementMembers,
    /// Current and archived fiscal periods.
    Periods,
}

impl Table {
    /// Every table.
    pub const ALL: [Self; 8] = [
        Self::Entries,
        Self::Accounts,
        Self::Ledgers,
        Self::LedgerTotals,
        Self::Templates,
        Self::ConcilementGroups,
        Self::ConcilementMembers,
        Self::Periods,
    ];

    /// Storage name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Entries => "entries",
            Self::Accounts => "accounts",
            Self::Ledgers => "ledgers",
            Self::LedgerTotals => "ledger_totals",
            Self::Templates => "templates",
            Self::ConcilementGroups => "concilement_groups",
            Self::ConcilementMembers => "concilement_members",
            Self::Periods => "periods",
        }
    }

    /// Columns whose combined value is unique, empty when unconstrained.
    #[must_use]
    pub const fn unique_key(self) -> &'static [&'static str] {
        match self {
            Self::Entries => &["number"],
            Self::Accounts | Self::Ledgers | Self::Templates | Self::ConcilementGroups => &["id"],
            Self::LedgerTotals => &["ledger", "currency"],
            Self::ConcilementMembers => &["kind", "foreign_id"],
            Self::Periods => &[],
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Storage boundary failures. Always fatal for the operation in progress.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// A unique key is already taken.
    #[error("Duplicate key {key} in {table}")]
    Duplicate {
        /// The table.
        table: Table,
        /// The key value.
        key: String,
    },

    /// A stored cell could not be mapped back to a domain value.
    #[error("Corrupt value '{value}' in {table}.{column}")]
    Corrupt {
        /// The table.
        table: Table,
        /// The column.
        column: &'static str,
        /// The raw cell.
        value: String,
    },

    /// A row expected to exist is missing.
    #[error("Missing row in {table}: {what}")]
    MissingRow {
        /// The table.
        table: Table,
        /// What was looked up.
        what: String,
    },

    /// The backend does not support the operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    /// The backend failed.
    #[error("Backend failure: {0}")]
    Backend(String),
}

impl StorageError {
    /// Returns the stable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Duplicate { .. } => "STORAGE_DUPLICATE",
            Self::Corrupt { .. } => "STORAGE_CORRUPT",
            Self::MissingRow { .. } => "STORAGE_MISSING_ROW",
            Self::Unsupported(_) => "STORAGE_UNSUPPORTED",
            Self::Backend(_) => "STORAGE_BACKEND",
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

/// One stored row: column name to optional text cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, Option<String>>);

impl Row {
    /// Cell value, `None` when absent or NULL.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).and_then(|v| v.as_deref())
    }

    /// Overwrites the cells named in `fields`.
    pub fn apply(&mut self, fields: &Fields) {
        for (column, value) in &fields.0 {
            self.0.insert((*column).to_string(), value.clone());
        }
    }

    /// Values of `columns`, joined for key comparison.
    #[must_use]
    pub fn key(&self, columns: &[&str]) -> String {
        columns
            .iter()
            .map(|c| self.get(c).unwrap_or(""))
            .collect::<Vec<_>>()
            .join("|")
    }
}

impl From<Fields> for Row {
    fn from(fields: Fields) -> Self {
        let mut row = Self::default();
        row.apply(&fields);
        row
    }
}

/// Column assignments for an insert or update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields(Vec<(&'static str, Option<String>)>);

impl Fields {
    /// Creates an empty assignment list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `column` to `value`.
    #[must_use]
    pub fn set(mut self, column: &'static str, value: impl ToString) -> Self {
        self.0.push((column, Some(value.to_string())));
        self
    }

    /// Sets `column` to `value`, or NULL.
    #[must_use]
    pub fn set_opt<T: ToString>(mut self, column: &'static str, value: Option<T>) -> Self {
        self.0.push((column, value.map(|v| v.to_string())));
        self
    }

    /// Sets `column` to NULL.
    #[must_use]
    pub fn null(mut self, column: &'static str) -> Self {
        self.0.push((column, None));
        self
    }

    /// Appends the assignments of `other`.
    pub fn extend(&mut self, other: Self) {
        self.0.extend(other.0);
    }

    /// Returns true if no column is assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Row filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Every row.
    All,
    /// Cell equals the value; `None` matches NULL.
    Eq(&'static str, Option<String>),
    /// Cell equals one of the values.
    In(&'static str, Vec<String>),
    /// Numeric cell in the inclusive range.
    Between(&'static str, Option<i64>, Option<i64>),
    /// ISO date cell in the inclusive range.
    DateBetween(&'static str, Option<String>, Option<String>),
    /// Every predicate holds.
    And(Vec<Predicate>),
}

impl Predicate {
    /// `column = value`.
    pub fn equals(column: &'static str, value: impl ToString) -> Self {
        Self::Eq(column, Some(value.to_string()))
    }

    /// `column IS NULL`.
    #[must_use]
    pub const fn is_null(column: &'static str) -> Self {
        Self::Eq(column, None)
    }

    /// Conjunction with `other`.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::All, p) | (p, Self::All) => p,
            (Self::And(mut ps), Self::And(qs)) => {
                ps.extend(qs);
                Self::And(ps)
            }
            (Self::And(mut ps), q) => {
                ps.push(q);
                Self::And(ps)
            }
            (p, q) => Self::And(vec![p, q]),
        }
    }

    /// Evaluates the predicate on `row`.
    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Self::All => true,
            Self::Eq(column, value) => row.get(column) == value.as_deref(),
            Self::In(column, values) => row
                .get(column)
                .is_some_and(|cell| values.iter().any(|v| v == cell)),
            Self::Between(column, from, to) => row
                .get(column)
                .and_then(|cell| cell.parse::<i64>().ok())
                .is_some_and(|n| from.is_none_or(|f| n >= f) && to.is_none_or(|t| n <= t)),
            Self::DateBetween(column, from, to) => row.get(column).is_some_and(|cell| {
                from.as_deref().is_none_or(|f| cell >= f) && to.as_deref().is_none_or(|t| cell <= t)
            }),
            Self::And(predicates) => predicates.iter().all(|p| p.matches(row)),
        }
    }
}

/// How a column is compared when sorting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKind {
    /// Lexicographic; right for ISO dates and identifiers.
    Text,
    /// Integer.
    Number,
}

/// One sort key, ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    /// The column.
    pub column: &'static str,
    /// Comparison.
    pub kind: SortKind,
}

impl OrderBy {
    /// Text sort on `column`.
    #[must_use]
    pub const fn text(column: &'static str) -> Self {
        Self {
            column,
            kind: SortKind::Text,
        }
    }

    /// Numeric sort on `column`.
    #[must_use]
    pub const fn number(column: &'static str) -> Self {
        Self {
            column,
            kind: SortKind::Number,
        }
    }

    /// Compares two rows on this key. NULL sorts first.
    #[must_use]
    pub fn compare(&self, a: &Row, b: &Row) -> std::cmp::Ordering {
        let (x, y) = (a.get(self.column), b.get(self.column));
        match self.kind {
            SortKind::Text => x.cmp(&y),
            SortKind::Number => {
                let parse = |v: Option<&str>| v.and_then(|s| s.parse::<i64>().ok());
                parse(x).cmp(&parse(y))
            }
        }
    }
}

/// Declarative access to the balance ledger store.
pub trait Connection {
    /// Rows of `table` matching `predicate`, sorted by `order`.
    fn select(
        &self,
        table: Table,
        predicate: &Predicate,
        order: &[OrderBy],
    ) -> Result<Vec<Row>, StorageError>;

    /// Inserts one row.
    fn insert(&mut self, table: Table, fields: Fields) -> Result<(), StorageError>;

    /// Updates matching rows; returns the affected count.
    fn update(
        &mut self,
        table: Table,
        fields: Fields,
        predicate: &Predicate,
    ) -> Result<usize, StorageError>;

    /// Deletes matching rows; returns the affected count.
    fn delete(&mut self, table: Table, predicate: &Predicate) -> Result<usize, StorageError>;

    /// Returns true if `begin`/`commit`/`rollback` are available.
    fn supports_transactions(&self) -> bool {
        false
    }

    /// Starts a unit of work.
    fn begin(&mut self) -> Result<(), StorageError> {
        Err(StorageError::Unsupported("begin"))
    }

    /// Commits the current unit of work.
    fn commit(&mut self) -> Result<(), StorageError> {
        Err(StorageError::Unsupported("commit"))
    }

    /// Discards the current unit of work.
    fn rollback(&mut self) -> Result<(), StorageError> {
        Err(StorageError::Unsupported("rollback"))
    }
}
