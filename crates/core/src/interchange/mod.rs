//! Entry import and export.

pub mod csv;

pub use self::csv::{
    ImportError, ImportRow, ImportedReconciliation, SettlementMark, read_rows, write_entries,
};
