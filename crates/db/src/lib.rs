//! Storage layer and engine services of the balance ledger.
//!
//! This crate provides:
//! - The [`Connection`] boundary and an in-memory, snapshot-backed store
//! - Row mapping and repositories per table
//! - The [`Engine`]: entry lifecycle, balance verification, reconciliation
//!   tracking, CSV interchange and the period-closing workflow

pub mod connection;
pub mod engine;
pub mod mapping;
pub mod memory;
pub mod repositories;

pub use connection::{Connection, StorageError, Table};
pub use engine::{
    ClosingError, ClosingObserver, ClosingSummary, ClosingWorkflow, Engine, EngineError,
    ImportReport, RemediationReport, SilentObserver,
};
pub use memory::MemoryConnection;
pub use repositories::{EntryField, EntryFilter, EntryOrder};
