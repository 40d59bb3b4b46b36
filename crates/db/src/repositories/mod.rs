//! Repository abstractions for data access.
//!
//! Repositories borrow a [`Connection`](crate::connection::Connection) for the
//! duration of one call sequence and hide row mapping from the engine.

pub mod account;
pub mod concilement;
pub mod entry;
pub mod ledger;
pub mod period;
pub mod template;

pub use account::AccountRepository;
pub use concilement::ConcilementRepository;
pub use entry::{EntryField, EntryFilter, EntryOrder, EntryRepository};
pub use ledger::LedgerRepository;
pub use period::{Counter, PeriodRepository};
pub use template::TemplateRepository;
