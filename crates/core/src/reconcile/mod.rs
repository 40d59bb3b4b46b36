//! Reconciliation and settlement domain types.

pub mod error;
pub mod types;

pub use error::TrackerError;
pub use types::{ConcilementGroup, MemberKind, MemberRef};
