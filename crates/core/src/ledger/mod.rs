//! Double-entry bookkeeping logic.
//!
//! This module implements the entry-level rules:
//! - Accounting entries and their drafts
//! - Entry statuses and linkage stamps
//! - Accounts and cached balance pairs
//! - Per-currency balance aggregates and the agreement check
//! - Field validation

pub mod account;
pub mod balance;
pub mod entry;
pub mod error;
pub mod types;
pub mod validation;

#[cfg(test)]
mod validation_props;

pub use account::{Account, AccountBalances, Bucket};
pub use balance::{BalanceError, BalanceIssue, BalanceScope, CurrencyTotals, Tolerance};
pub use entry::{Entry, EntryDraft};
pub use error::EntryError;
pub use types::{EntryStatus, Reconciliation, SettlementStamp};
