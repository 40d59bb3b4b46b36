//! Common types used across the workspace.

pub mod id;
pub mod money;

pub use id::*;
pub use money::{DebitCredit, Side, currency_digits, tolerance_for_digits};
