//! Entry error types for validation and state errors.

use chrono::NaiveDate;
use thiserror::Error;
use carnet_shared::AppError;
use carnet_shared::types::EntryNumber;

use super::types::EntryStatus;

/// Errors that can occur while building, editing or transitioning an entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryError {
    // ========== Field Errors ==========
    /// A required field is empty.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Both debit and credit are zero.
    #[error("Entry amount cannot be zero")]
    ZeroAmount,

    /// Debit or credit is negative.
    #[error("Entry amount cannot be negative")]
    NegativeAmount,

    /// Debit and credit are both non-zero.
    #[error("Entry must specify either debit or credit, not both")]
    NonExclusiveAmount,

    /// Currency code is not a three-letter code.
    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    /// Entry currency differs from its account's currency.
    #[error("Account {account} is kept in {expected}, not {found}")]
    CurrencyMismatch {
        /// The account.
        account: String,
        /// Currency of the account.
        expected: String,
        /// Currency of the entry.
        found: String,
    },

    // ========== Reference Errors ==========
    /// Account identifier does not exist.
    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    /// Ledger identifier does not exist.
    #[error("Unknown ledger: {0}")]
    UnknownLedger(String),

    /// Operation template identifier does not exist.
    #[error("Unknown operation template: {0}")]
    UnknownTemplate(String),

    // ========== Date Errors ==========
    /// Effect date is before the ledger's minimal allowed date.
    #[error("Effect date {date} is before the minimal allowed date {minimum}")]
    InvalidEffectDate {
        /// Requested effect date.
        date: NaiveDate,
        /// Minimal allowed effect date for the ledger.
        minimum: NaiveDate,
    },

    /// Period begin is after its end.
    #[error("Period begins {begin} after it ends {end}")]
    InvertedBounds {
        /// Requested begin.
        begin: NaiveDate,
        /// Requested end.
        end: NaiveDate,
    },

    /// A validated entry would fall outside the new period bounds.
    #[error("Validated entry {number} dated {effect_date} would fall outside the period")]
    ValidatedOutsidePeriod {
        /// The entry.
        number: EntryNumber,
        /// Its effect date.
        effect_date: NaiveDate,
    },

    // ========== State Errors ==========
    /// Entry status does not allow edits.
    #[error("Entry {number} is {status} and cannot be edited")]
    NotEditable {
        /// The entry.
        number: EntryNumber,
        /// Its current status.
        status: EntryStatus,
    },

    /// Attempted an invalid status transition.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// The current status.
        from: EntryStatus,
        /// The attempted target status.
        to: EntryStatus,
    },

    /// Entry not found.
    #[error("Entry {0} not found")]
    NotFound(EntryNumber),
}

impl EntryError {
    /// Returns the stable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "MISSING_FIELD",
            Self::ZeroAmount => "ZERO_AMOUNT",
            Self::NegativeAmount => "NEGATIVE_AMOUNT",
            Self::NonExclusiveAmount => "NON_EXCLUSIVE_AMOUNT",
            Self::UnknownCurrency(_) => "UNKNOWN_CURRENCY",
            Self::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
            Self::UnknownAccount(_) => "UNKNOWN_ACCOUNT",
            Self::UnknownLedger(_) => "UNKNOWN_LEDGER",
            Self::UnknownTemplate(_) => "UNKNOWN_TEMPLATE",
            Self::InvalidEffectDate { .. } => "INVALID_EFFECT_DATE",
            Self::InvertedBounds { .. } => "INVALID_PERIOD_BOUNDS",
            Self::ValidatedOutsidePeriod { .. } => "VALIDATED_OUTSIDE_PERIOD",
            Self::NotEditable { .. } => "ENTRY_NOT_EDITABLE",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::NotFound(_) => "ENTRY_NOT_FOUND",
        }
    }
}

impl From<EntryError> for AppError {
    fn from(err: EntryError) -> Self {
        match err {
            EntryError::NotFound(_) => Self::NotFound(err.to_string()),
            _ => Self::Validation(err.to_string()),
        }
    }
}
