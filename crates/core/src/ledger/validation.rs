//! Business rule validation for entry fields.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use carnet_shared::types::{DebitCredit, Side};

use super::error::EntryError;
use super::types::EntryStatus;

/// Validates an entry amount: exactly one side non-zero, never negative.
///
/// Returns the side carrying the amount.
///
/// # Errors
///
/// Returns `NegativeAmount`, `NonExclusiveAmount` or `ZeroAmount`.
pub fn validate_amount(amount: &DebitCredit) -> Result<Side, EntryError> {
    if amount.debit < Decimal::ZERO || amount.credit < Decimal::ZERO {
        return Err(EntryError::NegativeAmount);
    }

    match (amount.debit.is_zero(), amount.credit.is_zero()) {
        (false, true) => Ok(Side::Debit),
        (true, false) => Ok(Side::Credit),
        (false, false) => Err(EntryError::NonExclusiveAmount),
        (true, true) => Err(EntryError::ZeroAmount),
    }
}

/// Validates a currency code: three ASCII letters.
///
/// # Errors
///
/// Returns `UnknownCurrency` for anything else.
pub fn validate_currency(code: &str) -> Result<(), EntryError> {
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        Err(EntryError::UnknownCurrency(code.to_string()))
    }
}

/// Fails with `MissingField` when `value` is blank.
///
/// # Errors
///
/// Returns `MissingField(field)` for an empty or whitespace-only value.
pub fn require(field: &'static str, value: &str) -> Result<(), EntryError> {
    if value.trim().is_empty() {
        Err(EntryError::MissingField(field))
    } else {
        Ok(())
    }
}

/// Returns true if an entry respects its ledger's closing date.
///
/// Only ROUGH entries are constrained: they must be dated strictly after the
/// closing date. Validated entries may sit on or before it, and the other
/// statuses are outside the period.
#[must_use]
pub fn respects_ledger_closing(
    status: EntryStatus,
    effect_date: NaiveDate,
    ledger_closing: Option<NaiveDate>,
) -> bool {
    status != EntryStatus::Rough || ledger_closing.is_none_or(|closing| effect_date > closing)
}
