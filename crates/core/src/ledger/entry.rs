//! Accounting entry domain types.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use carnet_shared::types::{DebitCredit, EntryNumber, Side};

use super::error::EntryError;
use super::types::{EntryStatus, Reconciliation, SettlementStamp};
use super::validation::{require, validate_amount, validate_currency};
use crate::fiscal::{PeriodState, Placed, initial_status};

/// A single accounting entry.
///
/// An entry books one amount on one side of one account. The debit/credit pair
/// always has exactly one non-zero side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Engine-assigned sequential number.
    pub number: EntryNumber,
    /// Date the operation took place.
    pub operation_date: NaiveDate,
    /// Date the entry takes effect; drives its status.
    pub effect_date: NaiveDate,
    /// Free label.
    pub label: String,
    /// Free reference (invoice number, cheque number...).
    pub reference: String,
    /// Account identifier.
    pub account: String,
    /// Currency code.
    pub currency: String,
    /// Ledger identifier.
    pub ledger: String,
    /// Operation template identifier.
    pub template: Option<String>,
    /// Booked amount.
    pub amount: DebitCredit,
    /// Lifecycle status.
    pub status: EntryStatus,
    /// User who created the entry.
    pub created_by: String,
    /// When the entry was created.
    pub created_at: NaiveDateTime,
    /// Settlement group stamp.
    pub settlement: Option<SettlementStamp>,
    /// Reconciliation linkage.
    pub reconciliation: Option<Reconciliation>,
}

impl Entry {
    /// Side carrying the amount.
    #[must_use]
    pub fn side(&self) -> Side {
        if self.amount.debit.is_zero() {
            Side::Credit
        } else {
            Side::Debit
        }
    }

    /// The non-zero amount.
    #[must_use]
    pub fn value(&self) -> Decimal {
        match self.side() {
            Side::Debit => self.amount.debit,
            Side::Credit => self.amount.credit,
        }
    }

    /// Returns true if the entry carries a settlement number.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.settlement.is_some()
    }

    /// Returns true if the entry belongs to a concilement group.
    #[must_use]
    pub fn is_reconciled(&self) -> bool {
        self.reconciliation.is_some()
    }

    /// The editable fields of this entry, for a subsequent edit.
    #[must_use]
    pub fn draft(&self) -> EntryDraft {
        EntryDraft {
            operation_date: self.operation_date,
            effect_date: self.effect_date,
            label: self.label.clone(),
            reference: self.reference.clone(),
            account: self.account.clone(),
            currency: self.currency.clone(),
            ledger: self.ledger.clone(),
            template: self.template.clone(),
            amount: self.amount,
        }
    }

    /// Overwrites the editable fields with `draft` and the placement result.
    ///
    /// Number, creation stamp and linkage are kept.
    pub fn apply(&mut self, draft: EntryDraft, placed: Placed) {
        self.operation_date = draft.operation_date;
        self.effect_date = placed.effect_date;
        self.label = draft.label;
        self.reference = draft.reference;
        self.account = draft.account;
        self.currency = draft.currency;
        self.ledger = draft.ledger;
        self.template = draft.template;
        self.amount = draft.amount;
        self.status = placed.status;
    }
}

/// Caller-supplied fields of a new or edited entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDraft {
    /// Date the operation took place.
    pub operation_date: NaiveDate,
    /// Date the entry takes effect.
    pub effect_date: NaiveDate,
    /// Free label.
    pub label: String,
    /// Free reference.
    pub reference: String,
    /// Account identifier.
    pub account: String,
    /// Currency code.
    pub currency: String,
    /// Ledger identifier.
    pub ledger: String,
    /// Operation template identifier.
    pub template: Option<String>,
    /// Booked amount.
    pub amount: DebitCredit,
}

impl EntryDraft {
    /// Starts a draft dated `date` for both operation and effect.
    #[must_use]
    pub fn new(
        date: NaiveDate,
        account: impl Into<String>,
        ledger: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            operation_date: date,
            effect_date: date,
            label: String::new(),
            reference: String::new(),
            account: account.into(),
            currency: currency.into(),
            ledger: ledger.into(),
            template: None,
            amount: DebitCredit::ZERO,
        }
    }

    /// Sets the effect date.
    #[must_use]
    pub fn effect_date(mut self, date: NaiveDate) -> Self {
        self.effect_date = date;
        self
    }

    /// Sets the label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the reference.
    #[must_use]
    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    /// Sets the operation template.
    #[must_use]
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Books `amount` on the debit side.
    #[must_use]
    pub fn debit(mut self, amount: Decimal) -> Self {
        self.amount = DebitCredit::on(Side::Debit, amount);
        self
    }

    /// Books `amount` on the credit side.
    #[must_use]
    pub fn credit(mut self, amount: Decimal) -> Self {
        self.amount = DebitCredit::on(Side::Credit, amount);
        self
    }

    /// Books `amount` on `side`.
    #[must_use]
    pub fn on(mut self, side: Side, amount: Decimal) -> Self {
        self.amount = DebitCredit::on(side, amount);
        self
    }

    /// Validates the standalone fields.
    ///
    /// # Errors
    ///
    /// Returns the first field error found.
    pub fn check(&self) -> Result<Side, EntryError> {
        require("account", &self.account)?;
        require("ledger", &self.ledger)?;
        require("currency", &self.currency)?;
        validate_currency(&self.currency)?;
        validate_amount(&self.amount)
    }

    /// Computes the status and effective date under `state`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownLedger` or `InvalidEffectDate`.
    pub fn place(&self, state: &PeriodState, auto_correct: bool) -> Result<Placed, EntryError> {
        let ledger = state
            .ledger(&self.ledger)
            .ok_or_else(|| EntryError::UnknownLedger(self.ledger.clone()))?;
        initial_status(
            self.effect_date,
            &state.bounds(),
            ledger.last_closing_date,
            auto_correct,
        )
    }

    /// Builds the entry once numbered and placed.
    #[must_use]
    pub fn into_entry(
        self,
        number: EntryNumber,
        placed: Placed,
        user: impl Into<String>,
        at: NaiveDateTime,
    ) -> Entry {
        Entry {
            number,
            operation_date: self.operation_date,
            effect_date: placed.effect_date,
            label: self.label,
            reference: self.reference,
            account: self.account,
            currency: self.currency.to_uppercase(),
            ledger: self.ledger,
            template: self.template,
            amount: self.amount,
            status: placed.status,
            created_by: user.into(),
            created_at: at,
            settlement: None,
            reconciliation: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fiscal::{FiscalPeriod, Ledger, PeriodBounds};
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn state() -> PeriodState {
        let mut bank = Ledger::new("BQ", "Bank");
        bank.last_closing_date = Some(d(2024, 3, 31));
        PeriodState::new(
            FiscalPeriod::open(PeriodBounds::new(Some(d(2024, 1, 1)), Some(d(2024, 12, 31)))),
            [bank, Ledger::new("OD", "Miscellaneous")],
        )
    }

    #[test]
    fn test_check_requires_fields() {
        let draft = EntryDraft::new(d(2024, 5, 1), "", "BQ", "EUR").debit(dec!(10));
        assert_eq!(draft.check(), Err(EntryError::MissingField("account")));

        let draft = EntryDraft::new(d(2024, 5, 1), "512", "BQ", "EUR");
        assert_eq!(draft.check(), Err(EntryError::ZeroAmount));

        let draft = EntryDraft::new(d(2024, 5, 1), "512", "BQ", "EUR").credit(dec!(10));
        assert_eq!(draft.check(), Ok(Side::Credit));
    }

    #[test]
    fn test_place_unknown_ledger() {
        let draft = EntryDraft::new(d(2024, 5, 1), "512", "XX", "EUR").debit(dec!(10));
        assert_eq!(
            draft.place(&state(), false),
            Err(EntryError::UnknownLedger("XX".to_string()))
        );
    }

    #[test]
    fn test_into_entry_uses_placement() {
        let draft = EntryDraft::new(d(2024, 3, 20), "512", "BQ", "eur").debit(dec!(10));
        let placed = draft.place(&state(), true).unwrap();
        let at = d(2024, 5, 1).and_hms_opt(9, 0, 0).unwrap();
        let entry = draft.into_entry(EntryNumber::new(7), placed, "admin", at);
        assert_eq!(entry.effect_date, d(2024, 4, 1));
        assert_eq!(entry.status, EntryStatus::Rough);
        assert_eq!(entry.currency, "EUR");
        assert_eq!(entry.side(), Side::Debit);
        assert_eq!(entry.value(), dec!(10));
        assert!(!entry.is_settled());
    }

    #[test]
    fn test_apply_keeps_number_and_linkage() {
        let at = d(2024, 5, 1).and_hms_opt(9, 0, 0).unwrap();
        let draft = EntryDraft::new(d(2024, 5, 1), "512", "OD", "EUR").debit(dec!(10));
        let placed = draft.place(&state(), false).unwrap();
        let mut entry = draft.into_entry(EntryNumber::new(3), placed, "admin", at);

        let edited = entry.draft().credit(dec!(25)).effect_date(d(2025, 2, 1));
        let placed = edited.place(&state(), false).unwrap();
        entry.apply(edited, placed);

        assert_eq!(entry.number, EntryNumber::new(3));
        assert_eq!(entry.status, EntryStatus::Future);
        assert_eq!(entry.amount, DebitCredit::new(dec!(0), dec!(25)));
    }
}
