//! Entry lifecycle driver.
//!
//! Applies the pure status rules to stored entries and keeps the cached
//! aggregates in step: every write that changes an entry's amount, account,
//! ledger or status also adjusts the account balance pairs and the ledger
//! totals in the same unit of work.

use chrono::NaiveDate;
use carnet_core::events::{BulkOperation, EngineEvent};
use carnet_core::fiscal::{Boundary, BoundaryChange, BoundaryMove, PeriodBounds, Placed};
use carnet_core::ledger::{Bucket, Entry, EntryDraft, EntryError, EntryStatus};
use carnet_core::workflow::EntryTransitions;
use carnet_shared::types::{DebitCredit, EntryNumber};
use tracing::{debug, info};

use super::{Engine, EngineError};
use crate::connection::Connection;
use crate::repositories::{
    AccountRepository, EntryField, EntryFilter, EntryRepository, LedgerRepository,
    PeriodRepository, TemplateRepository,
};

/// Entries moved, or that would move, by a period date change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemediationReport {
    /// Entries moved by the `begin` edit.
    pub begin: usize,
    /// Entries moved by the `end` edit.
    pub end: usize,
}

impl RemediationReport {
    /// Total entries moved.
    #[must_use]
    pub fn total(&self) -> usize {
        self.begin + self.end
    }
}

impl<C: Connection> Engine<C> {
    /// Loads entries matching `filter`.
    pub fn entries(&mut self, filter: &EntryFilter) -> Result<Vec<Entry>, EngineError> {
        Ok(EntryRepository::new(&mut self.conn).load(filter)?)
    }

    /// Counts entries whose `field` equals `value`, whatever their status.
    pub fn count_entries(&mut self, field: EntryField, value: &str) -> Result<usize, EngineError> {
        Ok(EntryRepository::new(&mut self.conn).count_matching(field, value)?)
    }

    /// Finds one entry.
    pub fn entry(&mut self, number: EntryNumber) -> Result<Entry, EngineError> {
        EntryRepository::new(&mut self.conn)
            .find(number)?
            .ok_or_else(|| EntryError::NotFound(number).into())
    }

    /// Creates an entry, computing its status from its effect date.
    ///
    /// With `auto_correct`, an effect date before the ledger's minimal
    /// allowed date is clamped to it instead of being rejected.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a bad field, unknown reference or an
    /// effect date before the ledger minimum.
    pub fn create(&mut self, draft: EntryDraft, auto_correct: bool) -> Result<Entry, EngineError> {
        let placed = self.check_draft(&draft, auto_correct)?;
        let entry = self.unit_of_work(|engine| engine.insert_placed(draft, placed))?;
        debug!(number = %entry.number, status = %entry.status, "Entry created");
        Ok(entry)
    }

    /// Replaces the editable fields of a ROUGH or FUTURE entry.
    ///
    /// The status is recomputed from the new effect date.
    ///
    /// # Errors
    ///
    /// Returns `NotEditable` for any other status, or a validation error for
    /// the new fields.
    pub fn edit(
        &mut self,
        number: EntryNumber,
        draft: EntryDraft,
        auto_correct: bool,
    ) -> Result<Entry, EngineError> {
        let mut entry = self.entry(number)?;
        EntryTransitions::ensure_editable(number, entry.status)?;
        let placed = self.check_draft(&draft, auto_correct)?;
        let previous = entry.status;

        self.unit_of_work(|engine| {
            engine.unpost(&entry)?;
            entry.apply(draft, placed);
            EntryRepository::new(&mut engine.conn).update(&entry)?;
            engine.post(&entry)?;
            Ok(())
        })?;

        self.publish(&EngineEvent::EntryUpdated(number));
        if previous != entry.status {
            self.publish(&EngineEvent::StatusChanged {
                number,
                previous,
                new: entry.status,
            });
        }
        Ok(entry)
    }

    /// Validates one ROUGH entry.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the entry is ROUGH.
    pub fn validate(&mut self, number: EntryNumber) -> Result<Entry, EngineError> {
        let mut entry = self.entry(number)?;
        let target = EntryTransitions::validate(entry.status)?;
        self.unit_of_work(|engine| engine.transition(&mut entry, target))?;
        Ok(entry)
    }

    /// Validates every ROUGH entry of `ledger` dated on or before `date`.
    ///
    /// Running it twice changes nothing the second time. Returns the number of
    /// entries validated.
    pub fn validate_ledger_up_to(&mut self, ledger: &str, date: NaiveDate) -> Result<usize, EngineError> {
        if LedgerRepository::new(&mut self.conn).find(ledger)?.is_none() {
            return Err(EntryError::UnknownLedger(ledger.to_string()).into());
        }
        let rough = self.entries(
            &EntryFilter::new()
                .ledger(ledger)
                .status(EntryStatus::Rough)
                .effect_to(date),
        )?;
        self.bulk_transition(BulkOperation::Validate, rough, |_| Some(EntryStatus::Validated))
    }

    /// Soft-deletes a ROUGH or FUTURE entry.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` for any other status.
    pub fn delete(&mut self, number: EntryNumber) -> Result<Entry, EngineError> {
        let mut entry = self.entry(number)?;
        let target = EntryTransitions::delete(entry.status)?;
        self.unit_of_work(|engine| engine.transition(&mut entry, target))?;
        Ok(entry)
    }

    /// Validates the ROUGH entries of `ledger` up to `date`, then advances its
    /// closing date to `date`.
    ///
    /// The closing date never moves backwards. Returns the number of entries
    /// validated.
    pub fn close_ledger(&mut self, ledger: &str, date: NaiveDate) -> Result<usize, EngineError> {
        self.unit_of_work(|engine| {
            let validated = engine.validate_ledger_up_to(ledger, date)?;
            engine.advance_ledger_closing(ledger, date)?;
            Ok(validated)
        })
    }

    /// Changes the current period bounds and remediates entry statuses.
    ///
    /// The `begin` edit is remediated first, then the `end` edit. With
    /// `dry_run`, only counts the entries that would move.
    ///
    /// # Errors
    ///
    /// Returns `InvertedBounds` when `begin` is after `end`, and
    /// `ValidatedOutsidePeriod` when a VALIDATED entry would fall outside the
    /// new bounds. Both are reported by a dry run too.
    pub fn change_period_dates(
        &mut self,
        bounds: PeriodBounds,
        dry_run: bool,
    ) -> Result<RemediationReport, EngineError> {
        bounds.ensure_ordered()?;
        let state = self.state()?;
        let current = state.bounds();
        let changes = [
            BoundaryChange::begin(current.begin, bounds.begin),
            BoundaryChange::end(current.end, bounds.end),
        ];

        let mut working = self.entries(&EntryFilter::new().statuses([
            EntryStatus::Rough,
            EntryStatus::Validated,
            EntryStatus::Past,
            EntryStatus::Future,
        ]))?;
        let originals = working.clone();
        let mut report = RemediationReport::default();
        let mut applied = current;
        let mut plans = Vec::new();

        for change in changes {
            if change.movement() == BoundaryMove::Unchanged {
                continue;
            }
            applied = change.apply(applied);
            if let Some(stranded) = working
                .iter()
                .find(|e| change.strands(e.status, e.effect_date, &applied))
            {
                return Err(EntryError::ValidatedOutsidePeriod {
                    number: stranded.number,
                    effect_date: stranded.effect_date,
                }
                .into());
            }
            let moves: Vec<(usize, EntryStatus)> = working
                .iter()
                .enumerate()
                .filter_map(|(i, e)| {
                    change
                        .remediate(e.status, e.effect_date, &applied, state.ledger_closing(&e.ledger))
                        .map(|status| (i, status))
                })
                .collect();
            match change.boundary {
                Boundary::Begin => report.begin = moves.len(),
                Boundary::End => report.end = moves.len(),
            }
            for &(i, status) in &moves {
                working[i].status = status;
            }
            plans.push((change, moves));
        }

        if dry_run {
            debug!(begin = report.begin, end = report.end, "Period date change dry run");
            return Ok(report);
        }

        self.unit_of_work(|engine| {
            let mut current = originals;
            for (change, moves) in plans {
                if !moves.is_empty() {
                    engine.publish(&EngineEvent::BulkTransition {
                        operation: BulkOperation::Remediate(change.boundary),
                        count: moves.len(),
                    });
                }
                for (i, status) in moves {
                    engine.transition(&mut current[i], status)?;
                }
            }
            PeriodRepository::new(&mut engine.conn).set_bounds(bounds)?;
            Ok(())
        })?;
        info!(
            begin = report.begin,
            end = report.end,
            "Period dates changed"
        );
        Ok(report)
    }

    /// Renames an account and rewrites every entry referencing it.
    ///
    /// Returns the numbers of the rewritten entries.
    pub fn rename_account(&mut self, old: &str, new: &str) -> Result<Vec<EntryNumber>, EngineError> {
        let renamed = self.unit_of_work(|engine| {
            AccountRepository::new(&mut engine.conn).rename(old, new)?;
            Ok(EntryRepository::new(&mut engine.conn).rename_account(old, new)?)
        })?;
        for number in &renamed {
            self.publish(&EngineEvent::EntryUpdated(*number));
        }
        info!(old, new, entries = renamed.len(), "Account renamed");
        Ok(renamed)
    }

    // ========== Internals shared with the closing workflow ==========

    /// Checks a draft against the chart and computes its placement.
    pub(crate) fn check_draft(&mut self, draft: &EntryDraft, auto_correct: bool) -> Result<Placed, EngineError> {
        draft.check()?;
        let account = AccountRepository::new(&mut self.conn)
            .find(&draft.account)?
            .ok_or_else(|| EntryError::UnknownAccount(draft.account.clone()))?;
        if account.currency != draft.currency {
            return Err(EntryError::CurrencyMismatch {
                account: account.id,
                expected: account.currency,
                found: draft.currency.clone(),
            }
            .into());
        }
        if let Some(template) = &draft.template
            && !TemplateRepository::new(&mut self.conn).exists(template)?
        {
            return Err(EntryError::UnknownTemplate(template.clone()).into());
        }
        let state = self.state()?;
        Ok(draft.place(&state, auto_correct)?)
    }

    /// Stores an already placed draft and books it.
    pub(crate) fn insert_placed(&mut self, draft: EntryDraft, placed: Placed) -> Result<Entry, EngineError> {
        let user = self.default_user();
        let at = self.now();
        let entry = EntryRepository::new(&mut self.conn).insert(draft, placed, &user, at)?;
        self.post(&entry)?;
        self.publish(&EngineEvent::EntryInserted(entry.number));
        Ok(entry)
    }

    /// Moves one entry to `target`, transferring its amount between buckets.
    pub(crate) fn transition(&mut self, entry: &mut Entry, target: EntryStatus) -> Result<(), EngineError> {
        let previous = entry.status;
        if previous == target {
            return Ok(());
        }
        self.unpost(entry)?;
        entry.status = target;
        EntryRepository::new(&mut self.conn).set_status(entry.number, target)?;
        self.post(entry)?;
        self.publish(&EngineEvent::StatusChanged {
            number: entry.number,
            previous,
            new: target,
        });
        Ok(())
    }

    /// Announces and applies a status change to a batch of entries.
    ///
    /// `target` picks each entry's new status; `None` leaves it alone.
    pub(crate) fn bulk_transition(
        &mut self,
        operation: BulkOperation,
        entries: Vec<Entry>,
        target: impl Fn(&Entry) -> Option<EntryStatus>,
    ) -> Result<usize, EngineError> {
        let moves: Vec<(Entry, EntryStatus)> = entries
            .into_iter()
            .filter_map(|e| target(&e).filter(|s| *s != e.status).map(|s| (e, s)))
            .collect();
        if moves.is_empty() {
            return Ok(0);
        }
        let count = moves.len();
        self.publish(&EngineEvent::BulkTransition { operation, count });
        self.unit_of_work(|engine| {
            for (mut entry, status) in moves {
                engine.transition(&mut entry, status)?;
            }
            Ok(())
        })?;
        info!(%operation, count, "Bulk transition applied");
        Ok(count)
    }

    /// Sets a ledger's closing date unless it is already later.
    pub(crate) fn advance_ledger_closing(&mut self, ledger: &str, date: NaiveDate) -> Result<(), EngineError> {
        let mut ledgers = LedgerRepository::new(&mut self.conn);
        let current = ledgers
            .find(ledger)?
            .ok_or_else(|| EntryError::UnknownLedger(ledger.to_string()))?;
        if current.last_closing_date.is_none_or(|closing| closing < date) {
            ledgers.set_closing_date(ledger, date)?;
            debug!(ledger, %date, "Ledger closing date advanced");
        }
        Ok(())
    }

    /// Adds the entry's amount to the aggregates of its status.
    pub(crate) fn post(&mut self, entry: &Entry) -> Result<(), EngineError> {
        self.adjust(entry, entry.amount)
    }

    /// Removes the entry's amount from the aggregates of its status.
    pub(crate) fn unpost(&mut self, entry: &Entry) -> Result<(), EngineError> {
        self.adjust(entry, -entry.amount)
    }

    fn adjust(&mut self, entry: &Entry, delta: DebitCredit) -> Result<(), EngineError> {
        let Some(bucket) = Bucket::of(entry.status) else {
            return Ok(());
        };
        let mut accounts = AccountRepository::new(&mut self.conn);
        let mut account = accounts
            .find(&entry.account)?
            .ok_or_else(|| EntryError::UnknownAccount(entry.account.clone()))?;
        account.balances.add(entry.status, delta);
        accounts.save_balances(&account.id, &account.balances)?;
        if bucket.is_in_period() {
            LedgerRepository::new(&mut self.conn).add_to_totals(&entry.ledger, &entry.currency, delta)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryConnection;
    use carnet_core::fiscal::Ledger;
    use carnet_core::ledger::Account;
    use carnet_shared::AppConfig;
    use chrono::NaiveDateTime;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn clock() -> NaiveDateTime {
        d(2024, 6, 1).and_hms_opt(9, 0, 0).unwrap()
    }

    fn engine() -> Engine<MemoryConnection> {
        let mut engine = Engine::new(MemoryConnection::new(), AppConfig::default()).with_clock(clock);
        engine
            .install_period(PeriodBounds::new(Some(d(2024, 1, 1)), Some(d(2024, 12, 31))))
            .unwrap();
        engine.add_ledger(&Ledger::new("BQ", "Bank")).unwrap();
        engine.add_account(&Account::new("512", "Bank", "EUR")).unwrap();
        engine.add_account(&Account::new("706", "Sales", "EUR")).unwrap();
        engine
    }

    #[test]
    fn test_create_books_balances() {
        let mut engine = engine();
        engine
            .create(EntryDraft::new(d(2024, 5, 2), "512", "BQ", "EUR").debit(dec!(80)), false)
            .unwrap();
        let account = AccountRepository::new(engine.connection_mut())
            .find("512")
            .unwrap()
            .unwrap();
        assert_eq!(account.balances.rough, DebitCredit::new(dec!(80), dec!(0)));
        let totals = LedgerRepository::new(engine.connection_mut())
            .totals_by_currency()
            .unwrap();
        assert_eq!(totals.get("EUR"), DebitCredit::new(dec!(80), dec!(0)));
    }

    #[test]
    fn test_create_rejects_unknown_references() {
        let mut engine = engine();
        let err = engine
            .create(EntryDraft::new(d(2024, 5, 2), "999", "BQ", "EUR").debit(dec!(1)), false)
            .unwrap_err();
        assert_eq!(err, EngineError::Entry(EntryError::UnknownAccount("999".into())));

        let err = engine
            .create(
                EntryDraft::new(d(2024, 5, 2), "512", "BQ", "EUR")
                    .debit(dec!(1))
                    .template("NOPE"),
                false,
            )
            .unwrap_err();
        assert_eq!(err, EngineError::Entry(EntryError::UnknownTemplate("NOPE".into())));
        assert_eq!(engine.current_period().unwrap().counters.last_entry, EntryNumber::new(0));
    }

    #[test]
    fn test_create_and_edit_reject_foreign_currency() {
        let mut engine = engine();
        let err = engine
            .create(EntryDraft::new(d(2024, 5, 2), "512", "BQ", "USD").debit(dec!(100)), false)
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.error_code(), "CURRENCY_MISMATCH");
        assert_eq!(engine.current_period().unwrap().counters.last_entry, EntryNumber::new(0));

        let entry = engine
            .create(EntryDraft::new(d(2024, 5, 2), "512", "BQ", "EUR").debit(dec!(100)), false)
            .unwrap();
        let err = engine
            .edit(
                entry.number,
                EntryDraft {
                    currency: "USD".into(),
                    ..entry.draft()
                },
                false,
            )
            .unwrap_err();
        assert_eq!(err.error_code(), "CURRENCY_MISMATCH");
        assert_eq!(engine.entry(entry.number).unwrap().currency, "EUR");
        engine.check_balances().unwrap();
    }

    #[test]
    fn test_edit_moves_balances() {
        let mut engine = engine();
        let entry = engine
            .create(EntryDraft::new(d(2024, 5, 2), "512", "BQ", "EUR").debit(dec!(80)), false)
            .unwrap();
        let edited = engine
            .edit(entry.number, entry.draft().effect_date(d(2025, 2, 1)), false)
            .unwrap();
        assert_eq!(edited.status, EntryStatus::Future);

        let account = AccountRepository::new(engine.connection_mut())
            .find("512")
            .unwrap()
            .unwrap();
        assert!(account.balances.rough.is_zero());
        assert_eq!(account.balances.future, DebitCredit::new(dec!(80), dec!(0)));
    }

    #[test]
    fn test_delete_then_edit_refused() {
        let mut engine = engine();
        let entry = engine
            .create(EntryDraft::new(d(2024, 5, 2), "512", "BQ", "EUR").debit(dec!(80)), false)
            .unwrap();
        engine.delete(entry.number).unwrap();
        let err = engine.edit(entry.number, entry.draft(), false).unwrap_err();
        assert!(err.is_validation());
        assert!(engine.delete(entry.number).is_err());
    }

    #[test]
    fn test_close_ledger_never_moves_back() {
        let mut engine = engine();
        engine.close_ledger("BQ", d(2024, 6, 30)).unwrap();
        engine.close_ledger("BQ", d(2024, 3, 31)).unwrap();
        let ledger = LedgerRepository::new(engine.connection_mut())
            .find("BQ")
            .unwrap()
            .unwrap();
        assert_eq!(ledger.last_closing_date, Some(d(2024, 6, 30)));
    }

    #[test]
    fn test_rename_account_rewrites_entries() {
        let mut engine = engine();
        let log = engine.events().record();
        engine
            .create(EntryDraft::new(d(2024, 5, 2), "706", "BQ", "EUR").credit(dec!(5)), false)
            .unwrap();
        let renamed = engine.rename_account("706", "7061").unwrap();
        assert_eq!(renamed.len(), 1);
        assert_eq!(engine.entry(renamed[0]).unwrap().account, "7061");
        assert_eq!(
            log.events().last(),
            Some(&EngineEvent::EntryUpdated(renamed[0]))
        );
    }
}
