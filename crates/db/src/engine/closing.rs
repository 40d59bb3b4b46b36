//! Period-closing workflow.
//!
//! Closing runs in nine strictly ordered phases. Each phase records a done
//! flag, so the workflow can be driven one phase at a time by a scheduler
//! loop and observed between phases. Phases 2 to 9 run inside one unit of
//! work when the connection supports it; otherwise a failure past the pivot
//! leaves the dossier half closed and the workflow can be resumed from the
//! failing phase.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use thiserror::Error;
use carnet_core::closing::{ClosingPhase, PhaseFlags, plan_solde};
use carnet_core::events::{BulkOperation, EngineEvent};
use carnet_core::fiscal::{Ledger, PeriodBounds, Placed, placement_status};
use carnet_core::ledger::{EntryDraft, EntryStatus};
use carnet_shared::AppError;
use carnet_shared::types::{DebitCredit, SettlementNumber};
use tracing::{info, warn};

use super::{Engine, EngineError};
use crate::connection::{Connection, StorageError, Table};
use crate::repositories::{
    AccountRepository, ConcilementRepository, EntryFilter, EntryRepository, LedgerRepository,
    PeriodRepository,
};

/// Closing workflow failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClosingError {
    /// A phase failed; later phases were not run.
    #[error("Closing stopped at {phase}: {source}")]
    PhaseFailed {
        /// The failing phase.
        phase: ClosingPhase,
        /// The failure.
        source: EngineError,
    },

    /// The next period does not follow the current one.
    #[error("Cannot close: current period ends {end:?}, next period begins {begin:?}")]
    InvalidSuccessor {
        /// Current period end.
        end: Option<NaiveDate>,
        /// Requested next period begin.
        begin: Option<NaiveDate>,
    },

    /// The observer cancelled the workflow before the pivot.
    #[error("Closing cancelled before {0}")]
    Cancelled(ClosingPhase),
}

impl ClosingError {
    /// Returns the stable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::PhaseFailed { source, .. } => source.error_code(),
            Self::InvalidSuccessor { .. } => "INVALID_SUCCESSOR",
            Self::Cancelled(_) => "CLOSING_CANCELLED",
        }
    }

    /// The phase the workflow stopped at.
    #[must_use]
    pub fn phase(&self) -> ClosingPhase {
        match self {
            Self::PhaseFailed { phase, .. } | Self::Cancelled(phase) => *phase,
            Self::InvalidSuccessor { .. } => ClosingPhase::Gate,
        }
    }
}

impl From<ClosingError> for AppError {
    fn from(err: ClosingError) -> Self {
        match err {
            ClosingError::PhaseFailed { phase, source } => match AppError::from(source) {
                Self::Validation(msg) => Self::Validation(format!("{phase}: {msg}")),
                Self::Invariant(msg) => Self::Invariant(format!("{phase}: {msg}")),
                Self::Conflict(msg) => Self::Conflict(format!("{phase}: {msg}")),
                Self::NotFound(msg) => Self::NotFound(format!("{phase}: {msg}")),
                Self::Storage(msg) => Self::Storage(format!("{phase}: {msg}")),
                Self::Configuration(msg) => Self::Configuration(format!("{phase}: {msg}")),
                Self::Internal(msg) => Self::Internal(format!("{phase}: {msg}")),
            },
            ClosingError::InvalidSuccessor { .. } => Self::Validation(err.to_string()),
            ClosingError::Cancelled(_) => Self::Internal(err.to_string()),
        }
    }
}

/// Progress sink and cancellation source polled between phases.
pub trait ClosingObserver {
    /// Called before `phase` runs.
    fn phase_started(&mut self, _phase: ClosingPhase) {}

    /// Called once `phase` is done.
    fn phase_finished(&mut self, _phase: ClosingPhase) {}

    /// Polled before each phase. Honoured only before the pivot.
    fn cancel_requested(&mut self) -> bool {
        false
    }
}

/// Observer that ignores progress and never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentObserver;

impl ClosingObserver for SilentObserver {}

/// What a closing run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClosingSummary {
    /// ROUGH entries validated in phase 2.
    pub validated: usize,
    /// Balancing entries inserted in phase 3.
    pub soldes: usize,
    /// Entries dropped in phase 6.
    pub dropped: usize,
    /// Entries archived to PAST in phase 6.
    pub archived: usize,
    /// Carried-forward entries inserted in phase 7.
    pub forwards: usize,
    /// FUTURE entries migrated in phase 9.
    pub migrated: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingForward {
    draft: EntryDraft,
    settlement: Option<SettlementNumber>,
}

/// The closing workflow for the current period.
#[derive(Debug, Clone)]
pub struct ClosingWorkflow {
    next: PeriodBounds,
    flags: PhaseFlags,
    pending: Vec<PendingForward>,
    closing_balances: BTreeMap<String, DebitCredit>,
    summary: ClosingSummary,
    in_unit: bool,
}

impl ClosingWorkflow {
    /// Prepares a closing that opens a period with bounds `next`.
    #[must_use]
    pub fn new(next: PeriodBounds) -> Self {
        Self {
            next,
            flags: PhaseFlags::default(),
            pending: Vec::new(),
            closing_balances: BTreeMap::new(),
            summary: ClosingSummary::default(),
            in_unit: false,
        }
    }

    /// Completion flags.
    #[must_use]
    pub fn flags(&self) -> &PhaseFlags {
        &self.flags
    }

    /// The phase the next [`step`](Self::step) runs.
    #[must_use]
    pub fn next_phase(&self) -> Option<ClosingPhase> {
        self.flags.next_pending()
    }

    /// Carried-forward entries synthesized but not inserted yet.
    pub fn pending_forwards(&self) -> impl Iterator<Item = (&EntryDraft, Option<SettlementNumber>)> {
        self.pending.iter().map(|p| (&p.draft, p.settlement))
    }

    /// What the run did so far.
    #[must_use]
    pub fn summary(&self) -> ClosingSummary {
        self.summary
    }

    /// Runs every remaining phase.
    ///
    /// # Errors
    ///
    /// Stops at the first failing phase.
    pub fn run<C: Connection>(
        &mut self,
        engine: &mut Engine<C>,
        observer: &mut impl ClosingObserver,
    ) -> Result<ClosingSummary, ClosingError> {
        while self.step(engine, observer)?.is_some() {}
        Ok(self.summary)
    }

    /// Runs the next pending phase and returns it, or `None` once done.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` when the observer cancels before the pivot, or
    /// `PhaseFailed` when the phase fails. Either way the unit of work is
    /// rolled back and, when storage was restored, the workflow starts over.
    pub fn step<C: Connection>(
        &mut self,
        engine: &mut Engine<C>,
        observer: &mut impl ClosingObserver,
    ) -> Result<Option<ClosingPhase>, ClosingError> {
        let Some(phase) = self.flags.next_pending() else {
            return Ok(None);
        };

        if observer.cancel_requested() {
            if self.flags.is_done(ClosingPhase::PIVOT) {
                warn!(%phase, "Cancellation ignored past the pivot");
            } else {
                info!(%phase, "Closing cancelled");
                self.abort(engine);
                return Err(ClosingError::Cancelled(phase));
            }
        }

        if phase == ClosingPhase::ValidateRough && !self.in_unit {
            if !engine.supports_transactions() {
                warn!("Connection has no unit of work; closing is not atomic");
            }
            engine
                .begin_work()
                .map_err(|e| ClosingError::PhaseFailed {
                    phase,
                    source: e.into(),
                })?;
            self.in_unit = true;
        }

        observer.phase_started(phase);
        if let Err(err) = self.run_phase(engine, phase) {
            if let ClosingError::PhaseFailed { source, .. } = &err {
                warn!(%phase, error = %source, "Closing phase failed");
            }
            self.abort(engine);
            return Err(err);
        }
        self.flags.mark(phase);
        observer.phase_finished(phase);
        info!(%phase, "Closing phase done");

        if phase == ClosingPhase::MigrateFuture && self.in_unit {
            self.in_unit = false;
            engine
                .commit_work()
                .map_err(|e| ClosingError::PhaseFailed {
                    phase,
                    source: e.into(),
                })?;
        }
        Ok(Some(phase))
    }

    /// Rolls back the unit of work in progress, if any.
    ///
    /// When storage was restored the workflow starts over from phase 1.
    pub fn abort<C: Connection>(&mut self, engine: &mut Engine<C>) {
        if !self.in_unit {
            return;
        }
        self.in_unit = false;
        if engine.rollback_work() {
            *self = Self::new(self.next);
        }
    }

    fn run_phase<C: Connection>(
        &mut self,
        engine: &mut Engine<C>,
        phase: ClosingPhase,
    ) -> Result<(), ClosingError> {
        let wrap = |source: EngineError| ClosingError::PhaseFailed { phase, source };
        match phase {
            ClosingPhase::Gate => self.gate(engine),
            ClosingPhase::ValidateRough => self.validate_rough(engine).map_err(wrap),
            ClosingPhase::SoldeAccounts => self.solde_accounts(engine).map_err(wrap),
            ClosingPhase::CloseLedgers => self.close_ledgers(engine).map_err(wrap),
            ClosingPhase::ArchivePeriod => self.archive_period(engine).map_err(wrap),
            ClosingPhase::Cleanup => self.cleanup(engine).map_err(wrap),
            ClosingPhase::InsertForwards => self.insert_forwards(engine).map_err(wrap),
            ClosingPhase::SeedOpening => self.seed_opening(engine).map_err(wrap),
            ClosingPhase::MigrateFuture => self.migrate_future(engine).map_err(wrap),
        }
    }

    /// Period end and next begin, both required to close.
    fn dates<C: Connection>(&self, engine: &mut Engine<C>) -> Result<(NaiveDate, NaiveDate), ClosingError> {
        let bounds = engine
            .current_period()
            .map_err(|source| ClosingError::PhaseFailed {
                phase: ClosingPhase::Gate,
                source,
            })?
            .bounds;
        match (bounds.end, self.next.begin) {
            (Some(end), Some(begin)) if begin > end => Ok((end, begin)),
            (end, begin) => Err(ClosingError::InvalidSuccessor { end, begin }),
        }
    }

    // ========== Phases ==========

    fn gate<C: Connection>(&mut self, engine: &mut Engine<C>) -> Result<(), ClosingError> {
        self.dates(engine)?;
        let failed = |source: EngineError| ClosingError::PhaseFailed {
            phase: ClosingPhase::Gate,
            source,
        };
        self.next.ensure_ordered().map_err(|e| failed(e.into()))?;
        engine.check_balances().map_err(failed)
    }

    fn period_end<C: Connection>(engine: &mut Engine<C>) -> Result<NaiveDate, EngineError> {
        let period = engine.current_period()?;
        period.bounds.end.ok_or_else(|| {
            StorageError::MissingRow {
                table: Table::Periods,
                what: "period end".to_string(),
            }
            .into()
        })
    }

    fn validate_rough<C: Connection>(&mut self, engine: &mut Engine<C>) -> Result<(), EngineError> {
        let end = Self::period_end(engine)?;
        let ledgers = LedgerRepository::new(&mut engine.conn).all()?;
        for ledger in ledgers {
            self.summary.validated += engine.validate_ledger_up_to(&ledger.id, end)?;
        }
        Ok(())
    }

    /// Books the soldes of every account with a validated balance.
    ///
    /// Re-running the phase after a partial failure completes the accounts
    /// already handled instead of booking them twice: the balance to close is
    /// the one recorded on the first pass, and an existing solde at period end
    /// is reused.
    fn solde_accounts<C: Connection>(&mut self, engine: &mut Engine<C>) -> Result<(), EngineError> {
        let end = Self::period_end(engine)?;
        let next_begin = self.next.begin.unwrap_or(end);
        let config = engine.config.clone();
        let user = engine.default_user();
        let solde_template = &config.closing.closing_template.id;

        for template in [&config.closing.closing_template, &config.closing.forward_template] {
            let mut ledgers = LedgerRepository::new(&mut engine.conn);
            if ledgers.find(&template.ledger)?.is_none() {
                ledgers.insert(&Ledger::new(&template.ledger, &template.label))?;
            }
            engine.add_template(&template.id, &template.label)?;
        }

        let accounts = AccountRepository::new(&mut engine.conn).all()?;
        for mut account in accounts {
            account.balances.validated = *self
                .closing_balances
                .entry(account.id.clone())
                .or_insert(account.balances.validated);
            let tolerance = config.balance.tolerance_for(&account.currency);
            let Some(plan) = plan_solde(&account, &config.closing, end, next_begin, tolerance) else {
                continue;
            };

            let booked = engine
                .entries(&Self::soldes_at(solde_template, end).account(&account.id))?
                .into_iter()
                .next();
            let solde = match booked {
                Some(solde) => solde,
                None => engine.insert_placed(
                    plan.closing,
                    Placed {
                        status: EntryStatus::Validated,
                        effect_date: end,
                    },
                )?,
            };
            let settlement = match (&solde.settlement, plan.settle) {
                (Some(stamp), _) => Some(stamp.number),
                (None, true) => {
                    let number = engine.allocate_settlement_number()?;
                    engine.settle(&[solde.number], number, &user)?;
                    Some(number)
                }
                (None, false) => None,
            };
            if plan.reconcile && !solde.is_reconciled() {
                engine.reconcile_entries(&[solde.number], end, &user)?;
            }
            if let Some(draft) = plan.forward
                && !self.pending.iter().any(|p| p.draft.account == account.id)
            {
                self.pending.push(PendingForward { draft, settlement });
            }
        }
        self.summary.soldes = engine.entries(&Self::soldes_at(solde_template, end))?.len();
        Ok(())
    }

    /// Validated soldes booked at `end`.
    fn soldes_at(template: &str, end: NaiveDate) -> EntryFilter {
        EntryFilter::new()
            .template(template)
            .status(EntryStatus::Validated)
            .effect_from(end)
            .effect_to(end)
    }

    fn close_ledgers<C: Connection>(&mut self, engine: &mut Engine<C>) -> Result<(), EngineError> {
        let end = Self::period_end(engine)?;
        let ledgers = LedgerRepository::new(&mut engine.conn).all()?;
        for ledger in ledgers {
            engine.advance_ledger_closing(&ledger.id, end)?;
        }
        Ok(())
    }

    fn archive_period<C: Connection>(&mut self, engine: &mut Engine<C>) -> Result<(), EngineError> {
        let mut periods = PeriodRepository::new(&mut engine.conn);
        let successor = periods.current()?.successor(self.next);
        let archived = periods.archive(&successor)?;
        info!(
            begin = ?archived.bounds.begin,
            end = ?archived.bounds.end,
            last_entry = %archived.counters.last_entry,
            "Period archived"
        );
        Ok(())
    }

    fn cleanup<C: Connection>(&mut self, engine: &mut Engine<C>) -> Result<(), EngineError> {
        let flags: BTreeMap<String, (bool, bool)> = AccountRepository::new(&mut engine.conn)
            .all()?
            .into_iter()
            .map(|a| (a.id, (a.settleable, a.reconciliable)))
            .collect();
        let entries = engine.entries(&EntryFilter::new())?;

        let (dropped, kept): (Vec<_>, Vec<_>) = entries.into_iter().partition(|entry| {
            let (settleable, reconciliable) = flags.get(&entry.account).copied().unwrap_or_default();
            entry.status == EntryStatus::Deleted
                || (entry.status != EntryStatus::Future
                    && (entry.is_settled() || !settleable)
                    && (entry.is_reconciled() || !reconciliable))
        });

        let numbers: Vec<i64> = dropped.iter().map(|e| e.number.value()).collect();
        let mut groups = ConcilementRepository::new(&mut engine.conn);
        groups.remove_entries(&numbers)?;
        groups.delete_empty()?;
        let deleted = EntryRepository::new(&mut engine.conn)
            .delete_where(&EntryFilter::new().numbers(dropped.iter().map(|e| e.number)))?;
        self.summary.dropped = deleted;

        let mut accounts = AccountRepository::new(&mut engine.conn);
        for mut account in accounts.all()? {
            account.balances.reset_running();
            accounts.save_balances(&account.id, &account.balances)?;
        }
        LedgerRepository::new(&mut engine.conn).reset_totals()?;

        let mut archived = 0;
        let to_archive: Vec<_> = kept
            .into_iter()
            .filter(|e| !matches!(e.status, EntryStatus::Future | EntryStatus::Past))
            .collect();
        if !to_archive.is_empty() {
            engine.publish(&EngineEvent::BulkTransition {
                operation: BulkOperation::Archive,
                count: to_archive.len(),
            });
        }
        for entry in to_archive {
            // Running balances are already reset, so no bucket transfer.
            EntryRepository::new(&mut engine.conn).set_status(entry.number, EntryStatus::Past)?;
            engine.publish(&EngineEvent::StatusChanged {
                number: entry.number,
                previous: entry.status,
                new: EntryStatus::Past,
            });
            archived += 1;
        }
        self.summary.archived = archived;
        info!(dropped = deleted, archived, "Closed period cleaned up");
        Ok(())
    }

    /// Inserts the pending forwards, reusing one already booked by an
    /// interrupted run.
    fn insert_forwards<C: Connection>(&mut self, engine: &mut Engine<C>) -> Result<(), EngineError> {
        let user = engine.default_user();
        let template = engine.config.closing.forward_template.id.clone();
        while let Some(pending) = self.pending.first() {
            let booked = engine
                .entries(
                    &EntryFilter::new()
                        .template(&template)
                        .account(&pending.draft.account)
                        .effect_from(pending.draft.effect_date),
                )?
                .into_iter()
                .next();
            let number = match booked {
                Some(entry) => entry.number,
                None => engine.create(pending.draft.clone(), true)?.number,
            };
            if let Some(settlement) = pending.settlement {
                engine.settle(&[number], settlement, &user)?;
            }
            self.pending.remove(0);
            self.summary.forwards += 1;
        }
        Ok(())
    }

    fn seed_opening<C: Connection>(&mut self, engine: &mut Engine<C>) -> Result<(), EngineError> {
        let mut accounts = AccountRepository::new(&mut engine.conn);
        for mut account in accounts.all()? {
            account.balances.opening = self
                .closing_balances
                .get(&account.id)
                .copied()
                .unwrap_or_default();
            accounts.save_balances(&account.id, &account.balances)?;
        }
        Ok(())
    }

    fn migrate_future<C: Connection>(&mut self, engine: &mut Engine<C>) -> Result<(), EngineError> {
        let state = engine.state()?;
        let future = engine.entries(&EntryFilter::new().status(EntryStatus::Future))?;
        self.summary.migrated = engine.bulk_transition(BulkOperation::Migrate, future, |entry| {
            Some(placement_status(
                entry.effect_date,
                &state.bounds(),
                state.ledger_closing(&entry.ledger),
            ))
        })?;
        Ok(())
    }
}
