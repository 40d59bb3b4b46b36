//! Storage-backed bookkeeping engine.
//!
//! [`Engine`] owns the connection, the dossier configuration and the event
//! bus. Every operation that writes more than one row runs inside a unit of
//! work; nested units join the outermost one, so a closing run commits or
//! rolls back as a whole.
//!
//! # Modules
//!
//! - `lifecycle` - Entry creation, edits, status transitions and remediation
//! - `verifier` - Balance scopes and the closing gate check
//! - `tracker` - Concilement groups and settlement numbers
//! - `closing` - The phased period-closing workflow
//! - `interchange` - CSV import and export

pub mod closing;
pub mod error;
pub mod interchange;
pub mod lifecycle;
pub mod tracker;
pub mod verifier;

use chrono::{Local, NaiveDateTime};
use carnet_core::events::{EngineEvent, EventBus};
use carnet_core::fiscal::{FiscalPeriod, Ledger, PeriodBounds, PeriodState};
use carnet_core::ledger::Account;
use carnet_shared::AppConfig;
use tracing::{debug, warn};

pub use closing::{ClosingError, ClosingObserver, ClosingSummary, ClosingWorkflow, SilentObserver};
pub use error::EngineError;
pub use interchange::ImportReport;
pub use lifecycle::RemediationReport;

use crate::connection::{Connection, StorageError};
use crate::repositories::{AccountRepository, LedgerRepository, PeriodRepository, TemplateRepository};

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// The bookkeeping engine.
pub struct Engine<C: Connection> {
    conn: C,
    config: AppConfig,
    events: EventBus,
    clock: fn() -> NaiveDateTime,
    depth: usize,
    atomic: bool,
}

impl<C: Connection> Engine<C> {
    /// Creates an engine over `conn`.
    pub fn new(conn: C, config: AppConfig) -> Self {
        Self {
            conn,
            config,
            events: EventBus::new(),
            clock: local_now,
            depth: 0,
            atomic: false,
        }
    }

    /// Replaces the clock used for creation and settlement stamps.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// The dossier configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The event bus, for subscribing.
    pub fn events(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// The underlying connection.
    pub fn connection(&self) -> &C {
        &self.conn
    }

    /// The underlying connection, mutably.
    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.conn
    }

    /// Consumes the engine and returns its connection.
    pub fn into_connection(self) -> C {
        self.conn
    }

    // ========== Dossier setup ==========

    /// Installs the first fiscal period.
    ///
    /// # Errors
    ///
    /// Returns `InvertedBounds` when `begin` is after `end`.
    pub fn install_period(&mut self, bounds: PeriodBounds) -> Result<(), EngineError> {
        bounds.ensure_ordered()?;
        PeriodRepository::new(&mut self.conn).install(&FiscalPeriod::open(bounds))?;
        Ok(())
    }

    /// Adds an account to the chart.
    pub fn add_account(&mut self, account: &Account) -> Result<(), EngineError> {
        AccountRepository::new(&mut self.conn).insert(account)?;
        Ok(())
    }

    /// Adds a ledger.
    pub fn add_ledger(&mut self, ledger: &Ledger) -> Result<(), EngineError> {
        LedgerRepository::new(&mut self.conn).insert(ledger)?;
        Ok(())
    }

    /// Registers an operation template.
    pub fn add_template(&mut self, id: &str, label: &str) -> Result<(), EngineError> {
        TemplateRepository::new(&mut self.conn).ensure(id, label)?;
        Ok(())
    }

    /// The current period and the ledgers.
    pub fn state(&mut self) -> Result<PeriodState, EngineError> {
        let period = PeriodRepository::new(&mut self.conn).current()?;
        let ledgers = LedgerRepository::new(&mut self.conn).all()?;
        Ok(PeriodState::new(period, ledgers))
    }

    /// The current fiscal period.
    pub fn current_period(&mut self) -> Result<FiscalPeriod, EngineError> {
        Ok(PeriodRepository::new(&mut self.conn).current()?)
    }

    /// Archived fiscal periods, oldest first.
    pub fn archived_periods(&mut self) -> Result<Vec<FiscalPeriod>, EngineError> {
        Ok(PeriodRepository::new(&mut self.conn).archived()?)
    }

    // ========== Plumbing ==========

    pub(crate) fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    pub(crate) fn default_user(&self) -> String {
        self.config.dossier.user.clone()
    }

    pub(crate) fn publish(&mut self, event: &EngineEvent) {
        self.events.publish(event);
    }

    /// Runs `f` inside a unit of work.
    pub(crate) fn unit_of_work<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        self.begin_work()?;
        match f(self) {
            Ok(value) => {
                self.commit_work()?;
                Ok(value)
            }
            Err(err) => {
                self.rollback_work();
                Err(err)
            }
        }
    }

    /// Opens a unit of work, or joins the one in progress.
    pub(crate) fn begin_work(&mut self) -> Result<(), StorageError> {
        if self.depth == 0 {
            self.atomic = self.conn.supports_transactions();
            if self.atomic {
                self.conn.begin()?;
            }
        }
        self.depth += 1;
        Ok(())
    }

    /// Leaves a unit of work, committing when it is the outermost one.
    pub(crate) fn commit_work(&mut self) -> Result<(), StorageError> {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 && self.atomic {
            self.atomic = false;
            self.conn.commit()?;
        }
        Ok(())
    }

    /// Leaves a unit of work, rolling back when it is the outermost one.
    ///
    /// Returns true if storage was actually restored.
    pub(crate) fn rollback_work(&mut self) -> bool {
        self.depth = self.depth.saturating_sub(1);
        if self.depth > 0 || !self.atomic {
            return false;
        }
        self.atomic = false;
        match self.conn.rollback() {
            Ok(()) => {
                debug!("Unit of work rolled back");
                true
            }
            Err(err) => {
                warn!(error = %err, "Rollback failed");
                false
            }
        }
    }

    pub(crate) fn supports_transactions(&self) -> bool {
        self.conn.supports_transactions()
    }
}

impl<C: Connection + std::fmt::Debug> std::fmt::Debug for Engine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("conn", &self.conn)
            .field("events", &self.events)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}
