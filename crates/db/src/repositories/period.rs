//! Fiscal period repository.
//!
//! Exactly one row is flagged current; archived periods are frozen copies kept
//! in archive order.

use carnet_core::fiscal::{FiscalPeriod, PeriodBounds, PeriodStatus};
use carnet_shared::types::{BankImportId, BankLineId, ConcilementId, EntryNumber, SettlementNumber};
use tracing::debug;

use crate::connection::{Connection, Fields, OrderBy, Predicate, StorageError, Table};
use crate::mapping::{period_fields, period_from_row};

/// One of the period's monotonic counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// Entry numbers.
    Entry,
    /// Settlement numbers.
    Settlement,
    /// Concilement group ids.
    Concilement,
    /// Bank import ids.
    BankImport,
    /// Bank statement line ids.
    BankLine,
}

impl Counter {
    const fn column(self) -> &'static str {
        match self {
            Self::Entry => "last_entry",
            Self::Settlement => "last_settlement",
            Self::Concilement => "last_concilement",
            Self::BankImport => "last_bank_import",
            Self::BankLine => "last_bank_line",
        }
    }
}

fn current() -> Predicate {
    Predicate::equals("current", "1")
}

/// Fiscal period repository.
#[derive(Debug)]
pub struct PeriodRepository<'a, C: Connection + ?Sized> {
    conn: &'a mut C,
}

impl<'a, C: Connection + ?Sized> PeriodRepository<'a, C> {
    /// Creates a repository over `conn`.
    pub fn new(conn: &'a mut C) -> Self {
        Self { conn }
    }

    /// The current period.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::MissingRow` when no period is current.
    pub fn current(&self) -> Result<FiscalPeriod, StorageError> {
        let rows = self.conn.select(Table::Periods, &current(), &[])?;
        let row = rows.first().ok_or_else(|| StorageError::MissingRow {
            table: Table::Periods,
            what: "current period".to_string(),
        })?;
        period_from_row(row)
    }

    /// Archived periods, oldest first.
    pub fn archived(&self) -> Result<Vec<FiscalPeriod>, StorageError> {
        self.conn
            .select(
                Table::Periods,
                &Predicate::equals("current", "0"),
                &[OrderBy::number("seq")],
            )?
            .iter()
            .map(period_from_row)
            .collect()
    }

    /// Installs `period` as the current one, when none is.
    pub fn install(&mut self, period: &FiscalPeriod) -> Result<(), StorageError> {
        if !self.conn.select(Table::Periods, &current(), &[])?.is_empty() {
            return Err(StorageError::Duplicate {
                table: Table::Periods,
                key: "current".to_string(),
            });
        }
        let fields = period_fields(period).set("current", "1").set("seq", 0);
        self.conn.insert(Table::Periods, fields)
    }

    /// Overwrites the current period.
    pub fn save(&mut self, period: &FiscalPeriod) -> Result<(), StorageError> {
        let updated = self
            .conn
            .update(Table::Periods, period_fields(period), &current())?;
        if updated == 0 {
            return Err(StorageError::MissingRow {
                table: Table::Periods,
                what: "current period".to_string(),
            });
        }
        Ok(())
    }

    /// Changes the current period's bounds.
    pub fn set_bounds(&mut self, bounds: PeriodBounds) -> Result<(), StorageError> {
        self.conn.update(
            Table::Periods,
            Fields::new()
                .set_opt("begin", bounds.begin)
                .set_opt("end", bounds.end),
            &current(),
        )?;
        Ok(())
    }

    /// Closes and archives the current period, then makes `successor` current.
    ///
    /// Returns the archived copy.
    pub fn archive(&mut self, successor: &FiscalPeriod) -> Result<FiscalPeriod, StorageError> {
        let mut closed = self.current()?;
        closed.status = PeriodStatus::Closed;
        let seq = self.archived()?.len() + 1;

        self.conn.update(
            Table::Periods,
            period_fields(&closed).set("current", "0").set("seq", seq),
            &current(),
        )?;
        self.conn.insert(
            Table::Periods,
            period_fields(successor).set("current", "1").set("seq", 0),
        )?;
        debug!(seq, "Period archived");
        Ok(closed)
    }

    /// Consumes one unit of `counter` and returns it.
    pub fn allocate(&mut self, counter: Counter) -> Result<i64, StorageError> {
        let period = self.current()?;
        let c = period.counters;
        let next = match counter {
            Counter::Entry => c.last_entry.next().value(),
            Counter::Settlement => c.last_settlement.next().value(),
            Counter::Concilement => c.last_concilement.next().value(),
            Counter::BankImport => c.last_bank_import.next().value(),
            Counter::BankLine => c.last_bank_line.next().value(),
        };
        self.conn.update(
            Table::Periods,
            Fields::new().set(counter.column(), next),
            &current(),
        )?;
        Ok(next)
    }

    /// Next entry number.
    pub fn next_entry_number(&mut self) -> Result<EntryNumber, StorageError> {
        self.allocate(Counter::Entry).map(EntryNumber::new)
    }

    /// Next settlement number.
    pub fn next_settlement_number(&mut self) -> Result<SettlementNumber, StorageError> {
        self.allocate(Counter::Settlement).map(SettlementNumber::new)
    }

    /// Next concilement group id.
    pub fn next_concilement_id(&mut self) -> Result<ConcilementId, StorageError> {
        self.allocate(Counter::Concilement).map(ConcilementId::new)
    }

    /// Next bank import id.
    pub fn next_bank_import_id(&mut self) -> Result<BankImportId, StorageError> {
        self.allocate(Counter::BankImport).map(BankImportId::new)
    }

    /// Next bank statement line id.
    pub fn next_bank_line_id(&mut self) -> Result<BankLineId, StorageError> {
        self.allocate(Counter::BankLine).map(BankLineId::new)
    }
}
