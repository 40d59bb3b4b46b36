//! Fiscal period and ledger types.

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use carnet_shared::types::{
    BankImportId, BankLineId, ConcilementId, EntryNumber, SettlementNumber,
};

use crate::ledger::EntryError;

/// Begin and end of a period; either may be open-ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodBounds {
    /// First day of the period, `None` for no limit.
    pub begin: Option<NaiveDate>,
    /// Last day of the period, `None` for no limit.
    pub end: Option<NaiveDate>,
}

/// Where a date falls relative to period bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Strictly before `begin`.
    Before,
    /// Between the bounds, inclusive.
    Inside,
    /// Strictly after `end`.
    After,
}

impl PeriodBounds {
    /// Creates bounds.
    #[must_use]
    pub const fn new(begin: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { begin, end }
    }

    /// Bounds with no limit on either side.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            begin: None,
            end: None,
        }
    }

    /// Places `date` relative to the bounds. `begin` is checked first.
    #[must_use]
    pub fn place(&self, date: NaiveDate) -> Placement {
        if self.begin.is_some_and(|begin| date < begin) {
            Placement::Before
        } else if self.end.is_some_and(|end| date > end) {
            Placement::After
        } else {
            Placement::Inside
        }
    }

    /// Returns true if `date` is inside the bounds.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.place(date) == Placement::Inside
    }

    /// Rejects a begin set after the end.
    ///
    /// # Errors
    ///
    /// Returns `InvertedBounds` when both are set and `begin > end`.
    pub fn ensure_ordered(&self) -> Result<(), EntryError> {
        match (self.begin, self.end) {
            (Some(begin), Some(end)) if begin > end => Err(EntryError::InvertedBounds { begin, end }),
            _ => Ok(()),
        }
    }
}

/// Status of a fiscal period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodStatus {
    /// Period is open for entries.
    Open,
    /// Period has been archived.
    Closed,
}

impl PeriodStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open" => Some(Self::Open),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

/// The period's monotonic counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodCounters {
    /// Last assigned entry number.
    pub last_entry: EntryNumber,
    /// Last assigned settlement number.
    pub last_settlement: SettlementNumber,
    /// Last assigned concilement group id.
    pub last_concilement: ConcilementId,
    /// Last assigned bank import id.
    pub last_bank_import: BankImportId,
    /// Last assigned bank statement line id.
    pub last_bank_line: BankLineId,
}

impl Default for PeriodCounters {
    fn default() -> Self {
        Self {
            last_entry: EntryNumber::new(0),
            last_settlement: SettlementNumber::new(0),
            last_concilement: ConcilementId::new(0),
            last_bank_import: BankImportId::new(0),
            last_bank_line: BankLineId::new(0),
        }
    }
}

/// A fiscal period ("exercice").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FiscalPeriod {
    /// Period bounds.
    pub bounds: PeriodBounds,
    /// Open or closed.
    pub status: PeriodStatus,
    /// Monotonic counters.
    pub counters: PeriodCounters,
    /// Last entry number of the period this one was opened from.
    pub previous_last_entry: Option<EntryNumber>,
}

impl FiscalPeriod {
    /// Opens a fresh period with zeroed counters.
    #[must_use]
    pub fn open(bounds: PeriodBounds) -> Self {
        Self {
            bounds,
            status: PeriodStatus::Open,
            counters: PeriodCounters::default(),
            previous_last_entry: None,
        }
    }

    /// Returns true if entries can be written to this period.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == PeriodStatus::Open
    }

    /// Opens the period following this one.
    ///
    /// Counters carry over so numbers stay unique across the surviving history;
    /// the audit field records where this period's numbering stopped.
    #[must_use]
    pub fn successor(&self, bounds: PeriodBounds) -> Self {
        Self {
            bounds,
            status: PeriodStatus::Open,
            counters: self.counters,
            previous_last_entry: Some(self.counters.last_entry),
        }
    }
}

/// A ledger ("journal").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    /// Mnemonic identifier.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Entries dated on or before this date are frozen.
    pub last_closing_date: Option<NaiveDate>,
}

impl Ledger {
    /// Creates a ledger that has never been closed.
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            last_closing_date: None,
        }
    }

    /// Minimal effect date allowed on this ledger within `bounds`.
    #[must_use]
    pub fn minimal_effect_date(&self, bounds: &PeriodBounds) -> Option<NaiveDate> {
        minimal_effect_date(bounds, self.last_closing_date)
    }
}

/// Minimal allowed effect date: `max(begin, closing + 1 day)` over the defined ones.
#[must_use]
pub fn minimal_effect_date(
    bounds: &PeriodBounds,
    ledger_closing: Option<NaiveDate>,
) -> Option<NaiveDate> {
    let after_closing = ledger_closing.and_then(|d| d.checked_add_days(Days::new(1)));
    match (bounds.begin, after_closing) {
        (Some(begin), Some(after)) => Some(begin.max(after)),
        (begin, after) => begin.or(after),
    }
}

/// Context passed to every lifecycle operation: the current period and the ledgers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodState {
    /// The current fiscal period.
    pub period: FiscalPeriod,
    /// Ledgers by identifier.
    pub ledgers: BTreeMap<String, Ledger>,
}

impl PeriodState {
    /// Creates a state from a period and its ledgers.
    #[must_use]
    pub fn new(period: FiscalPeriod, ledgers: impl IntoIterator<Item = Ledger>) -> Self {
        Self {
            period,
            ledgers: ledgers.into_iter().map(|l| (l.id.clone(), l)).collect(),
        }
    }

    /// Current period bounds.
    #[must_use]
    pub fn bounds(&self) -> PeriodBounds {
        self.period.bounds
    }

    /// Looks up a ledger.
    #[must_use]
    pub fn ledger(&self, id: &str) -> Option<&Ledger> {
        self.ledgers.get(id)
    }

    /// Closing date of a ledger, `None` when unknown or never closed.
    #[must_use]
    pub fn ledger_closing(&self, id: &str) -> Option<NaiveDate> {
        self.ledgers.get(id).and_then(|l| l.last_closing_date)
    }
}
