//! Entry repository: filtered queries and writes over entry rows.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use carnet_core::fiscal::Placed;
use carnet_core::ledger::{Entry, EntryDraft, EntryStatus, Reconciliation, SettlementStamp};
use carnet_core::reconcile::MemberKind;
use carnet_shared::types::{ConcilementId, EntryNumber, SettlementNumber};

use super::period::PeriodRepository;
use crate::connection::{Connection, Fields, OrderBy, Predicate, StorageError, Table};
use crate::mapping::{
    entry_fields, entry_from_row, group_from_row, member_from_row, settlement_fields,
};

/// Result ordering of [`EntryRepository::load`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EntryOrder {
    /// Operation date, effect date, number.
    #[default]
    Chronological,
    /// Account first, then chronological.
    ByAccount,
    /// Ledger first, then chronological.
    ByLedger,
}

impl EntryOrder {
    fn keys(self) -> Vec<OrderBy> {
        let mut keys = match self {
            Self::Chronological => Vec::new(),
            Self::ByAccount => vec![OrderBy::text("account")],
            Self::ByLedger => vec![OrderBy::text("ledger")],
        };
        keys.extend([
            OrderBy::text("operation_date"),
            OrderBy::text("effect_date"),
            OrderBy::number("number"),
        ]);
        keys
    }
}

/// Single-column lookups for [`EntryRepository::count_matching`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryField {
    /// Account identifier.
    Account,
    /// Ledger identifier.
    Ledger,
    /// Currency code.
    Currency,
    /// Operation template identifier.
    Template,
    /// Settlement number.
    Settlement,
}

impl EntryField {
    const fn column(self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::Ledger => "ledger",
            Self::Currency => "currency",
            Self::Template => "template",
            Self::Settlement => "settlement_number",
        }
    }
}

/// Conjunctive entry filter. An empty filter matches every entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    account: Option<String>,
    ledger: Option<String>,
    currency: Option<String>,
    template: Option<String>,
    statuses: Vec<EntryStatus>,
    effect_from: Option<NaiveDate>,
    effect_to: Option<NaiveDate>,
    settlement: Option<SettlementNumber>,
    numbers: Option<Vec<EntryNumber>>,
    order: EntryOrder,
}

impl EntryFilter {
    /// Matches every entry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to one account.
    #[must_use]
    pub fn account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    /// Restricts to one ledger.
    #[must_use]
    pub fn ledger(mut self, ledger: impl Into<String>) -> Self {
        self.ledger = Some(ledger.into());
        self
    }

    /// Restricts to one currency.
    #[must_use]
    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    /// Restricts to one operation template.
    #[must_use]
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Restricts to one status.
    #[must_use]
    pub fn status(mut self, status: EntryStatus) -> Self {
        self.statuses = vec![status];
        self
    }

    /// Restricts to several statuses.
    #[must_use]
    pub fn statuses(mut self, statuses: impl IntoIterator<Item = EntryStatus>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    /// Effect date on or after `date`.
    #[must_use]
    pub fn effect_from(mut self, date: NaiveDate) -> Self {
        self.effect_from = Some(date);
        self
    }

    /// Effect date on or before `date`.
    #[must_use]
    pub fn effect_to(mut self, date: NaiveDate) -> Self {
        self.effect_to = Some(date);
        self
    }

    /// Restricts to one settlement group.
    #[must_use]
    pub fn settlement(mut self, number: SettlementNumber) -> Self {
        self.settlement = Some(number);
        self
    }

    /// Restricts to the given entry numbers.
    #[must_use]
    pub fn numbers(mut self, numbers: impl IntoIterator<Item = EntryNumber>) -> Self {
        self.numbers = Some(numbers.into_iter().collect());
        self
    }

    /// Sets the result ordering.
    #[must_use]
    pub fn order(mut self, order: EntryOrder) -> Self {
        self.order = order;
        self
    }

    fn predicate(&self) -> Predicate {
        let mut predicate = Predicate::All;
        let columns = [
            ("account", &self.account),
            ("ledger", &self.ledger),
            ("currency", &self.currency),
            ("template", &self.template),
        ];
        for (column, value) in columns {
            if let Some(value) = value {
                predicate = predicate.and(Predicate::equals(column, value));
            }
        }
        if !self.statuses.is_empty() {
            predicate = predicate.and(Predicate::In(
                "status",
                self.statuses.iter().map(ToString::to_string).collect(),
            ));
        }
        if self.effect_from.is_some() || self.effect_to.is_some() {
            predicate = predicate.and(Predicate::DateBetween(
                "effect_date",
                self.effect_from.map(|d| d.to_string()),
                self.effect_to.map(|d| d.to_string()),
            ));
        }
        if let Some(number) = self.settlement {
            predicate = predicate.and(Predicate::equals("settlement_number", number));
        }
        if let Some(numbers) = &self.numbers {
            predicate = predicate.and(Predicate::In(
                "number",
                numbers.iter().map(ToString::to_string).collect(),
            ));
        }
        predicate
    }
}

fn by_number(number: EntryNumber) -> Predicate {
    Predicate::equals("number", number)
}

/// Entry repository.
#[derive(Debug)]
pub struct EntryRepository<'a, C: Connection + ?Sized> {
    conn: &'a mut C,
}

impl<'a, C: Connection + ?Sized> EntryRepository<'a, C> {
    /// Creates a repository over `conn`.
    pub fn new(conn: &'a mut C) -> Self {
        Self { conn }
    }

    /// Entries matching `filter`, with their reconciliation linkage.
    pub fn load(&self, filter: &EntryFilter) -> Result<Vec<Entry>, StorageError> {
        let rows = self
            .conn
            .select(Table::Entries, &filter.predicate(), &filter.order.keys())?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let mut linkage = self.linkage()?;
        rows.iter()
            .map(|row| {
                let mut entry = entry_from_row(row)?;
                entry.reconciliation = linkage.remove(&entry.number.value());
                Ok(entry)
            })
            .collect()
    }

    /// Finds an entry by number.
    pub fn find(&self, number: EntryNumber) -> Result<Option<Entry>, StorageError> {
        Ok(self
            .load(&EntryFilter::new().numbers([number]))?
            .into_iter()
            .next())
    }

    /// Numbers the draft from the period counter and stores it.
    ///
    /// Consumes exactly one unit of the entry counter.
    pub fn insert(
        &mut self,
        draft: EntryDraft,
        placed: Placed,
        user: &str,
        at: NaiveDateTime,
    ) -> Result<Entry, StorageError> {
        let number = PeriodRepository::new(&mut *self.conn).next_entry_number()?;
        let entry = draft.into_entry(number, placed, user, at);
        self.conn.insert(Table::Entries, entry_fields(&entry))?;
        Ok(entry)
    }

    /// Overwrites every stored field of `entry`.
    pub fn update(&mut self, entry: &Entry) -> Result<(), StorageError> {
        self.update_one(entry.number, entry_fields(entry))
    }

    /// Sets the status of one entry.
    pub fn set_status(&mut self, number: EntryNumber, status: EntryStatus) -> Result<(), StorageError> {
        self.update_one(number, Fields::new().set("status", status))
    }

    /// Sets or clears the settlement stamp of one entry.
    pub fn set_settlement(
        &mut self,
        number: EntryNumber,
        stamp: Option<&SettlementStamp>,
    ) -> Result<(), StorageError> {
        self.update_one(number, settlement_fields(stamp))
    }

    /// Number of entries whose `field` equals `value`.
    pub fn count_matching(&self, field: EntryField, value: &str) -> Result<usize, StorageError> {
        Ok(self
            .conn
            .select(Table::Entries, &Predicate::equals(field.column(), value), &[])?
            .len())
    }

    /// Physically deletes the entries matching `filter`; returns how many.
    pub fn delete_where(&mut self, filter: &EntryFilter) -> Result<usize, StorageError> {
        self.conn.delete(Table::Entries, &filter.predicate())
    }

    /// Rewrites the account of every entry booked on `old`.
    ///
    /// Returns the numbers of the rewritten entries.
    pub fn rename_account(&mut self, old: &str, new: &str) -> Result<Vec<EntryNumber>, StorageError> {
        let numbers = self
            .load(&EntryFilter::new().account(old))?
            .into_iter()
            .map(|e| e.number)
            .collect::<Vec<_>>();
        for number in &numbers {
            self.update_one(*number, Fields::new().set("account", new))?;
        }
        Ok(numbers)
    }

    fn update_one(&mut self, number: EntryNumber, fields: Fields) -> Result<(), StorageError> {
        if self.conn.update(Table::Entries, fields, &by_number(number))? == 0 {
            return Err(StorageError::MissingRow {
                table: Table::Entries,
                what: format!("entry {number}"),
            });
        }
        Ok(())
    }

    fn linkage(&self) -> Result<BTreeMap<i64, Reconciliation>, StorageError> {
        let groups = self
            .conn
            .select(Table::ConcilementGroups, &Predicate::All, &[])?
            .iter()
            .map(|row| group_from_row(row).map(|g| (g.id, g)))
            .collect::<Result<BTreeMap<ConcilementId, _>, _>>()?;
        let mut linkage = BTreeMap::new();
        for row in self.conn.select(
            Table::ConcilementMembers,
            &Predicate::equals("kind", MemberKind::Entry.as_str()),
            &[],
        )? {
            let (group_id, member) = member_from_row(&row)?;
            if let Some(group) = groups.get(&group_id) {
                linkage.insert(
                    member.id,
                    Reconciliation {
                        group: group.id,
                        value_date: group.value_date,
                        user: group.user.clone(),
                        at: group.at,
                    },
                );
            }
        }
        Ok(linkage)
    }
}
