//! Reconciliation and settlement tracker.

use chrono::NaiveDate;
use carnet_core::events::EngineEvent;
use carnet_core::ledger::{Entry, EntryStatus, SettlementStamp};
use carnet_core::reconcile::{ConcilementGroup, MemberRef, TrackerError};
use carnet_shared::types::{BankImportId, BankLineId, ConcilementId, EntryNumber, SettlementNumber};
use tracing::{debug, info};

use super::{Engine, EngineError};
use crate::connection::Connection;
use crate::repositories::{
    AccountRepository, ConcilementRepository, EntryFilter, EntryRepository, PeriodRepository,
};

impl<C: Connection> Engine<C> {
    // ========== Concilement ==========

    /// Creates an empty concilement group.
    pub fn create_group(&mut self, value_date: NaiveDate, user: &str) -> Result<ConcilementId, EngineError> {
        let at = self.now();
        self.unit_of_work(|engine| {
            let id = PeriodRepository::new(&mut engine.conn).next_concilement_id()?;
            ConcilementRepository::new(&mut engine.conn)
                .insert(&ConcilementGroup::new(id, value_date, user, at))?;
            debug!(group = %id, %value_date, "Concilement group created");
            Ok(id)
        })
    }

    /// Adds a member to a group.
    ///
    /// Adding a member already in the same group is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyReconciled` when the member is in another group, or a
    /// tracker error when an entry member is deleted or not on a
    /// reconciliable account.
    pub fn add_member(&mut self, group: ConcilementId, member: MemberRef) -> Result<(), EngineError> {
        if ConcilementRepository::new(&mut self.conn).find(group)?.is_none() {
            return Err(TrackerError::GroupNotFound(group).into());
        }
        if let Some(number) = member.as_entry() {
            let entry = self.tracked_entry(number)?;
            let account = AccountRepository::new(&mut self.conn).find(&entry.account)?;
            if !account.is_some_and(|a| a.reconciliable) {
                return Err(TrackerError::NotReconciliable {
                    entry: number,
                    account: entry.account,
                }
                .into());
            }
        }

        let mut repo = ConcilementRepository::new(&mut self.conn);
        match repo.group_of(member)? {
            Some(existing) if existing == group => return Ok(()),
            Some(existing) => {
                return Err(TrackerError::AlreadyReconciled {
                    member,
                    group: existing,
                }
                .into());
            }
            None => repo.add_member(group, member)?,
        }
        if let Some(number) = member.as_entry() {
            self.publish(&EngineEvent::ReconciliationChanged {
                number,
                group: Some(group),
            });
        }
        Ok(())
    }

    /// The group holding `member`, if any.
    pub fn get_group_for(&mut self, member: MemberRef) -> Result<Option<ConcilementGroup>, EngineError> {
        let mut repo = ConcilementRepository::new(&mut self.conn);
        match repo.group_of(member)? {
            Some(id) => Ok(repo.find(id)?),
            None => Ok(None),
        }
    }

    /// Reconciles `entries` together in a fresh group.
    pub fn reconcile_entries(
        &mut self,
        entries: &[EntryNumber],
        value_date: NaiveDate,
        user: &str,
    ) -> Result<ConcilementId, EngineError> {
        let group = self.unit_of_work(|engine| {
            let group = engine.create_group(value_date, user)?;
            for number in entries {
                engine.add_member(group, MemberRef::entry(*number))?;
            }
            Ok(group)
        })?;
        info!(%group, entries = entries.len(), "Entries reconciled");
        Ok(group)
    }

    /// Removes `member` from its group; the group is dropped once empty.
    ///
    /// # Errors
    ///
    /// Returns `NotReconciled` when the member is in no group.
    pub fn unreconcile(&mut self, member: MemberRef) -> Result<(), EngineError> {
        self.unit_of_work(|engine| {
            let mut repo = ConcilementRepository::new(&mut engine.conn);
            if !repo.remove_member(member)? {
                return Err(TrackerError::NotReconciled(member).into());
            }
            repo.delete_empty()?;
            Ok(())
        })?;
        if let Some(number) = member.as_entry() {
            self.publish(&EngineEvent::ReconciliationChanged { number, group: None });
        }
        Ok(())
    }

    /// Next bank import id, for statement importers.
    pub fn next_bank_import_id(&mut self) -> Result<BankImportId, EngineError> {
        Ok(PeriodRepository::new(&mut self.conn).next_bank_import_id()?)
    }

    /// Next bank statement line id, for statement importers.
    pub fn next_bank_line_id(&mut self) -> Result<BankLineId, EngineError> {
        Ok(PeriodRepository::new(&mut self.conn).next_bank_line_id()?)
    }

    // ========== Settlement ==========

    /// Consumes the next settlement number.
    pub fn allocate_settlement_number(&mut self) -> Result<SettlementNumber, EngineError> {
        Ok(PeriodRepository::new(&mut self.conn).next_settlement_number()?)
    }

    /// Stamps `number` on every entry of `entries`.
    ///
    /// Every entry is checked before any is stamped.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateSettlement` when an entry carries another number, or
    /// a tracker error for a deleted entry or one on a non-settleable account.
    pub fn settle(
        &mut self,
        entries: &[EntryNumber],
        number: SettlementNumber,
        user: &str,
    ) -> Result<(), EngineError> {
        if entries.is_empty() {
            return Err(TrackerError::EmptySettlement.into());
        }
        for entry_number in entries {
            let entry = self.tracked_entry(*entry_number)?;
            let account = AccountRepository::new(&mut self.conn).find(&entry.account)?;
            if !account.is_some_and(|a| a.settleable) {
                return Err(TrackerError::NotSettleable {
                    entry: entry.number,
                    account: entry.account,
                }
                .into());
            }
            if let Some(stamp) = entry.settlement.filter(|s| s.number != number) {
                return Err(TrackerError::DuplicateSettlement {
                    entry: entry.number,
                    existing: stamp.number,
                }
                .into());
            }
        }

        let stamp = SettlementStamp {
            number,
            user: user.to_string(),
            at: self.now(),
        };
        self.unit_of_work(|engine| {
            let mut repo = EntryRepository::new(&mut engine.conn);
            for entry_number in entries {
                repo.set_settlement(*entry_number, Some(&stamp))?;
            }
            Ok(())
        })?;
        for entry_number in entries {
            self.publish(&EngineEvent::SettlementChanged {
                number: *entry_number,
                settlement: Some(number),
            });
        }
        info!(settlement = %number, entries = entries.len(), "Entries settled");
        Ok(())
    }

    /// Clears the settlement stamp of every entry sharing `number`.
    ///
    /// Returns the number of entries cleared.
    pub fn unsettle(&mut self, number: SettlementNumber) -> Result<usize, EngineError> {
        let members = self.entries(&EntryFilter::new().settlement(number))?;
        self.unit_of_work(|engine| {
            let mut repo = EntryRepository::new(&mut engine.conn);
            for entry in &members {
                repo.set_settlement(entry.number, None)?;
            }
            Ok(())
        })?;
        for entry in &members {
            self.publish(&EngineEvent::SettlementChanged {
                number: entry.number,
                settlement: None,
            });
        }
        info!(settlement = %number, entries = members.len(), "Settlement cleared");
        Ok(members.len())
    }

    fn tracked_entry(&mut self, number: EntryNumber) -> Result<Entry, EngineError> {
        let entry = EntryRepository::new(&mut self.conn)
            .find(number)?
            .ok_or(TrackerError::EntryNotFound(number))?;
        if entry.status == EntryStatus::Deleted {
            return Err(TrackerError::DeletedEntry(number).into());
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryConnection;
    use carnet_core::fiscal::{Ledger, PeriodBounds};
    use carnet_core::ledger::{Account, EntryDraft};
    use carnet_shared::AppConfig;
    use rust_decimal_macros::dec;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn engine() -> Engine<MemoryConnection> {
        let mut engine = Engine::new(MemoryConnection::new(), AppConfig::default());
        engine
            .install_period(PeriodBounds::new(Some(d(1, 1)), Some(d(12, 31))))
            .unwrap();
        engine.add_ledger(&Ledger::new("BQ", "Bank")).unwrap();
        engine
            .add_account(&Account::new("512", "Bank", "EUR").reconciliable())
            .unwrap();
        engine
            .add_account(&Account::new("411", "Customers", "EUR").settleable())
            .unwrap();
        engine
    }

    fn book(engine: &mut Engine<MemoryConnection>, account: &str) -> EntryNumber {
        engine
            .create(EntryDraft::new(d(4, 1), account, "BQ", "EUR").debit(dec!(10)), false)
            .unwrap()
            .number
    }

    #[test]
    fn test_member_cannot_join_two_groups() {
        let mut engine = engine();
        let entry = book(&mut engine, "512");
        let first = engine.reconcile_entries(&[entry], d(4, 2), "admin").unwrap();
        let second = engine.create_group(d(4, 3), "admin").unwrap();

        engine.add_member(first, MemberRef::entry(entry)).unwrap();
        let err = engine.add_member(second, MemberRef::entry(entry)).unwrap_err();
        assert_eq!(
            err,
            EngineError::Tracker(TrackerError::AlreadyReconciled {
                member: MemberRef::entry(entry),
                group: first,
            })
        );
        let group = engine.get_group_for(MemberRef::entry(entry)).unwrap().unwrap();
        assert_eq!(group.id, first);
        assert!(engine.entry(entry).unwrap().is_reconciled());
    }

    #[test]
    fn test_reconcile_requires_reconciliable_account() {
        let mut engine = engine();
        let entry = book(&mut engine, "411");
        let err = engine.reconcile_entries(&[entry], d(4, 2), "admin").unwrap_err();
        assert_eq!(err.error_code(), "ACCOUNT_NOT_RECONCILIABLE");
        assert_eq!(engine.current_period().unwrap().counters.last_concilement, ConcilementId::new(0));
    }

    #[test]
    fn test_unreconcile_drops_empty_group() {
        let mut engine = engine();
        let entry = book(&mut engine, "512");
        let line = engine.next_bank_line_id().unwrap();
        let group = engine.reconcile_entries(&[entry], d(4, 2), "admin").unwrap();
        engine.add_member(group, MemberRef::bank_line(line)).unwrap();

        engine.unreconcile(MemberRef::entry(entry)).unwrap();
        assert!(engine.get_group_for(MemberRef::bank_line(line)).unwrap().is_some());
        engine.unreconcile(MemberRef::bank_line(line)).unwrap();
        assert!(engine.get_group_for(MemberRef::bank_line(line)).unwrap().is_none());
        assert!(engine.unreconcile(MemberRef::entry(entry)).is_err());
    }

    #[test]
    fn test_settle_then_unsettle() {
        let mut engine = engine();
        let first = book(&mut engine, "411");
        let second = book(&mut engine, "411");
        let number = engine.allocate_settlement_number().unwrap();
        engine.settle(&[first, second], number, "admin").unwrap();
        assert_eq!(engine.entry(first).unwrap().settlement.unwrap().number, number);

        let other = engine.allocate_settlement_number().unwrap();
        let err = engine.settle(&[first], other, "admin").unwrap_err();
        assert_eq!(err.error_code(), "DUPLICATE_SETTLEMENT");

        assert_eq!(engine.unsettle(number).unwrap(), 2);
        assert!(!engine.entry(first).unwrap().is_settled());
        assert!(!engine.entry(second).unwrap().is_settled());
    }

    #[test]
    fn test_settle_refuses_deleted_and_unsettleable() {
        let mut engine = engine();
        let bank = book(&mut engine, "512");
        let customer = book(&mut engine, "411");
        let number = engine.allocate_settlement_number().unwrap();

        let err = engine.settle(&[customer, bank], number, "admin").unwrap_err();
        assert_eq!(err.error_code(), "ACCOUNT_NOT_SETTLEABLE");
        assert!(!engine.entry(customer).unwrap().is_settled());

        engine.delete(customer).unwrap();
        let err = engine.settle(&[customer], number, "admin").unwrap_err();
        assert_eq!(err, EngineError::Tracker(TrackerError::DeletedEntry(customer)));
        assert!(engine.settle(&[], number, "admin").is_err());
    }
}
