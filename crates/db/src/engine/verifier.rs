//! Balance verifier over the three independently maintained aggregates.

use carnet_core::ledger::{BalanceScope, CurrencyTotals, EntryStatus, balance};
use tracing::{debug, warn};

use super::{Engine, EngineError};
use crate::connection::Connection;
use crate::repositories::{AccountRepository, EntryFilter, EntryRepository, LedgerRepository};

impl<C: Connection> Engine<C> {
    /// Per-currency totals of one scope, each read from its own source.
    ///
    /// - entries: ROUGH and VALIDATED entries summed per entry currency
    /// - ledgers: the ledger totals table
    /// - accounts: validated plus rough pairs per account currency
    pub fn balance_for(&mut self, scope: BalanceScope) -> Result<CurrencyTotals, EngineError> {
        let totals = match scope {
            BalanceScope::Entries => EntryRepository::new(&mut self.conn)
                .load(&EntryFilter::new().statuses([EntryStatus::Rough, EntryStatus::Validated]))?
                .into_iter()
                .map(|e| (e.currency, e.amount))
                .collect(),
            BalanceScope::Ledgers => LedgerRepository::new(&mut self.conn).totals_by_currency()?,
            BalanceScope::Accounts => AccountRepository::new(&mut self.conn).in_period_totals()?,
        };
        Ok(totals)
    }

    /// Returns true if the three scopes are each balanced and agree.
    pub fn is_consistent(&mut self) -> Result<bool, EngineError> {
        match self.check_balances() {
            Ok(()) => Ok(true),
            Err(EngineError::Balance(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Checks every scope is balanced and the three agree.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Balance` listing every issue found.
    pub fn check_balances(&mut self) -> Result<(), EngineError> {
        let entries = self.balance_for(BalanceScope::Entries)?;
        let ledgers = self.balance_for(BalanceScope::Ledgers)?;
        let accounts = self.balance_for(BalanceScope::Accounts)?;
        if let Err(err) = balance::verify(&entries, &ledgers, &accounts, &self.config.balance) {
            warn!(issues = err.issues().len(), "Balance check failed");
            return Err(err.into());
        }
        debug!("Balance check passed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryConnection;
    use carnet_core::fiscal::{Ledger, PeriodBounds};
    use carnet_core::ledger::{Account, EntryDraft};
    use carnet_shared::AppConfig;
    use carnet_shared::types::DebitCredit;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn engine() -> Engine<MemoryConnection> {
        let mut engine = Engine::new(MemoryConnection::new(), AppConfig::default());
        engine
            .install_period(PeriodBounds::new(Some(d(1, 1)), Some(d(12, 31))))
            .unwrap();
        engine.add_ledger(&Ledger::new("VT", "Sales")).unwrap();
        engine.add_account(&Account::new("411", "Customers", "EUR")).unwrap();
        engine.add_account(&Account::new("706", "Sales", "EUR")).unwrap();
        engine
    }

    #[test]
    fn test_balanced_pair_passes() {
        let mut engine = engine();
        engine
            .create(EntryDraft::new(d(3, 1), "411", "VT", "EUR").debit(dec!(120)), false)
            .unwrap();
        assert!(!engine.is_consistent().unwrap());

        engine
            .create(EntryDraft::new(d(3, 1), "706", "VT", "EUR").credit(dec!(120)), false)
            .unwrap();
        engine.check_balances().unwrap();

        for scope in BalanceScope::ALL {
            assert_eq!(
                engine.balance_for(scope).unwrap().get("EUR"),
                DebitCredit::new(dec!(120), dec!(120))
            );
        }
    }

    #[test]
    fn test_future_and_deleted_entries_are_excluded() {
        let mut engine = engine();
        engine
            .create(EntryDraft::new(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(), "411", "VT", "EUR").debit(dec!(9)), false)
            .unwrap();
        let rough = engine
            .create(EntryDraft::new(d(3, 1), "411", "VT", "EUR").debit(dec!(5)), false)
            .unwrap();
        engine.delete(rough.number).unwrap();
        assert!(engine.balance_for(BalanceScope::Entries).unwrap().is_empty());
        engine.check_balances().unwrap();
    }

    #[test]
    fn test_drifted_aggregate_is_reported() {
        let mut engine = engine();
        engine
            .create(EntryDraft::new(d(3, 1), "411", "VT", "EUR").debit(dec!(50)), false)
            .unwrap();
        engine
            .create(EntryDraft::new(d(3, 1), "706", "VT", "EUR").credit(dec!(50)), false)
            .unwrap();
        LedgerRepository::new(engine.connection_mut())
            .add_to_totals("VT", "EUR", DebitCredit::new(dec!(1), dec!(0)))
            .unwrap();
        let err = engine.check_balances().unwrap_err();
        let EngineError::Balance(balance) = err else {
            panic!("expected a balance error");
        };
        assert_eq!(balance.issues().len(), 2);
    }
}
