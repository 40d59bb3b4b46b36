//! Ledger repository, including the per-ledger running totals.

use chrono::NaiveDate;
use carnet_core::fiscal::Ledger;
use carnet_core::ledger::CurrencyTotals;
use carnet_shared::types::DebitCredit;

use crate::connection::{Connection, Fields, OrderBy, Predicate, StorageError, Table};
use crate::mapping::{ledger_fields, ledger_from_row, ledger_total_from_row};

/// Ledger repository.
#[derive(Debug)]
pub struct LedgerRepository<'a, C: Connection + ?Sized> {
    conn: &'a mut C,
}

impl<'a, C: Connection + ?Sized> LedgerRepository<'a, C> {
    /// Creates a repository over `conn`.
    pub fn new(conn: &'a mut C) -> Self {
        Self { conn }
    }

    /// Every ledger, by identifier.
    pub fn all(&self) -> Result<Vec<Ledger>, StorageError> {
        self.conn
            .select(Table::Ledgers, &Predicate::All, &[OrderBy::text("id")])?
            .iter()
            .map(ledger_from_row)
            .collect()
    }

    /// Finds a ledger by identifier.
    pub fn find(&self, id: &str) -> Result<Option<Ledger>, StorageError> {
        self.conn
            .select(Table::Ledgers, &Predicate::equals("id", id), &[])?
            .first()
            .map(ledger_from_row)
            .transpose()
    }

    /// Inserts a ledger.
    pub fn insert(&mut self, ledger: &Ledger) -> Result<(), StorageError> {
        self.conn.insert(Table::Ledgers, ledger_fields(ledger))
    }

    /// Sets a ledger's closing date.
    pub fn set_closing_date(&mut self, id: &str, date: NaiveDate) -> Result<(), StorageError> {
        let updated = self.conn.update(
            Table::Ledgers,
            Fields::new().set("last_closing_date", date),
            &Predicate::equals("id", id),
        )?;
        if updated == 0 {
            return Err(StorageError::MissingRow {
                table: Table::Ledgers,
                what: id.to_string(),
            });
        }
        Ok(())
    }

    /// Every `(ledger, currency, totals)` row.
    pub fn totals(&self) -> Result<Vec<(String, String, DebitCredit)>, StorageError> {
        self.conn
            .select(
                Table::LedgerTotals,
                &Predicate::All,
                &[OrderBy::text("ledger"), OrderBy::text("currency")],
            )?
            .iter()
            .map(ledger_total_from_row)
            .collect()
    }

    /// Ledger totals summed per currency.
    pub fn totals_by_currency(&self) -> Result<CurrencyTotals, StorageError> {
        Ok(self
            .totals()?
            .into_iter()
            .map(|(_, currency, pair)| (currency, pair))
            .collect())
    }

    /// Adds `delta` to the running totals of `ledger` in `currency`.
    pub fn add_to_totals(
        &mut self,
        ledger: &str,
        currency: &str,
        delta: DebitCredit,
    ) -> Result<(), StorageError> {
        let key = Predicate::equals("ledger", ledger).and(Predicate::equals("currency", currency));
        let existing = self.conn.select(Table::LedgerTotals, &key, &[])?;
        match existing.first() {
            Some(row) => {
                let (_, _, current) = ledger_total_from_row(row)?;
                let total = current + delta;
                self.conn.update(
                    Table::LedgerTotals,
                    Fields::new()
                        .set("debit", total.debit)
                        .set("credit", total.credit),
                    &key,
                )?;
            }
            None => {
                self.conn.insert(
                    Table::LedgerTotals,
                    Fields::new()
                        .set("ledger", ledger)
                        .set("currency", currency)
                        .set("debit", delta.debit)
                        .set("credit", delta.credit),
                )?;
            }
        }
        Ok(())
    }

    /// Drops every running total.
    pub fn reset_totals(&mut self) -> Result<usize, StorageError> {
        self.conn.delete(Table::LedgerTotals, &Predicate::All)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryConnection;
    use rust_decimal_macros::dec;

    #[test]
    fn test_totals_accumulate() {
        let mut conn = MemoryConnection::new();
        let mut repo = LedgerRepository::new(&mut conn);
        repo.add_to_totals("BQ", "EUR", DebitCredit::new(dec!(100), dec!(0)))
            .unwrap();
        repo.add_to_totals("BQ", "EUR", DebitCredit::new(dec!(0), dec!(40)))
            .unwrap();
        repo.add_to_totals("OD", "EUR", DebitCredit::new(dec!(0), dec!(60)))
            .unwrap();

        assert_eq!(repo.totals().unwrap().len(), 2);
        assert_eq!(
            repo.totals_by_currency().unwrap().get("EUR"),
            DebitCredit::new(dec!(100), dec!(100))
        );
        assert_eq!(repo.reset_totals().unwrap(), 2);
    }

    #[test]
    fn test_set_closing_date_unknown_ledger() {
        let mut conn = MemoryConnection::new();
        let mut repo = LedgerRepository::new(&mut conn);
        let date = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        assert!(repo.set_closing_date("XX", date).is_err());

        repo.insert(&Ledger::new("BQ", "Bank")).unwrap();
        repo.set_closing_date("BQ", date).unwrap();
        assert_eq!(repo.find("BQ").unwrap().unwrap().last_closing_date, Some(date));
    }
}
