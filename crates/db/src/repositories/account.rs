//! Account repository.

use carnet_core::ledger::{Account, AccountBalances, CurrencyTotals};

use crate::connection::{Connection, Fields, OrderBy, Predicate, StorageError, Table};
use crate::mapping::{account_fields, account_from_row, balance_fields};

/// Account repository.
#[derive(Debug)]
pub struct AccountRepository<'a, C: Connection + ?Sized> {
    conn: &'a mut C,
}

impl<'a, C: Connection + ?Sized> AccountRepository<'a, C> {
    /// Creates a repository over `conn`.
    pub fn new(conn: &'a mut C) -> Self {
        Self { conn }
    }

    /// Every account, by identifier.
    pub fn all(&self) -> Result<Vec<Account>, StorageError> {
        self.conn
            .select(Table::Accounts, &Predicate::All, &[OrderBy::text("id")])?
            .iter()
            .map(account_from_row)
            .collect()
    }

    /// Finds an account by identifier.
    pub fn find(&self, id: &str) -> Result<Option<Account>, StorageError> {
        self.conn
            .select(Table::Accounts, &Predicate::equals("id", id), &[])?
            .first()
            .map(account_from_row)
            .transpose()
    }

    /// Inserts an account.
    pub fn insert(&mut self, account: &Account) -> Result<(), StorageError> {
        self.conn.insert(Table::Accounts, account_fields(account))
    }

    /// Overwrites an account's cached balances.
    pub fn save_balances(&mut self, id: &str, balances: &AccountBalances) -> Result<(), StorageError> {
        let updated = self.conn.update(
            Table::Accounts,
            balance_fields(balances),
            &Predicate::equals("id", id),
        )?;
        if updated == 0 {
            return Err(StorageError::MissingRow {
                table: Table::Accounts,
                what: id.to_string(),
            });
        }
        Ok(())
    }

    /// Changes an account's identifier.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), StorageError> {
        let updated = self.conn.update(
            Table::Accounts,
            Fields::new().set("id", new),
            &Predicate::equals("id", old),
        )?;
        if updated == 0 {
            return Err(StorageError::MissingRow {
                table: Table::Accounts,
                what: old.to_string(),
            });
        }
        Ok(())
    }

    /// Validated plus rough pairs summed per account currency.
    pub fn in_period_totals(&self) -> Result<CurrencyTotals, StorageError> {
        Ok(self
            .all()?
            .into_iter()
            .map(|a| (a.currency, a.balances.in_period()))
            .collect())
    }
}
