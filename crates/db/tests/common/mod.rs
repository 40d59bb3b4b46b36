//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use carnet_core::fiscal::{Ledger, PeriodBounds};
use carnet_core::ledger::{Account, Entry, EntryDraft};
use carnet_db::{Engine, MemoryConnection};
use carnet_shared::AppConfig;

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn clock() -> NaiveDateTime {
    d(2024, 6, 1).and_hms_opt(9, 0, 0).unwrap()
}

pub fn year(y: i32) -> PeriodBounds {
    PeriodBounds::new(Some(d(y, 1, 1)), Some(d(y, 12, 31)))
}

/// A 2024 dossier with a sales ledger, a bank ledger and four accounts.
pub fn dossier_on(conn: MemoryConnection) -> Engine<MemoryConnection> {
    let mut engine = Engine::new(conn, AppConfig::default()).with_clock(clock);
    engine.install_period(year(2024)).unwrap();
    engine.add_ledger(&Ledger::new("VT", "Sales")).unwrap();
    engine.add_ledger(&Ledger::new("BQ", "Bank")).unwrap();
    engine
        .add_account(&Account::new("411", "Customers", "EUR").settleable().forward())
        .unwrap();
    engine
        .add_account(&Account::new("512", "Bank", "EUR").reconciliable().forward())
        .unwrap();
    engine.add_account(&Account::new("706", "Sales", "EUR")).unwrap();
    engine.add_account(&Account::new("627", "Bank fees", "EUR")).unwrap();
    engine
}

pub fn dossier() -> Engine<MemoryConnection> {
    dossier_on(MemoryConnection::new())
}

pub fn debit(
    engine: &mut Engine<MemoryConnection>,
    date: NaiveDate,
    account: &str,
    ledger: &str,
    amount: Decimal,
) -> Entry {
    engine
        .create(EntryDraft::new(date, account, ledger, "EUR").debit(amount), false)
        .unwrap()
}

pub fn credit(
    engine: &mut Engine<MemoryConnection>,
    date: NaiveDate,
    account: &str,
    ledger: &str,
    amount: Decimal,
) -> Entry {
    engine
        .create(EntryDraft::new(date, account, ledger, "EUR").credit(amount), false)
        .unwrap()
}

/// Books a balanced sale: customer debit against sales credit.
pub fn sale(engine: &mut Engine<MemoryConnection>, date: NaiveDate, amount: Decimal) -> (Entry, Entry) {
    let customer = debit(engine, date, "411", "VT", amount);
    let sales = credit(engine, date, "706", "VT", amount);
    (customer, sales)
}
