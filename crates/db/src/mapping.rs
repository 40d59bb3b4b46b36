//! Row mapping between stored text cells and domain types.
//!
//! This is the only place column names are spelled out.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use carnet_core::fiscal::{FiscalPeriod, Ledger, PeriodBounds, PeriodCounters, PeriodStatus};
use carnet_core::ledger::{Account, AccountBalances, Entry, EntryStatus, SettlementStamp};
use carnet_core::reconcile::{ConcilementGroup, MemberKind, MemberRef};
use carnet_shared::types::DebitCredit;

use crate::connection::{Fields, Row, StorageError, Table};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Formats a timestamp for storage.
#[must_use]
pub fn timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn corrupt(table: Table, column: &'static str, value: &str) -> StorageError {
    StorageError::Corrupt {
        table,
        column,
        value: value.to_string(),
    }
}

fn text(row: &Row, table: Table, column: &'static str) -> Result<String, StorageError> {
    row.get(column)
        .map(ToString::to_string)
        .ok_or_else(|| corrupt(table, column, "NULL"))
}

fn parse<T: FromStr>(row: &Row, table: Table, column: &'static str) -> Result<T, StorageError> {
    let raw = row.get(column).ok_or_else(|| corrupt(table, column, "NULL"))?;
    raw.parse().map_err(|_| corrupt(table, column, raw))
}

fn parse_opt<T: FromStr>(
    row: &Row,
    table: Table,
    column: &'static str,
) -> Result<Option<T>, StorageError> {
    row.get(column)
        .map(|raw| raw.parse().map_err(|_| corrupt(table, column, raw)))
        .transpose()
}

fn parse_timestamp(row: &Row, table: Table, column: &'static str) -> Result<NaiveDateTime, StorageError> {
    let raw = row.get(column).ok_or_else(|| corrupt(table, column, "NULL"))?;
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map_err(|_| corrupt(table, column, raw))
}

fn flag(row: &Row, column: &'static str) -> bool {
    row.get(column) == Some("1")
}

fn bit(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

fn pair(
    row: &Row,
    table: Table,
    debit: &'static str,
    credit: &'static str,
) -> Result<DebitCredit, StorageError> {
    Ok(DebitCredit::new(
        parse_opt(row, table, debit)?.unwrap_or(Decimal::ZERO),
        parse_opt(row, table, credit)?.unwrap_or(Decimal::ZERO),
    ))
}

// ========== Entries ==========

/// Every column of an entry row.
#[must_use]
pub fn entry_fields(entry: &Entry) -> Fields {
    let settlement = entry.settlement.as_ref();
    Fields::new()
        .set("number", entry.number)
        .set("operation_date", entry.operation_date)
        .set("effect_date", entry.effect_date)
        .set("label", &entry.label)
        .set("reference", &entry.reference)
        .set("account", &entry.account)
        .set("currency", &entry.currency)
        .set("ledger", &entry.ledger)
        .set_opt("template", entry.template.as_ref())
        .set("debit", entry.amount.debit)
        .set("credit", entry.amount.credit)
        .set("status", entry.status)
        .set("created_by", &entry.created_by)
        .set("created_at", timestamp(entry.created_at))
        .set_opt("settlement_number", settlement.map(|s| s.number))
        .set_opt("settlement_user", settlement.map(|s| s.user.as_str()))
        .set_opt("settlement_at", settlement.map(|s| timestamp(s.at)))
}

/// Settlement columns only.
#[must_use]
pub fn settlement_fields(stamp: Option<&SettlementStamp>) -> Fields {
    Fields::new()
        .set_opt("settlement_number", stamp.map(|s| s.number))
        .set_opt("settlement_user", stamp.map(|s| s.user.as_str()))
        .set_opt("settlement_at", stamp.map(|s| timestamp(s.at)))
}

/// Maps an entry row. Reconciliation linkage is filled in by the repository.
///
/// # Errors
///
/// Returns `StorageError::Corrupt` for an unparseable cell.
pub fn entry_from_row(row: &Row) -> Result<Entry, StorageError> {
    const T: Table = Table::Entries;
    let status_raw = text(row, T, "status")?;
    let status = EntryStatus::parse(&status_raw).ok_or_else(|| corrupt(T, "status", &status_raw))?;
    let settlement = match parse_opt(row, T, "settlement_number")? {
        Some(number) => Some(SettlementStamp {
            number,
            user: row.get("settlement_user").unwrap_or_default().to_string(),
            at: parse_timestamp(row, T, "settlement_at")?,
        }),
        None => None,
    };

    Ok(Entry {
        number: parse(row, T, "number")?,
        operation_date: parse(row, T, "operation_date")?,
        effect_date: parse(row, T, "effect_date")?,
        label: row.get("label").unwrap_or_default().to_string(),
        reference: row.get("reference").unwrap_or_default().to_string(),
        account: text(row, T, "account")?,
        currency: text(row, T, "currency")?,
        ledger: text(row, T, "ledger")?,
        template: row.get("template").map(ToString::to_string),
        amount: pair(row, T, "debit", "credit")?,
        status,
        created_by: row.get("created_by").unwrap_or_default().to_string(),
        created_at: parse_timestamp(row, T, "created_at")?,
        settlement,
        reconciliation: None,
    })
}

// ========== Accounts ==========

/// Balance columns of an account row.
#[must_use]
pub fn balance_fields(balances: &AccountBalances) -> Fields {
    Fields::new()
        .set("validated_debit", balances.validated.debit)
        .set("validated_credit", balances.validated.credit)
        .set("rough_debit", balances.rough.debit)
        .set("rough_credit", balances.rough.credit)
        .set("opening_debit", balances.opening.debit)
        .set("opening_credit", balances.opening.credit)
        .set("future_debit", balances.future.debit)
        .set("future_credit", balances.future.credit)
}

/// Every column of an account row.
#[must_use]
pub fn account_fields(account: &Account) -> Fields {
    let mut fields = Fields::new()
        .set("id", &account.id)
        .set("label", &account.label)
        .set("currency", &account.currency)
        .set("settleable", bit(account.settleable))
        .set("reconciliable", bit(account.reconciliable))
        .set("forward", bit(account.forward));
    let balances = balance_fields(&account.balances);
    fields.extend(balances);
    fields
}

/// Maps an account row.
///
/// # Errors
///
/// Returns `StorageError::Corrupt` for an unparseable cell.
pub fn account_from_row(row: &Row) -> Result<Account, StorageError> {
    const T: Table = Table::Accounts;
    Ok(Account {
        id: text(row, T, "id")?,
        label: row.get("label").unwrap_or_default().to_string(),
        currency: text(row, T, "currency")?,
        balances: AccountBalances {
            validated: pair(row, T, "validated_debit", "validated_credit")?,
            rough: pair(row, T, "rough_debit", "rough_credit")?,
            opening: pair(row, T, "opening_debit", "opening_credit")?,
            future: pair(row, T, "future_debit", "future_credit")?,
        },
        settleable: flag(row, "settleable"),
        reconciliable: flag(row, "reconciliable"),
        forward: flag(row, "forward"),
    })
}

// ========== Ledgers ==========

/// Every column of a ledger row.
#[must_use]
pub fn ledger_fields(ledger: &Ledger) -> Fields {
    Fields::new()
        .set("id", &ledger.id)
        .set("label", &ledger.label)
        .set_opt("last_closing_date", ledger.last_closing_date)
}

/// Maps a ledger row.
///
/// # Errors
///
/// Returns `StorageError::Corrupt` for an unparseable cell.
pub fn ledger_from_row(row: &Row) -> Result<Ledger, StorageError> {
    const T: Table = Table::Ledgers;
    Ok(Ledger {
        id: text(row, T, "id")?,
        label: row.get("label").unwrap_or_default().to_string(),
        last_closing_date: parse_opt::<NaiveDate>(row, T, "last_closing_date")?,
    })
}

/// Maps a ledger totals row to `(ledger, currency, totals)`.
///
/// # Errors
///
/// Returns `StorageError::Corrupt` for an unparseable cell.
pub fn ledger_total_from_row(row: &Row) -> Result<(String, String, DebitCredit), StorageError> {
    const T: Table = Table::LedgerTotals;
    Ok((
        text(row, T, "ledger")?,
        text(row, T, "currency")?,
        pair(row, T, "debit", "credit")?,
    ))
}

// ========== Concilement ==========

/// Every column of a concilement group row.
#[must_use]
pub fn group_fields(group: &ConcilementGroup) -> Fields {
    Fields::new()
        .set("id", group.id)
        .set("value_date", group.value_date)
        .set("user", &group.user)
        .set("created_at", timestamp(group.at))
}

/// Maps a concilement group row, without members.
///
/// # Errors
///
/// Returns `StorageError::Corrupt` for an unparseable cell.
pub fn group_from_row(row: &Row) -> Result<ConcilementGroup, StorageError> {
    const T: Table = Table::ConcilementGroups;
    Ok(ConcilementGroup::new(
        parse(row, T, "id")?,
        parse(row, T, "value_date")?,
        row.get("user").unwrap_or_default(),
        parse_timestamp(row, T, "created_at")?,
    ))
}

/// Every column of a concilement member row.
#[must_use]
pub fn member_fields(group: carnet_shared::types::ConcilementId, member: MemberRef) -> Fields {
    Fields::new()
        .set("group_id", group)
        .set("kind", member.kind.as_str())
        .set("foreign_id", member.id)
}

/// Maps a member row to `(group, member)`.
///
/// # Errors
///
/// Returns `StorageError::Corrupt` for an unparseable cell.
pub fn member_from_row(
    row: &Row,
) -> Result<(carnet_shared::types::ConcilementId, MemberRef), StorageError> {
    const T: Table = Table::ConcilementMembers;
    let kind_raw = text(row, T, "kind")?;
    let kind = MemberKind::parse(&kind_raw).ok_or_else(|| corrupt(T, "kind", &kind_raw))?;
    Ok((
        parse(row, T, "group_id")?,
        MemberRef {
            kind,
            id: parse(row, T, "foreign_id")?,
        },
    ))
}

// ========== Periods ==========

/// Every column of a period row.
#[must_use]
pub fn period_fields(period: &FiscalPeriod) -> Fields {
    let c = &period.counters;
    Fields::new()
        .set_opt("begin", period.bounds.begin)
        .set_opt("end", period.bounds.end)
        .set("status", period.status.as_str())
        .set("last_entry", c.last_entry)
        .set("last_settlement", c.last_settlement)
        .set("last_concilement", c.last_concilement)
        .set("last_bank_import", c.last_bank_import)
        .set("last_bank_line", c.last_bank_line)
        .set_opt("previous_last_entry", period.previous_last_entry)
}

/// Maps a period row.
///
/// # Errors
///
/// Returns `StorageError::Corrupt` for an unparseable cell.
pub fn period_from_row(row: &Row) -> Result<FiscalPeriod, StorageError> {
    const T: Table = Table::Periods;
    let status_raw = text(row, T, "status")?;
    Ok(FiscalPeriod {
        bounds: PeriodBounds::new(parse_opt(row, T, "begin")?, parse_opt(row, T, "end")?),
        status: PeriodStatus::parse(&status_raw).ok_or_else(|| corrupt(T, "status", &status_raw))?,
        counters: PeriodCounters {
            last_entry: parse(row, T, "last_entry")?,
            last_settlement: parse(row, T, "last_settlement")?,
            last_concilement: parse(row, T, "last_concilement")?,
            last_bank_import: parse(row, T, "last_bank_import")?,
            last_bank_line: parse(row, T, "last_bank_line")?,
        },
        previous_last_entry: parse_opt(row, T, "previous_last_entry")?,
    })
}
