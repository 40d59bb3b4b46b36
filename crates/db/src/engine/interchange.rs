//! CSV import and export of entries.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use chrono::NaiveDate;
use carnet_core::interchange::{ImportError, ImportRow, SettlementMark, read_rows, write_entries};
use carnet_core::ledger::{Account, EntryDraft, EntryError};
use carnet_shared::types::EntryNumber;
use tracing::{info, warn};

use super::{Engine, EngineError};
use crate::connection::Connection;
use crate::repositories::{AccountRepository, EntryFilter};

/// Outcome of a CSV import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Entries created, in file order.
    pub inserted: Vec<EntryNumber>,
    /// Per-line errors; the other lines were imported regardless.
    pub errors: Vec<ImportError>,
}

impl ImportReport {
    /// Returns true when every line was imported.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// An imported row waiting for its settlement and reconciliation.
struct Imported {
    line: usize,
    number: EntryNumber,
    settleable: bool,
    reconciliable: bool,
    row: ImportRow,
}

enum SettlementKey {
    Group(i64),
    Account(String),
}

impl<C: Connection> Engine<C> {
    /// Imports entries from positional CSV.
    ///
    /// Every parseable line becomes an entry; rows sharing a settlement key,
    /// or flagged on the same account, are settled together under a fresh
    /// number, and rows carrying a reconciliation date are reconciled per
    /// value date.
    ///
    /// # Errors
    ///
    /// Returns an error only when storage fails; line-level rejections are
    /// listed in the report.
    pub fn import_csv<R: Read>(&mut self, reader: R, auto_correct: bool) -> Result<ImportReport, EngineError> {
        let (rows, errors) = read_rows(reader);
        let mut report = ImportReport {
            inserted: Vec::new(),
            errors,
        };

        self.unit_of_work(|engine| {
            let mut imported = Vec::with_capacity(rows.len());
            for row in rows {
                match engine.import_row(&row, auto_correct) {
                    Ok((number, account)) => {
                        report.inserted.push(number);
                        imported.push(Imported {
                            line: row.line,
                            number,
                            settleable: account.settleable,
                            reconciliable: account.reconciliable,
                            row,
                        });
                    }
                    Err(EngineError::Entry(source)) => {
                        report.errors.push(ImportError::Entry { line: row.line, source });
                    }
                    Err(err) => return Err(err),
                }
            }
            engine.settle_imported(&imported, &mut report.errors)?;
            engine.reconcile_imported(&imported, &mut report.errors)?;
            Ok(())
        })?;

        report.errors.sort_by_key(|e| e.line().unwrap_or(usize::MAX));
        if report.is_clean() {
            info!(inserted = report.inserted.len(), "CSV import finished");
        } else {
            warn!(
                inserted = report.inserted.len(),
                errors = report.errors.len(),
                "CSV import finished with rejected lines"
            );
        }
        Ok(report)
    }

    /// Writes the entries matching `filter` as CSV, with a header row.
    ///
    /// Returns the number of entries written.
    pub fn export_csv<W: Write>(&mut self, writer: W, filter: &EntryFilter) -> Result<usize, EngineError> {
        let entries = self.entries(filter)?;
        write_entries(writer, &entries)?;
        info!(entries = entries.len(), "CSV export finished");
        Ok(entries.len())
    }

    fn import_row(&mut self, row: &ImportRow, auto_correct: bool) -> Result<(EntryNumber, Account), EngineError> {
        let account = AccountRepository::new(&mut self.conn)
            .find(&row.account)?
            .ok_or_else(|| EntryError::UnknownAccount(row.account.clone()))?;
        let currency = row.currency.clone().unwrap_or_else(|| account.currency.clone());
        let ledger = row
            .ledger
            .clone()
            .unwrap_or_else(|| self.config.dossier.import_ledger.clone());

        let mut draft = EntryDraft::new(row.operation_date, &row.account, ledger, currency)
            .effect_date(row.effect_date)
            .label(row.label.as_str())
            .reference(row.reference.as_str());
        draft.amount = row.amount;
        if let Some(template) = &row.template {
            draft = draft.template(template.as_str());
        }

        let entry = self.create(draft, auto_correct)?;
        Ok((entry.number, account))
    }

    fn settle_imported(&mut self, imported: &[Imported], errors: &mut Vec<ImportError>) -> Result<(), EngineError> {
        let mut groups: Vec<(SettlementKey, Vec<&Imported>)> = Vec::new();
        let mut by_key: BTreeMap<i64, usize> = BTreeMap::new();
        let mut by_account: BTreeMap<String, usize> = BTreeMap::new();

        for item in imported {
            let slot = match &item.row.settlement {
                SettlementMark::Unsettled => continue,
                _ if !item.settleable => {
                    errors.push(ImportError::Linkage {
                        line: item.line,
                        message: format!("account {} is not settleable", item.row.account),
                    });
                    continue;
                }
                SettlementMark::Group(key) => *by_key.entry(*key).or_insert_with(|| {
                    groups.push((SettlementKey::Group(*key), Vec::new()));
                    groups.len() - 1
                }),
                SettlementMark::Flag => *by_account.entry(item.row.account.clone()).or_insert_with(|| {
                    groups.push((SettlementKey::Account(item.row.account.clone()), Vec::new()));
                    groups.len() - 1
                }),
            };
            groups[slot].1.push(item);
        }

        let user = self.default_user();
        for (key, members) in groups {
            let numbers: Vec<EntryNumber> = members.iter().map(|m| m.number).collect();
            let settlement = self.allocate_settlement_number()?;
            match self.settle(&numbers, settlement, &user) {
                Ok(()) => {}
                Err(EngineError::Tracker(refusal)) => {
                    let scope = match key {
                        SettlementKey::Group(k) => format!("settlement group {k}"),
                        SettlementKey::Account(a) => format!("settlement of account {a}"),
                    };
                    errors.extend(members.iter().map(|m| ImportError::Linkage {
                        line: m.line,
                        message: format!("{scope}: {refusal}"),
                    }));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    fn reconcile_imported(&mut self, imported: &[Imported], errors: &mut Vec<ImportError>) -> Result<(), EngineError> {
        let mut groups: BTreeMap<(NaiveDate, String), Vec<&Imported>> = BTreeMap::new();
        for item in imported {
            let Some(reconciliation) = &item.row.reconciliation else {
                continue;
            };
            if !item.reconciliable {
                errors.push(ImportError::Linkage {
                    line: item.line,
                    message: format!("account {} is not reconciliable", item.row.account),
                });
                continue;
            }
            let user = reconciliation
                .user
                .clone()
                .unwrap_or_else(|| self.default_user());
            groups
                .entry((reconciliation.value_date, user))
                .or_default()
                .push(item);
        }

        for ((value_date, user), members) in groups {
            let numbers: Vec<EntryNumber> = members.iter().map(|m| m.number).collect();
            match self.reconcile_entries(&numbers, value_date, &user) {
                Ok(_) => {}
                Err(EngineError::Tracker(refusal)) => {
                    errors.extend(members.iter().map(|m| ImportError::Linkage {
                        line: m.line,
                        message: refusal.to_string(),
                    }));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryConnection;
    use carnet_core::fiscal::{Ledger, PeriodBounds};
    use carnet_core::ledger::EntryStatus;
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
        engine.add_ledger(&Ledger::new("OD", "Miscellaneous")).unwrap();
        engine.add_ledger(&Ledger::new("BQ", "Bank")).unwrap();
        engine.add_account(&Account::new("411", "Customers", "EUR").settleable()).unwrap();
        engine.add_account(&Account::new("512", "Bank", "EUR").reconciliable()).unwrap();
        engine.add_account(&Account::new("706", "Sales", "USD")).unwrap();
        engine
    }

    #[test]
    fn test_import_defaults_and_errors() {
        let mut engine = engine();
        let data = "\
operation_date,effect_date,label\n\
2024-03-01,,Invoice 12,,,,,706,,100\n\
2024-03-01,,Invoice 12,,EUR,BQ,,411,100,\n\
2024-03-02,,Unknown,,,,,999,5,\n\
garbage,,Bad,,,,,411,5,\n";
        let report = engine.import_csv(data.as_bytes(), false).unwrap();

        assert_eq!(report.inserted.len(), 2);
        assert_eq!(
            report.errors.iter().filter_map(ImportError::line).collect::<Vec<_>>(),
            vec![4, 5]
        );
        assert_eq!(report.errors[0].error_code(), "UNKNOWN_ACCOUNT");

        let sales = engine.entry(report.inserted[0]).unwrap();
        assert_eq!(sales.currency, "USD");
        assert_eq!(sales.ledger, "OD");
        assert_eq!(sales.status, EntryStatus::Rough);
        assert_eq!(sales.amount.credit, dec!(100));
        assert_eq!(engine.entry(report.inserted[1]).unwrap().ledger, "BQ");
    }

    #[test]
    fn test_import_rejects_currency_foreign_to_the_account() {
        let mut engine = engine();
        let data = "\
2024-03-01,,Consulting,,EUR,,,706,,100\n\
2024-03-01,,Consulting,,EUR,,,411,100,\n";
        let report = engine.import_csv(data.as_bytes(), false).unwrap();

        assert_eq!(report.inserted.len(), 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].line(), Some(1));
        assert_eq!(report.errors[0].error_code(), "CURRENCY_MISMATCH");
        assert_eq!(engine.entry(report.inserted[0]).unwrap().account, "411");
    }

    #[test]
    fn test_import_settles_groups_and_flags() {
        let mut engine = engine();
        let data = "\
2024-03-01,,A,,,,,411,10,,7\n\
2024-03-02,,B,,,,,411,,10,7\n\
2024-03-03,,C,,,,,411,4,,x\n\
2024-03-04,,D,,,,,411,,4,x\n\
2024-03-05,,E,,,,,706,,4,x\n";
        let report = engine.import_csv(data.as_bytes(), false).unwrap();

        assert_eq!(report.inserted.len(), 5);
        assert_eq!(report.errors.len(), 1);
        assert!(matches!(report.errors[0], ImportError::Linkage { line: 5, .. }));

        let stamps: Vec<_> = report.inserted[..4]
            .iter()
            .map(|n| engine.entry(*n).unwrap().settlement.unwrap().number)
            .collect();
        assert_eq!(stamps[0], stamps[1]);
        assert_eq!(stamps[2], stamps[3]);
        assert_ne!(stamps[0], stamps[2]);
        assert!(engine.entry(report.inserted[4]).unwrap().settlement.is_none());
    }

    #[test]
    fn test_import_reconciles_per_value_date() {
        let mut engine = engine();
        let data = "\
2024-03-01,,Fee,,,BQ,,512,,12,,,,,,,,2024-03-04,alice\n\
2024-03-01,,Fee,,,BQ,,512,,3,,,,,,,,2024-03-04,alice\n\
2024-03-02,,Wire,,,BQ,,512,40,,,,,,,,,2024-03-06\n";
        let report = engine.import_csv(data.as_bytes(), false).unwrap();
        assert!(report.is_clean());

        let entries: Vec<_> = report
            .inserted
            .iter()
            .map(|n| engine.entry(*n).unwrap().reconciliation.unwrap())
            .collect();
        assert_eq!(entries[0].group, entries[1].group);
        assert_eq!(entries[0].user, "alice");
        assert_ne!(entries[0].group, entries[2].group);
        assert_eq!(entries[2].value_date, d(3, 6));
    }

    #[test]
    fn test_export_writes_header_and_rows() {
        let mut engine = engine();
        engine
            .create(EntryDraft::new(d(3, 1), "411", "OD", "EUR").debit(dec!(12.50)).label("Rent"), false)
            .unwrap();
        let mut out = Vec::new();
        let written = engine.export_csv(&mut out, &EntryFilter::new()).unwrap();
        assert_eq!(written, 1);

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("operation_date,effect_date"));
        assert!(lines.next().unwrap().starts_with("2024-03-01,2024-03-01,Rent,,EUR,OD,,411,12.5,"));

        let (rows, errors) = read_rows(text.as_bytes());
        assert!(errors.is_empty());
        assert_eq!(rows[0].amount.debit, dec!(12.5));
    }
}
