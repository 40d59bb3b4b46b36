//! Positional CSV row shape for entry import and export.
//!
//! Columns, in order:
//!
//! | # | column                 | import   |
//! |---|------------------------|----------|
//! | 0 | operation date         | required |
//! | 1 | effect date            | defaults to operation date |
//! | 2 | label                  | optional |
//! | 3 | reference              | optional |
//! | 4 | currency               | defaults to the account currency |
//! | 5 | ledger                 | defaults to the import ledger |
//! | 6 | operation template     | optional |
//! | 7 | account                | required |
//! | 8 | debit                  | optional |
//! | 9 | credit                 | optional |
//! | 10 | settlement flag or number | optional |
//! | 11-16 | settlement user, settlement timestamp, entry number, status, creation user, creation timestamp | ignored |
//! | 17 | reconciliation date   | optional |
//! | 18 | reconciliation user   | optional |
//! | 19 | reconciliation timestamp | optional |

use std::io::{Read, Write};

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use thiserror::Error;
use carnet_shared::AppError;
use carnet_shared::types::DebitCredit;

use crate::ledger::Entry;
use crate::ledger::error::EntryError;

/// Header written on export and skipped on import.
pub const HEADER: [&str; 20] = [
    "operation_date",
    "effect_date",
    "label",
    "reference",
    "currency",
    "ledger",
    "template",
    "account",
    "debit",
    "credit",
    "settlement",
    "settlement_user",
    "settlement_at",
    "entry_number",
    "status",
    "created_by",
    "created_at",
    "reconciliation_date",
    "reconciliation_user",
    "reconciliation_at",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];
const TIMESTAMP_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M:%S"];

/// Error attached to one imported line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    /// The file could not be read as CSV.
    #[error("Line {line}: malformed CSV: {message}")]
    Malformed {
        /// One-based line number.
        line: usize,
        /// Reader message.
        message: String,
    },

    /// A cell could not be parsed.
    #[error("Line {line}: invalid {field} '{value}'")]
    InvalidField {
        /// One-based line number.
        line: usize,
        /// Column name.
        field: &'static str,
        /// Raw cell content.
        value: String,
    },

    /// The row parsed but the entry was rejected.
    #[error("Line {line}: {source}")]
    Entry {
        /// One-based line number.
        line: usize,
        /// The rejection.
        source: EntryError,
    },

    /// The entry was stored but its settlement or reconciliation was refused.
    #[error("Line {line}: {message}")]
    Linkage {
        /// One-based line number.
        line: usize,
        /// The refusal.
        message: String,
    },

    /// Writing the export failed.
    #[error("Export failed: {0}")]
    Write(String),
}

impl ImportError {
    /// Returns the stable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Malformed { .. } => "CSV_MALFORMED",
            Self::InvalidField { .. } => "CSV_INVALID_FIELD",
            Self::Entry { source, .. } => source.error_code(),
            Self::Linkage { .. } => "CSV_LINKAGE_REFUSED",
            Self::Write(_) => "CSV_WRITE_FAILED",
        }
    }

    /// The line the error refers to, when any.
    #[must_use]
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Malformed { line, .. }
            | Self::InvalidField { line, .. }
            | Self::Entry { line, .. }
            | Self::Linkage { line, .. } => Some(*line),
            Self::Write(_) => None,
        }
    }
}

impl From<ImportError> for AppError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Write(_) => Self::Internal(err.to_string()),
            _ => Self::Validation(err.to_string()),
        }
    }
}

/// Settlement column of an imported row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementMark {
    /// Empty cell.
    Unsettled,
    /// Non-numeric marker: the row is settled with the other flagged rows of its account.
    Flag,
    /// Rows sharing this key form one settlement group.
    Group(i64),
}

/// Reconciliation columns of an imported row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedReconciliation {
    /// Bank value date.
    pub value_date: NaiveDate,
    /// Reconciling user, when given.
    pub user: Option<String>,
    /// Reconciliation timestamp, when given.
    pub at: Option<NaiveDateTime>,
}

/// One parsed import line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    /// One-based line number in the file.
    pub line: usize,
    /// Operation date.
    pub operation_date: NaiveDate,
    /// Effect date.
    pub effect_date: NaiveDate,
    /// Label.
    pub label: String,
    /// Reference.
    pub reference: String,
    /// Currency, `None` to use the account currency.
    pub currency: Option<String>,
    /// Ledger, `None` to use the import ledger.
    pub ledger: Option<String>,
    /// Operation template.
    pub template: Option<String>,
    /// Account identifier.
    pub account: String,
    /// Debit and credit cells.
    pub amount: DebitCredit,
    /// Settlement column.
    pub settlement: SettlementMark,
    /// Reconciliation columns.
    pub reconciliation: Option<ImportedReconciliation>,
}

fn cell(record: &csv::StringRecord, index: usize) -> Option<&str> {
    record.get(index).map(str::trim).filter(|s| !s.is_empty())
}

fn owned(record: &csv::StringRecord, index: usize) -> Option<String> {
    cell(record, index).map(ToString::to_string)
}

/// Parses a date in ISO or day-first form.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw.trim(), format).ok())
}

/// Parses a timestamp in ISO or day-first form.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw.trim(), format).ok())
}

/// Parses an amount, accepting a comma decimal separator and spaces.
#[must_use]
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    cleaned.parse().ok()
}

fn required_date(
    record: &csv::StringRecord,
    index: usize,
    field: &'static str,
    line: usize,
) -> Result<Option<NaiveDate>, ImportError> {
    cell(record, index)
        .map(|raw| {
            parse_date(raw).ok_or_else(|| ImportError::InvalidField {
                line,
                field,
                value: raw.to_string(),
            })
        })
        .transpose()
}

fn amount_cell(
    record: &csv::StringRecord,
    index: usize,
    field: &'static str,
    line: usize,
) -> Result<Decimal, ImportError> {
    match cell(record, index) {
        None => Ok(Decimal::ZERO),
        Some(raw) => parse_amount(raw).ok_or_else(|| ImportError::InvalidField {
            line,
            field,
            value: raw.to_string(),
        }),
    }
}

fn parse_record(record: &csv::StringRecord, line: usize) -> Result<ImportRow, ImportError> {
    let operation_date = required_date(record, 0, "operation_date", line)?.ok_or(
        ImportError::Entry {
            line,
            source: EntryError::MissingField("operation_date"),
        },
    )?;
    let effect_date = required_date(record, 1, "effect_date", line)?.unwrap_or(operation_date);
    let account = owned(record, 7).ok_or(ImportError::Entry {
        line,
        source: EntryError::MissingField("account"),
    })?;
    let amount = DebitCredit::new(
        amount_cell(record, 8, "debit", line)?,
        amount_cell(record, 9, "credit", line)?,
    );

    let settlement = match cell(record, 10) {
        None => SettlementMark::Unsettled,
        Some(raw) => raw
            .parse::<i64>()
            .map_or(SettlementMark::Flag, SettlementMark::Group),
    };

    let reconciliation = required_date(record, 17, "reconciliation_date", line)?.map(|value_date| {
        ImportedReconciliation {
            value_date,
            user: owned(record, 18),
            at: cell(record, 19).and_then(parse_timestamp),
        }
    });

    Ok(ImportRow {
        line,
        operation_date,
        effect_date,
        label: owned(record, 2).unwrap_or_default(),
        reference: owned(record, 3).unwrap_or_default(),
        currency: owned(record, 4).map(|c| c.to_uppercase()),
        ledger: owned(record, 5),
        template: owned(record, 6),
        account,
        amount,
        settlement,
        reconciliation,
    })
}

fn is_header(record: &csv::StringRecord) -> bool {
    cell(record, 0).is_some_and(|first| first.eq_ignore_ascii_case(HEADER[0]))
}

/// Reads every line of `reader`.
///
/// Returns the rows that parsed and the errors of the ones that did not; a
/// bad line never stops the import of the others.
pub fn read_rows<R: Read>(reader: R) -> (Vec<ImportRow>, Vec<ImportError>) {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut rows = Vec::new();
    let mut errors = Vec::new();

    for (index, record) in rdr.records().enumerate() {
        let line = index + 1;
        match record {
            Err(e) => errors.push(ImportError::Malformed {
                line,
                message: e.to_string(),
            }),
            Ok(record) if record.iter().all(|c| c.trim().is_empty()) => {}
            Ok(record) if line == 1 && is_header(&record) => {}
            Ok(record) => match parse_record(&record, line) {
                Ok(row) => rows.push(row),
                Err(e) => errors.push(e),
            },
        }
    }

    (rows, errors)
}

fn date_cell(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn timestamp_cell(at: Option<NaiveDateTime>) -> String {
    at.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

fn amount_out(amount: Decimal) -> String {
    if amount.is_zero() {
        String::new()
    } else {
        amount.normalize().to_string()
    }
}

fn entry_record(entry: &Entry) -> [String; 20] {
    let settlement = entry.settlement.as_ref();
    let reconciliation = entry.reconciliation.as_ref();
    [
        date_cell(Some(entry.operation_date)),
        date_cell(Some(entry.effect_date)),
        entry.label.clone(),
        entry.reference.clone(),
        entry.currency.clone(),
        entry.ledger.clone(),
        entry.template.clone().unwrap_or_default(),
        entry.account.clone(),
        amount_out(entry.amount.debit),
        amount_out(entry.amount.credit),
        settlement.map(|s| s.number.to_string()).unwrap_or_default(),
        settlement.map(|s| s.user.clone()).unwrap_or_default(),
        timestamp_cell(settlement.map(|s| s.at)),
        entry.number.to_string(),
        entry.status.to_string(),
        entry.created_by.clone(),
        timestamp_cell(Some(entry.created_at)),
        date_cell(reconciliation.map(|r| r.value_date)),
        reconciliation.map(|r| r.user.clone()).unwrap_or_default(),
        timestamp_cell(reconciliation.map(|r| r.at)),
    ]
}

/// Writes `entries` with a header row.
///
/// # Errors
///
/// Returns `ImportError::Write` if the writer fails.
pub fn write_entries<W: Write>(writer: W, entries: &[Entry]) -> Result<(), ImportError> {
    let mut wrt = csv::WriterBuilder::new().from_writer(writer);
    wrt.write_record(HEADER)
        .map_err(|e| ImportError::Write(e.to_string()))?;
    for entry in entries {
        wrt.write_record(entry_record(entry))
            .map_err(|e| ImportError::Write(e.to_string()))?;
    }
    wrt.flush().map_err(|e| ImportError::Write(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(parse_date("2024-03-05"), Some(d(2024, 3, 5)));
        assert_eq!(parse_date("05/03/2024"), Some(d(2024, 3, 5)));
        assert_eq!(parse_date("March 5"), None);
        assert_eq!(parse_amount("1 234,50"), Some(dec!(1234.50)));
        assert_eq!(parse_amount("12.3"), Some(dec!(12.3)));
        assert_eq!(parse_amount("abc"), None);
        assert!(parse_timestamp("2024-03-05 10:11:12").is_some());
    }

    #[test]
    fn test_read_minimal_row() {
        let data = "2024-03-05,,Rent,,,,,613,800,\n";
        let (rows, errors) = read_rows(data.as_bytes());
        assert!(errors.is_empty());
        let row = &rows[0];
        assert_eq!(row.line, 1);
        assert_eq!(row.effect_date, d(2024, 3, 5));
        assert_eq!(row.account, "613");
        assert_eq!(row.currency, None);
        assert_eq!(row.ledger, None);
        assert_eq!(row.amount, DebitCredit::new(dec!(800), dec!(0)));
        assert_eq!(row.settlement, SettlementMark::Unsettled);
        assert!(row.reconciliation.is_none());
    }

    #[test]
    fn test_errors_collected_per_line() {
        let data = "\
operation_date,effect_date,label\n\
2024-03-05,2024-03-06,Ok,,EUR,BQ,,512,,100,7\n\
not-a-date,,Bad,,,,,512,10,\n\
2024-03-07,,No account,,,,,,10,\n\
2024-03-08,,Bad amount,,,,,512,ten,\n";
        let (rows, errors) = read_rows(data.as_bytes());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[0].settlement, SettlementMark::Group(7));
        assert_eq!(errors.len(), 3);
        assert_eq!(
            errors.iter().filter_map(ImportError::line).collect::<Vec<_>>(),
            vec![3, 4, 5]
        );
        assert_eq!(errors[1].error_code(), "MISSING_FIELD");
    }

    #[test]
    fn test_reconciliation_columns() {
        let data = "2024-03-05,,Fee,,EUR,BQ,,627,12,,x,,,,,,,2024-03-09,alice,2024-03-10 08:00:00\n";
        let (rows, errors) = read_rows(data.as_bytes());
        assert!(errors.is_empty());
        let row = &rows[0];
        assert_eq!(row.settlement, SettlementMark::Flag);
        let rec = row.reconciliation.as_ref().unwrap();
        assert_eq!(rec.value_date, d(2024, 3, 9));
        assert_eq!(rec.user.as_deref(), Some("alice"));
        assert!(rec.at.is_some());
    }
}
