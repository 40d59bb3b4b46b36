//! Per-currency balance aggregates and the three-way agreement check.
//!
//! The same debit/credit totals are maintained in three places: summed from the
//! entries themselves, cached per ledger, and cached per account. A dossier is
//! consistent when each aggregate is balanced and all three agree per currency.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use carnet_shared::AppError;
use carnet_shared::config::BalanceConfig;
use carnet_shared::types::DebitCredit;

/// Source of the per-currency comparison tolerance.
pub trait Tolerance {
    /// Tolerance for amounts in `currency`.
    fn tolerance_for(&self, currency: &str) -> Decimal;
}

impl Tolerance for Decimal {
    fn tolerance_for(&self, _currency: &str) -> Decimal {
        *self
    }
}

impl Tolerance for BalanceConfig {
    fn tolerance_for(&self, currency: &str) -> Decimal {
        Self::tolerance_for(self, currency)
    }
}

/// Debit/credit totals keyed by currency code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrencyTotals(BTreeMap<String, DebitCredit>);

impl CurrencyTotals {
    /// Creates empty totals.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `amount` to the totals of `currency`.
    pub fn add(&mut self, currency: &str, amount: DebitCredit) {
        *self.0.entry(currency.to_uppercase()).or_default() += amount;
    }

    /// Totals of `currency`, zero when absent.
    #[must_use]
    pub fn get(&self, currency: &str) -> DebitCredit {
        self.0
            .get(&currency.to_uppercase())
            .copied()
            .unwrap_or_default()
    }

    /// Iterates over currencies in code order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DebitCredit)> {
        self.0.iter().map(|(code, pair)| (code.as_str(), pair))
    }

    /// Currency codes present.
    pub fn currencies(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns true if no currency is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<(S, DebitCredit)> for CurrencyTotals {
    fn from_iter<I: IntoIterator<Item = (S, DebitCredit)>>(iter: I) -> Self {
        let mut totals = Self::new();
        for (currency, amount) in iter {
            totals.add(currency.as_ref(), amount);
        }
        totals
    }
}

/// Which aggregate a total was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceScope {
    /// Summed from ROUGH and VALIDATED entries.
    Entries,
    /// The ledger totals table.
    Ledgers,
    /// The accounts' validated and rough pairs.
    Accounts,
}

impl BalanceScope {
    /// All scopes, in check order.
    pub const ALL: [Self; 3] = [Self::Entries, Self::Ledgers, Self::Accounts];
}

impl fmt::Display for BalanceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entries => write!(f, "entries"),
            Self::Ledgers => write!(f, "ledgers"),
            Self::Accounts => write!(f, "accounts"),
        }
    }
}

/// One inconsistency found by [`verify`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceIssue {
    /// Debit and credit differ within one scope.
    Unbalanced {
        /// The scope.
        scope: BalanceScope,
        /// Currency code.
        currency: String,
        /// Totals found.
        totals: DebitCredit,
    },
    /// The three scopes disagree on a currency.
    Disagreement {
        /// Currency code.
        currency: String,
        /// Entries totals.
        entries: DebitCredit,
        /// Ledger totals.
        ledgers: DebitCredit,
        /// Account totals.
        accounts: DebitCredit,
    },
}

impl fmt::Display for BalanceIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbalanced {
                scope,
                currency,
                totals,
            } => write!(
                f,
                "{scope} unbalanced in {currency}: debit {} != credit {}",
                totals.debit, totals.credit
            ),
            Self::Disagreement {
                currency,
                entries,
                ledgers,
                accounts,
            } => write!(
                f,
                "{currency} totals disagree: entries {}/{}, ledgers {}/{}, accounts {}/{}",
                entries.debit,
                entries.credit,
                ledgers.debit,
                ledgers.credit,
                accounts.debit,
                accounts.credit
            ),
        }
    }
}

/// Balance check failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BalanceError {
    /// At least one scope is unbalanced or the scopes disagree.
    #[error("Balance check failed: {}", describe(.0))]
    Mismatch(Vec<BalanceIssue>),
}

fn describe(issues: &[BalanceIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl BalanceError {
    /// Returns the stable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Mismatch(_) => "BALANCE_MISMATCH",
        }
    }

    /// The issues found.
    #[must_use]
    pub fn issues(&self) -> &[BalanceIssue] {
        match self {
            Self::Mismatch(issues) => issues,
        }
    }
}

impl From<BalanceError> for AppError {
    fn from(err: BalanceError) -> Self {
        Self::Invariant(err.to_string())
    }
}

/// Returns true if debit equals credit within tolerance for every currency.
#[must_use]
pub fn is_balanced(totals: &CurrencyTotals, tolerance: &impl Tolerance) -> bool {
    totals
        .iter()
        .all(|(currency, pair)| pair.is_balanced(tolerance.tolerance_for(currency)))
}

/// Returns true if the three aggregates agree per currency.
///
/// A currency missing from one aggregate counts as zero there.
#[must_use]
pub fn all_three_agree(
    entries: &CurrencyTotals,
    ledgers: &CurrencyTotals,
    accounts: &CurrencyTotals,
    tolerance: &impl Tolerance,
) -> bool {
    disagreements(entries, ledgers, accounts, tolerance).is_empty()
}

fn disagreements(
    entries: &CurrencyTotals,
    ledgers: &CurrencyTotals,
    accounts: &CurrencyTotals,
    tolerance: &impl Tolerance,
) -> Vec<BalanceIssue> {
    let mut currencies: Vec<&str> = entries
        .currencies()
        .chain(ledgers.currencies())
        .chain(accounts.currencies())
        .collect();
    currencies.sort_unstable();
    currencies.dedup();

    currencies
        .into_iter()
        .filter_map(|currency| {
            let tol = tolerance.tolerance_for(currency);
            let (e, l, a) = (
                entries.get(currency),
                ledgers.get(currency),
                accounts.get(currency),
            );
            if e.agrees_with(&l, tol) && e.agrees_with(&a, tol) && l.agrees_with(&a, tol) {
                None
            } else {
                Some(BalanceIssue::Disagreement {
                    currency: currency.to_string(),
                    entries: e,
                    ledgers: l,
                    accounts: a,
                })
            }
        })
        .collect()
}

/// Checks every scope is balanced and the three agree.
///
/// # Errors
///
/// Returns `BalanceError::Mismatch` listing every issue found.
pub fn verify(
    entries: &CurrencyTotals,
    ledgers: &CurrencyTotals,
    accounts: &CurrencyTotals,
    tolerance: &impl Tolerance,
) -> Result<(), BalanceError> {
    let mut issues = Vec::new();
    for (scope, totals) in [
        (BalanceScope::Entries, entries),
        (BalanceScope::Ledgers, ledgers),
        (BalanceScope::Accounts, accounts),
    ] {
        for (currency, pair) in totals.iter() {
            if !pair.is_balanced(tolerance.tolerance_for(currency)) {
                issues.push(BalanceIssue::Unbalanced {
                    scope,
                    currency: currency.to_string(),
                    totals: *pair,
                });
            }
        }
    }
    issues.extend(disagreements(entries, ledgers, accounts, tolerance));

    if issues.is_empty() {
        Ok(())
    } else {
        Err(BalanceError::Mismatch(issues))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn totals(items: &[(&str, Decimal, Decimal)]) -> CurrencyTotals {
        items
            .iter()
            .map(|(c, d, cr)| (*c, DebitCredit::new(*d, *cr)))
            .collect()
    }

    #[test]
    fn test_add_normalizes_code() {
        let mut t = CurrencyTotals::new();
        t.add("eur", DebitCredit::new(dec!(10), dec!(0)));
        t.add("EUR", DebitCredit::new(dec!(0), dec!(10)));
        assert_eq!(t.get("Eur"), DebitCredit::new(dec!(10), dec!(10)));
        assert_eq!(t.get("USD"), DebitCredit::ZERO);
    }

    #[test]
    fn test_is_balanced_within_tolerance() {
        let tol = dec!(0.001);
        assert!(is_balanced(&totals(&[("EUR", dec!(100), dec!(100.0005))]), &tol));
        assert!(!is_balanced(&totals(&[("EUR", dec!(100), dec!(100.01))]), &tol));
        assert!(is_balanced(&CurrencyTotals::new(), &tol));
    }

    #[test]
    fn test_missing_currency_counts_as_zero() {
        let tol = dec!(0.001);
        let e = totals(&[("EUR", dec!(50), dec!(50)), ("USD", dec!(0), dec!(0))]);
        let l = totals(&[("EUR", dec!(50), dec!(50))]);
        let a = totals(&[("EUR", dec!(50), dec!(50))]);
        assert!(all_three_agree(&e, &l, &a, &tol));

        let a = totals(&[("EUR", dec!(50), dec!(50)), ("USD", dec!(1), dec!(1))]);
        assert!(!all_three_agree(&e, &l, &a, &tol));
    }

    #[test]
    fn test_verify_reports_every_issue() {
        let tol = dec!(0.001);
        let e = totals(&[("EUR", dec!(100), dec!(90))]);
        let l = totals(&[("EUR", dec!(100), dec!(100))]);
        let a = totals(&[("EUR", dec!(100), dec!(100))]);
        let err = verify(&e, &l, &a, &tol).unwrap_err();
        assert_eq!(err.error_code(), "BALANCE_MISMATCH");
        assert_eq!(err.issues().len(), 2);
        assert!(err.to_string().contains("entries unbalanced in EUR"));
    }

    #[test]
    fn test_config_tolerance_per_currency() {
        let config = BalanceConfig::default();
        let e = totals(&[("JPY", dec!(100), dec!(100.05))]);
        assert!(is_balanced(&e, &config));
        let e = totals(&[("EUR", dec!(100), dec!(100.05))]);
        assert!(!is_balanced(&e, &config));
    }
}
