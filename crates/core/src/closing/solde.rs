//! Closing ("solde") and carried-forward entry synthesis.
//!
//! An account whose validated balance is not zero gets a balancing entry at
//! period end on the opposite side of its net balance. A carried-forward
//! account also gets the mirror entry at the next period's begin, which
//! re-opens the balance there.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use carnet_shared::config::{ClosingConfig, TemplateConfig};
use carnet_shared::types::{DebitCredit, Side};

use crate::ledger::{Account, EntryDraft};

/// Entries to synthesize for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoldePlan {
    /// Account being balanced.
    pub account: String,
    /// Balancing entry dated at period end.
    pub closing: EntryDraft,
    /// Mirror entry dated at the next period's begin.
    pub forward: Option<EntryDraft>,
    /// Both entries share a fresh settlement number.
    pub settle: bool,
    /// The closing entry is reconciled at period end.
    pub reconcile: bool,
}

/// Balance that closing must cancel on `balance`, or `None` within tolerance.
///
/// Returns the side and amount of the balancing entry.
#[must_use]
pub fn balancing_amount(balance: &DebitCredit, tolerance: Decimal) -> Option<(Side, Decimal)> {
    let net = balance.net();
    if net.abs() <= tolerance {
        None
    } else if net > Decimal::ZERO {
        Some((Side::Credit, net))
    } else {
        Some((Side::Debit, -net))
    }
}

fn draft_from(
    template: &TemplateConfig,
    account: &Account,
    date: NaiveDate,
    side: Side,
    amount: Decimal,
) -> EntryDraft {
    EntryDraft::new(date, &account.id, &template.ledger, &account.currency)
        .label(template.label.clone())
        .template(template.id.clone())
        .on(side, amount)
}

/// Plans the closing entries for `account`.
///
/// `next_begin` is the begin date of the period about to be opened.
#[must_use]
pub fn plan_solde(
    account: &Account,
    config: &ClosingConfig,
    period_end: NaiveDate,
    next_begin: NaiveDate,
    tolerance: Decimal,
) -> Option<SoldePlan> {
    let (side, amount) = balancing_amount(&account.balances.validated, tolerance)?;
    let closing = draft_from(&config.closing_template, account, period_end, side, amount);
    let forward = account.forward.then(|| {
        draft_from(
            &config.forward_template,
            account,
            next_begin,
            side.opposite(),
            amount,
        )
    });
    Some(SoldePlan {
        account: account.id.clone(),
        closing,
        forward,
        settle: account.settleable,
        reconcile: account.reconciliable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn account(debit: Decimal, credit: Decimal) -> Account {
        let mut account = Account::new("411", "Customers", "EUR").settleable().forward();
        account.balances.validated = DebitCredit::new(debit, credit);
        account
    }

    #[test]
    fn test_debit_balance_is_credited() {
        let plan = plan_solde(
            &account(dec!(1000), dec!(700)),
            &ClosingConfig::default(),
            d(2024, 12, 31),
            d(2025, 1, 1),
            dec!(0.001),
        )
        .unwrap();

        assert_eq!(plan.closing.amount, DebitCredit::new(dec!(0), dec!(300)));
        assert_eq!(plan.closing.effect_date, d(2024, 12, 31));
        assert_eq!(plan.closing.template.as_deref(), Some("SOLDE"));
        assert_eq!(plan.closing.ledger, "CLO");

        let forward = plan.forward.unwrap();
        assert_eq!(forward.amount, DebitCredit::new(dec!(300), dec!(0)));
        assert_eq!(forward.effect_date, d(2025, 1, 1));
        assert_eq!(forward.template.as_deref(), Some("REPORT"));
        assert!(plan.settle);
        assert!(!plan.reconcile);
    }

    #[test]
    fn test_credit_balance_is_debited() {
        assert_eq!(
            balancing_amount(&DebitCredit::new(dec!(200), dec!(450)), dec!(0.001)),
            Some((Side::Debit, dec!(250)))
        );
    }

    #[test]
    fn test_balanced_account_has_no_plan() {
        let plan = plan_solde(
            &account(dec!(500), dec!(500.0004)),
            &ClosingConfig::default(),
            d(2024, 12, 31),
            d(2025, 1, 1),
            dec!(0.001),
        );
        assert!(plan.is_none());
    }

    #[test]
    fn test_no_forward_without_flag() {
        let mut acct = account(dec!(10), dec!(0));
        acct.forward = false;
        let plan = plan_solde(
            &acct,
            &ClosingConfig::default(),
            d(2024, 12, 31),
            d(2025, 1, 1),
            dec!(0.001),
        )
        .unwrap();
        assert!(plan.forward.is_none());
    }
}
