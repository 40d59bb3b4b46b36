//! Accounts and their cached balance pairs.

use serde::{Deserialize, Serialize};
use carnet_shared::types::DebitCredit;

use super::types::EntryStatus;

/// Running-balance bucket an entry contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    /// ROUGH entries.
    Rough,
    /// VALIDATED entries.
    Validated,
    /// FUTURE entries.
    Future,
}

impl Bucket {
    /// Bucket of an entry in `status`; PAST and DELETED entries count nowhere.
    #[must_use]
    pub const fn of(status: EntryStatus) -> Option<Self> {
        match status {
            EntryStatus::Rough => Some(Self::Rough),
            EntryStatus::Validated => Some(Self::Validated),
            EntryStatus::Future => Some(Self::Future),
            EntryStatus::Past | EntryStatus::Deleted => None,
        }
    }

    /// Returns true if the bucket is part of the in-period totals.
    #[must_use]
    pub const fn is_in_period(self) -> bool {
        matches!(self, Self::Rough | Self::Validated)
    }
}

/// The four balance pairs cached on an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalances {
    /// VALIDATED entries of the period.
    pub validated: DebitCredit,
    /// ROUGH entries of the period.
    pub rough: DebitCredit,
    /// Seeded by closing from the previous period's closing balance.
    pub opening: DebitCredit,
    /// FUTURE entries.
    pub future: DebitCredit,
}

impl AccountBalances {
    fn bucket_mut(&mut self, bucket: Bucket) -> &mut DebitCredit {
        match bucket {
            Bucket::Rough => &mut self.rough,
            Bucket::Validated => &mut self.validated,
            Bucket::Future => &mut self.future,
        }
    }

    /// Adds an entry amount booked with `status`.
    pub fn add(&mut self, status: EntryStatus, amount: DebitCredit) {
        if let Some(bucket) = Bucket::of(status) {
            *self.bucket_mut(bucket) += amount;
        }
    }

    /// Removes an entry amount booked with `status`.
    pub fn remove(&mut self, status: EntryStatus, amount: DebitCredit) {
        if let Some(bucket) = Bucket::of(status) {
            *self.bucket_mut(bucket) -= amount;
        }
    }

    /// Moves an amount between the buckets of two statuses.
    pub fn transfer(&mut self, from: EntryStatus, to: EntryStatus, amount: DebitCredit) {
        self.remove(from, amount);
        self.add(to, amount);
    }

    /// In-period total: validated plus rough.
    #[must_use]
    pub fn in_period(&self) -> DebitCredit {
        self.validated + self.rough
    }

    /// Clears the in-period pairs, keeping opening and future.
    pub fn reset_running(&mut self) {
        self.validated = DebitCredit::ZERO;
        self.rough = DebitCredit::ZERO;
    }
}

/// An account of the chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Identifier (account number).
    pub id: String,
    /// Display label.
    pub label: String,
    /// Default currency of entries on this account.
    pub currency: String,
    /// Cached balances.
    pub balances: AccountBalances,
    /// Entries can be grouped into settlements.
    pub settleable: bool,
    /// Entries can be reconciled against bank statements.
    pub reconciliable: bool,
    /// Balance is carried forward on closing.
    pub forward: bool,
}

impl Account {
    /// Creates an account with no flags and zero balances.
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            currency: currency.into(),
            balances: AccountBalances::default(),
            settleable: false,
            reconciliable: false,
            forward: false,
        }
    }

    /// Marks the account settleable.
    #[must_use]
    pub fn settleable(mut self) -> Self {
        self.settleable = true;
        self
    }

    /// Marks the account reconciliable.
    #[must_use]
    pub fn reconciliable(mut self) -> Self {
        self.reconciliable = true;
        self
    }

    /// Marks the account as carried forward.
    #[must_use]
    pub fn forward(mut self) -> Self {
        self.forward = true;
        self
    }
}
