//! Debit/credit pairs with decimal precision.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Every amount is a `rust_decimal::Decimal`.

use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of an amount in double-entry bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Debit side.
    Debit,
    /// Credit side.
    Credit,
}

impl Side {
    /// Returns the other side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Debit => Self::Credit,
            Self::Credit => Self::Debit,
        }
    }
}

/// A `(debit, credit)` pair.
///
/// Used both for a single entry's amount and for running totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebitCredit {
    /// Debit total.
    pub debit: Decimal,
    /// Credit total.
    pub credit: Decimal,
}

impl DebitCredit {
    /// The zero pair.
    pub const ZERO: Self = Self {
        debit: Decimal::ZERO,
        credit: Decimal::ZERO,
    };

    /// Creates a new pair.
    #[must_use]
    pub const fn new(debit: Decimal, credit: Decimal) -> Self {
        Self { debit, credit }
    }

    /// Creates a one-sided pair.
    #[must_use]
    pub fn on(side: Side, amount: Decimal) -> Self {
        match side {
            Side::Debit => Self::new(amount, Decimal::ZERO),
            Side::Credit => Self::new(Decimal::ZERO, amount),
        }
    }

    /// Returns `debit - credit`.
    #[must_use]
    pub fn net(&self) -> Decimal {
        self.debit - self.credit
    }

    /// Returns true if both sides are exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.debit.is_zero() && self.credit.is_zero()
    }

    /// Returns true if debit and credit are equal within `tolerance`.
    #[must_use]
    pub fn is_balanced(&self, tolerance: Decimal) -> bool {
        self.net().abs() <= tolerance
    }

    /// Returns true if both sides match `other` within `tolerance`.
    #[must_use]
    pub fn agrees_with(&self, other: &Self, tolerance: Decimal) -> bool {
        (self.debit - other.debit).abs() <= tolerance
            && (self.credit - other.credit).abs() <= tolerance
    }
}

impl Add for DebitCredit {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.debit + rhs.debit, self.credit + rhs.credit)
    }
}

impl AddAssign for DebitCredit {
    fn add_assign(&mut self, rhs: Self) {
        self.debit += rhs.debit;
        self.credit += rhs.credit;
    }
}

impl Sub for DebitCredit {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.debit - rhs.debit, self.credit - rhs.credit)
    }
}

impl SubAssign for DebitCredit {
    fn sub_assign(&mut self, rhs: Self) {
        self.debit -= rhs.debit;
        self.credit -= rhs.credit;
    }
}

impl Neg for DebitCredit {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.debit, -self.credit)
    }
}

/// Default number of fractional digits stored for an ISO 4217 currency.
#[must_use]
pub fn currency_digits(code: &str) -> u32 {
    match code.to_uppercase().as_str() {
        "JPY" | "KRW" | "XOF" | "XAF" | "CLP" | "ISK" | "VND" => 0,
        "BHD" | "KWD" | "OMR" | "TND" | "JOD" | "LYD" => 3,
        _ => 2,
    }
}

/// Comparison tolerance for a currency stored with `digits` fractional digits.
///
/// One tenth of the smallest stored unit: 0.001 for a two-digit currency.
#[must_use]
pub fn tolerance_for_digits(digits: u32) -> Decimal {
    Decimal::new(1, digits + 1)
}
