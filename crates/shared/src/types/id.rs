//! Typed counters for engine-assigned identifiers.
//!
//! Every identifier is drawn from one of the fiscal period's monotonic counters,
//! so they are plain integers. Wrapping them keeps a `SettlementNumber` from
//! being passed where an `EntryNumber` is expected.

use serde::{Deserialize, Serialize};

/// Macro to generate typed counter wrappers.
macro_rules! typed_number {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Wraps a raw counter value.
            #[must_use]
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the value following this one.
            #[must_use]
            pub const fn next(self) -> Self {
                Self(self.0 + 1)
            }

            /// Returns the raw counter value.
            #[must_use]
            pub const fn value(self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.trim().parse()?))
            }
        }
    };
}

typed_number!(EntryNumber, "Sequential number of an accounting entry.");
typed_number!(
    SettlementNumber,
    "Number shared by every entry of one settlement group."
);
typed_number!(ConcilementId, "Identifier of a reconciliation group.");
typed_number!(BankImportId, "Identifier of an imported bank statement file.");
typed_number!(BankLineId, "Identifier of one line of an imported bank statement.");

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_next_is_monotonic() {
        let n = EntryNumber::new(41);
        assert_eq!(n.next(), EntryNumber::new(42));
        assert!(n.next() > n);
    }

    #[test]
    fn test_parse_and_display() {
        let n = SettlementNumber::from_str(" 17 ").unwrap();
        assert_eq!(n.value(), 17);
        assert_eq!(n.to_string(), "17");
        assert!(ConcilementId::from_str("abc").is_err());
    }
}
