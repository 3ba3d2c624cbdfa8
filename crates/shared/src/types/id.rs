//! Typed IDs for type-safe entity references.
//!
//! Using typed IDs prevents accidentally passing an `AccountId` where an
//! `OperationTypeId` is expected. Identifiers are store-assigned integers.

use serde::{Deserialize, Serialize};

/// Macro to generate typed ID wrappers around an integer.
macro_rules! typed_id {
    ($name:ident, $inner:ty, $doc:expr) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            /// Creates an ID from a raw store value.
            #[must_use]
            pub const fn new(value: $inner) -> Self {
                Self(value)
            }

            /// Returns the raw store value.
            #[must_use]
            pub const fn into_inner(self) -> $inner {
                self.0
            }
        }

        impl From<$inner> for $name {
            fn from(value: $inner) -> Self {
                Self(value)
            }
        }

        impl From<$name> for $inner {
            fn from(id: $name) -> Self {
                id.0
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
                Ok(Self(s.parse()?))
            }
        }
    };
}

typed_id!(AccountId, i64, "Unique identifier for a customer account.");
typed_id!(
    OperationTypeId,
    i32,
    "Identifier of an operation type (reference data)."
);
typed_id!(TransactionId, i64, "Unique identifier for a ledger transaction.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_parse() {
        let id: AccountId = "42".parse().unwrap();
        assert_eq!(id, AccountId::new(42));
        assert_eq!(id.to_string(), "42");
        assert!("abc".parse::<AccountId>().is_err());
    }

    #[test]
    fn test_serde_is_transparent() {
        let json = serde_json::to_string(&TransactionId::new(7)).unwrap();
        assert_eq!(json, "7");

        let id: OperationTypeId = serde_json::from_str("4").unwrap();
        assert_eq!(id.into_inner(), 4);
    }
}
