use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identity Types
// ============================================================================
//
// Row identities shared by every domain module. They mirror the relational
// store's BIGINT primary keys; ordering matters because price resolution
// tie-breaks on the numerically highest group id.
//
// ============================================================================

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

row_id!(
    /// Authenticated user, supplied by the identity layer
    UserId
);
row_id!(
    /// Sellable product
    ProductId
);
row_id!(
    /// Pricing and visibility group
    GroupId
);
row_id!(
    /// Committed order
    OrderId
);
row_id!(
    /// Price rule of a product, default or group-specific
    PriceRuleId
);
