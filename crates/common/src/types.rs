use serde::{Deserialize, Serialize};

/// Defines a type-safe identifier wrapping a database `BIGINT` key.
///
/// Each entity gets its own id type so that a `WineId` can never be passed
/// where an `OrderId` is expected.
#[macro_export]
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an id from its raw database value.
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Returns the raw database value.
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// Identifier of a registered user. Also the identifier of that user's cart.
    UserId
);
define_id!(
    /// Identifier of a role row.
    RoleId
);
define_id!(
    /// Identifier of a wine in the catalog.
    WineId
);
define_id!(
    /// Identifier of a wine region.
    RegionId
);
define_id!(
    /// Identifier of a single line in a shopping cart.
    CartItemId
);
define_id!(
    /// Identifier of an order.
    OrderId
);
define_id!(
    /// Identifier of a line inside an order.
    OrderItemId
);
define_id!(
    /// Identifier of a wine review.
    ReviewId
);

/// A shopping cart shares its identity with the user that owns it.
pub type CartId = UserId;

/// Monotonic id sequence used by stores that allocate keys themselves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdSequence {
    last: i64,
}

impl IdSequence {
    /// Creates a sequence whose first allocated value is `1`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next value.
    pub fn next_id<T: From<i64>>(&mut self) -> T {
        self.last += 1;
        T::from(self.last)
    }
}
