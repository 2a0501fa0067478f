//! Server-issued identifiers
//!
//! Programs, coupons, products, partners and taxes are all identified by the
//! numeric ids the backend hands out. They are stable for the whole session,
//! so they are used directly as map keys.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

macro_rules! server_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw server id.
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// Return the raw server id.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

server_id! {
    /// Coupon or promotion program id
    ProgramId
}

server_id! {
    /// Coupon id
    CouponId
}

server_id! {
    /// Product id
    ProductId
}

server_id! {
    /// Customer (partner) id
    PartnerId
}

server_id! {
    /// Tax id
    TaxId
}

server_id! {
    /// Server-side order id, known once the order has been pushed
    OrderId
}

server_id! {
    /// Point of sale session id
    SessionId
}

/// Ordered list of tax ids applied to a line.
///
/// The order is significant: it forms the tax signature used to group
/// percentage discounts.
pub type TaxIds = SmallVec<[TaxId; 2]>;
