//! Reasons a program produced no reward
//!
//! Reasons are plain English source strings; translating them is up to the
//! caller.

use std::fmt;

use crate::ids::{CouponId, ProgramId};

/// Why a program was skipped or generated nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reason {
    /// Order total is below the program minimum.
    MinimumAmountNotReached,

    /// Not enough units of valid products.
    MinimumQuantityNotReached,

    /// The current customer is not allowed to use the program.
    CustomerNotEligible,

    /// Now is outside the program validity window.
    Expired,

    /// The program usage cap has been reached.
    UsageLimitReached,

    /// The usage counter could not be fetched.
    UsageUnavailable,

    /// The order has no lines.
    EmptyOrder,

    /// The buy/take rule grants no free unit yet.
    ZeroFreeQuantity,

    /// No line could be discounted.
    NothingToDiscount,

    /// Another global discount is larger.
    NotGreatestGlobalDiscount,
}

impl Reason {
    /// English source text shown to the cashier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MinimumAmountNotReached => "Minimum amount for this program is not satisfied.",
            Self::MinimumQuantityNotReached => "Program's minimum quantity is not satisfied.",
            Self::CustomerNotEligible => "Current customer can't avail this program.",
            Self::Expired => "Program already expired.",
            Self::UsageLimitReached => "Program's maximum number of usage has been reached.",
            Self::UsageUnavailable => "Unable to get the number of usage of the program.",
            Self::EmptyOrder => "Empty order.",
            Self::ZeroFreeQuantity => "Zero free product quantity.",
            Self::NothingToDiscount => "No items to discount.",
            Self::NotGreatestGlobalDiscount => "Not the greatest global discount.",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Program considered during a reward computation that yielded no reward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonGeneratingEntry {
    /// Program considered
    pub program: ProgramId,

    /// Coupon the program was activated with, if any
    pub coupon: Option<CouponId>,

    /// Why no reward was generated
    pub reason: Reason,
}

impl NonGeneratingEntry {
    /// Create an entry.
    pub fn new(program: ProgramId, coupon: Option<CouponId>, reason: Reason) -> Self {
        Self {
            program,
            coupon,
            reason,
        }
    }
}
