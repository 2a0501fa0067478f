//! Program rules

use jiff::Timestamp;
use rustc_hash::FxHashSet;
use rusty_money::iso::Currency;

use crate::{
    ids::{PartnerId, ProductId},
    prices::{Price, zero},
};

/// Which order total the minimum amount is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxMode {
    /// Compare against the total including taxes.
    TaxIncluded,

    /// Compare against the untaxed total.
    TaxExcluded,
}

/// Conditions an order must meet for a program to reward it.
#[derive(Debug, Clone)]
pub struct ProgramRules {
    /// Minimum order total
    pub minimum_amount: Price,

    /// Whether `minimum_amount` includes taxes
    pub minimum_amount_tax: TaxMode,

    /// Minimum quantity of valid products
    pub min_quantity: u32,

    /// Products counted towards `min_quantity`
    pub valid_products: FxHashSet<ProductId>,

    /// Customers allowed to use the program; empty means anyone
    pub valid_partners: FxHashSet<PartnerId>,

    /// Start of the validity window, unbounded if `None`
    pub date_from: Option<Timestamp>,

    /// End of the validity window, unbounded if `None`
    pub date_to: Option<Timestamp>,

    /// Maximum number of usages; zero means unlimited
    pub max_usage: u32,
}

impl ProgramRules {
    /// Rules every order satisfies.
    pub fn unrestricted(currency: &'static Currency) -> Self {
        Self {
            minimum_amount: zero(currency),
            minimum_amount_tax: TaxMode::TaxIncluded,
            min_quantity: 0,
            valid_products: FxHashSet::default(),
            valid_partners: FxHashSet::default(),
            date_from: None,
            date_to: None,
            max_usage: 0,
        }
    }

    /// Whether `customer` may use the program.
    pub fn accepts_customer(&self, customer: Option<PartnerId>) -> bool {
        self.valid_partners.is_empty()
            || customer.is_some_and(|customer| self.valid_partners.contains(&customer))
    }

    /// Whether `now` falls inside the validity window, bounds included.
    pub fn is_active_at(&self, now: Timestamp) -> bool {
        self.date_from.is_none_or(|from| now >= from) && self.date_to.is_none_or(|to| now <= to)
    }

    /// Usage cap, if the program has one.
    pub fn usage_cap(&self) -> Option<u32> {
        (self.max_usage > 0).then_some(self.max_usage)
    }
}
