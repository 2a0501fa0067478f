//! Program rewards

use decimal_percentage::Percentage;
use rustc_hash::FxHashSet;

use crate::{ids::ProductId, prices::Price};

/// What a program grants when it applies.
#[derive(Debug, Clone)]
pub enum Reward {
    /// Buy `n` take `m` free units of a product.
    FreeProduct(FreeProductReward),

    /// Fixed or percentage discount.
    Discount(DiscountReward),
}

/// Buy `buy_quantity` take `free_quantity` reward.
#[derive(Debug, Clone)]
pub struct FreeProductReward {
    /// Units to buy (`n`), at least one
    pub buy_quantity: u32,

    /// Units given for free (`m`)
    pub free_quantity: u32,

    /// Product given away
    pub reward_product: ProductId,

    /// Product used for the reward line
    pub discount_line_product: ProductId,
}

/// Discount reward.
#[derive(Debug, Clone)]
pub struct DiscountReward {
    /// Fixed amount or percentage
    pub kind: DiscountKind,

    /// Cap on each discount line; `None` means uncapped
    pub max_amount: Option<Price>,

    /// Product used for the reward lines
    pub line_product: ProductId,
}

/// Discount computation.
#[derive(Debug, Clone)]
pub enum DiscountKind {
    /// Take a fixed amount off the order.
    FixedAmount(Price),

    /// Take a percentage off the products selected by `scope`.
    Percentage {
        /// Fraction of the base to discount
        percentage: Percentage,

        /// What the percentage applies to
        scope: DiscountScope,
    },
}

/// Lines a percentage discount applies to.
#[derive(Debug, Clone)]
pub enum DiscountScope {
    /// Lines of the listed products.
    SpecificProducts(FxHashSet<ProductId>),

    /// The single cheapest unit in the order.
    CheapestProduct,

    /// Every line of the order.
    WholeOrder,
}

impl DiscountReward {
    /// Apply `max_amount` to a minor-unit discount.
    pub fn capped(&self, minor: i64) -> i64 {
        match self.max_amount {
            Some(max) => minor.min(max.to_minor_units()),
            None => minor,
        }
    }
}
