//! Reward calculation
//!
//! Turns an eligible program into candidate reward lines. Calculations are
//! pure: they read the order and catalog and never mutate either.

use std::sync::Arc;

use rusty_money::{Money, iso::Currency};
use thiserror::Error;

use crate::{
    catalog::ProgramCatalog,
    ids::{CouponId, ProductId, ProgramId, TaxIds},
    order::{Order, OrderError, OrderLine, RewardSource},
    prices::{Price, PriceError},
    programs::{Program, Reward},
    reasons::Reason,
};

mod discount;
mod free_product;

/// Errors that can occur while calculating rewards.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RewardError {
    /// Amount arithmetic overflowed.
    #[error(transparent)]
    Price(#[from] PriceError),

    /// Order totals could not be computed.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// A program references a product missing from the catalog.
    #[error("product {0} is not in the catalog")]
    UnknownProduct(ProductId),
}

/// Reward line proposed by a program.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateReward {
    /// Product the reward line is booked on
    pub product: ProductId,

    /// Negative unit price
    pub unit_price: Price,

    /// Units
    pub quantity: u32,

    /// Program granting the reward
    pub program: ProgramId,

    /// Taxes of the reward line
    pub taxes: TaxIds,

    /// Coupon the program was activated with
    pub coupon: Option<CouponId>,

    /// Absolute value of the reward
    pub amount: Price,

    /// Product given away, for free-product rewards
    pub original_product: Option<ProductId>,
}

impl CandidateReward {
    /// Order line carrying this reward.
    pub fn into_line(self) -> OrderLine {
        OrderLine {
            product: self.product,
            quantity: self.quantity,
            unit_price: self.unit_price,
            lst_price: self.unit_price,
            taxes: self.taxes,
            reward: Some(RewardSource {
                program: self.program,
                coupon: self.coupon,
            }),
        }
    }

    /// Group key used when comparing global discounts.
    pub fn source(&self) -> RewardSource {
        RewardSource {
            program: self.program,
            coupon: self.coupon,
        }
    }
}

/// Rewards produced by one program, or why there are none.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RewardOutcome {
    /// Candidate reward lines
    pub rewards: Vec<CandidateReward>,

    /// Set when `rewards` is empty
    pub reason: Option<Reason>,
}

impl RewardOutcome {
    fn granted(rewards: Vec<CandidateReward>) -> Self {
        Self {
            rewards,
            reason: None,
        }
    }

    fn none(reason: Reason) -> Self {
        Self {
            rewards: Vec::new(),
            reason: Some(reason),
        }
    }
}

/// Computes free-product and discount rewards.
#[derive(Debug, Clone)]
pub struct RewardCalculator {
    catalog: Arc<ProgramCatalog>,
}

impl RewardCalculator {
    /// Create a calculator over `catalog`.
    pub fn new(catalog: Arc<ProgramCatalog>) -> Self {
        Self { catalog }
    }

    /// Free-product rewards of `program`.
    ///
    /// Discount programs yield nothing.
    ///
    /// # Errors
    ///
    /// Returns a [`RewardError`] if the reward product is unknown or amounts overflow.
    pub fn product_rewards(
        &self,
        program: &Program,
        order: &Order,
        coupon: Option<CouponId>,
    ) -> Result<RewardOutcome, RewardError> {
        let Reward::FreeProduct(reward) = &program.reward else {
            return Ok(RewardOutcome::default());
        };

        let reward_product = self
            .catalog
            .product(reward.reward_product)
            .ok_or(RewardError::UnknownProduct(reward.reward_product))?;

        free_product::rewards(program, reward, reward_product, order, coupon)
    }

    /// Discount rewards of `program`, taking already computed free-product
    /// rewards into account.
    ///
    /// Free-product programs yield nothing.
    ///
    /// # Errors
    ///
    /// Returns a [`RewardError`] if amounts overflow.
    pub fn discounts(
        &self,
        program: &Program,
        order: &Order,
        product_rewards: &[CandidateReward],
        coupon: Option<CouponId>,
    ) -> Result<RewardOutcome, RewardError> {
        let Reward::Discount(reward) = &program.reward else {
            return Ok(RewardOutcome::default());
        };

        discount::rewards(program, reward, order, product_rewards, coupon)
    }
}

/// `-minor` as a price.
fn negated(minor: i64, currency: &'static Currency) -> Result<Price, RewardError> {
    let minor = minor.checked_neg().ok_or(PriceError::Overflow)?;

    Ok(Money::from_minor(minor, currency))
}
