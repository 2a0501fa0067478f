//! Discount rewards
//!
//! Fixed amounts produce a single untaxed line. Percentages are computed per
//! tax signature so that each discount line carries the taxes of the lines
//! it discounts.

use rusty_money::{Money, iso::Currency};
use smallvec::SmallVec;

use crate::{
    ids::{CouponId, ProductId, TaxIds},
    order::Order,
    prices::{PriceError, percent_of_minor},
    programs::{DiscountKind, DiscountReward, DiscountScope, Program},
    reasons::Reason,
    rewards::{CandidateReward, RewardError, RewardOutcome, negated},
};

/// Discount base per tax signature, in first-seen order.
#[derive(Debug, Default)]
struct TaxGroups {
    groups: Vec<(TaxIds, i64)>,
}

impl TaxGroups {
    fn add(&mut self, taxes: &TaxIds, amount: i64) -> Result<(), PriceError> {
        if let Some((_, total)) = self.groups.iter_mut().find(|(key, _)| key == taxes) {
            *total = total.checked_add(amount).ok_or(PriceError::Overflow)?;
        } else {
            self.groups.push((taxes.clone(), amount));
        }

        Ok(())
    }
}

pub(super) fn rewards(
    program: &Program,
    reward: &DiscountReward,
    order: &Order,
    product_rewards: &[CandidateReward],
    coupon: Option<CouponId>,
) -> Result<RewardOutcome, RewardError> {
    let currency = order.currency();

    let (percentage, scope) = match &reward.kind {
        DiscountKind::FixedAmount(amount) => {
            let amount = reward.capped(amount.to_minor_units());

            return Ok(RewardOutcome::granted(vec![discount_line(
                program,
                reward,
                TaxIds::new(),
                amount,
                currency,
                coupon,
            )?]));
        }
        DiscountKind::Percentage { percentage, scope } => (percentage, scope),
    };

    let mut groups = TaxGroups::default();
    let mut accounted: SmallVec<[ProductId; 8]> = SmallVec::new();

    match scope {
        DiscountScope::SpecificProducts(products) => {
            for line in order
                .regular_lines()
                .filter(|line| products.contains(&line.product))
            {
                groups.add(&line.taxes, line.list_total_minor()?)?;
                accounted.push(line.product);
            }
        }
        DiscountScope::CheapestProduct => {
            let cheapest = order.regular_lines().reduce(|cheapest, line| {
                if line.lst_price.to_minor_units() < cheapest.lst_price.to_minor_units() {
                    line
                } else {
                    cheapest
                }
            });

            if let Some(line) = cheapest {
                groups.add(&line.taxes, line.lst_price.to_minor_units())?;
            }
        }
        DiscountScope::WholeOrder => {
            for line in order.regular_lines() {
                groups.add(&line.taxes, line.list_total_minor()?)?;
                accounted.push(line.product);
            }
        }
    }

    // Free units of accounted products are not discounted again.
    for product_reward in product_rewards {
        if product_reward
            .original_product
            .is_some_and(|product| accounted.contains(&product))
        {
            let granted = product_reward
                .unit_price
                .to_minor_units()
                .checked_mul(i64::from(product_reward.quantity))
                .ok_or(PriceError::Overflow)?;

            groups.add(&product_reward.taxes, granted)?;
        }
    }

    let mut rewards = Vec::with_capacity(groups.groups.len());

    for (taxes, base) in groups.groups {
        let amount = reward.capped(percent_of_minor(percentage, base)?);

        if amount > 0 {
            rewards.push(discount_line(
                program, reward, taxes, amount, currency, coupon,
            )?);
        }
    }

    if rewards.is_empty() {
        return Ok(RewardOutcome::none(Reason::NothingToDiscount));
    }

    Ok(RewardOutcome::granted(rewards))
}

fn discount_line(
    program: &Program,
    reward: &DiscountReward,
    taxes: TaxIds,
    amount: i64,
    currency: &'static Currency,
    coupon: Option<CouponId>,
) -> Result<CandidateReward, RewardError> {
    Ok(CandidateReward {
        product: reward.line_product,
        unit_price: negated(amount, currency)?,
        quantity: 1,
        program: program.id,
        taxes,
        coupon,
        amount: Money::from_minor(amount, currency),
        original_product: None,
    })
}
