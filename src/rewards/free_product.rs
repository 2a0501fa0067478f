//! Free product rewards

use rusty_money::Money;

use crate::{
    ids::CouponId,
    order::Order,
    prices::line_total_minor,
    products::Product,
    programs::{FreeProductReward, Program},
    quantity::compute_free_quantity,
    reasons::Reason,
    rewards::{CandidateReward, RewardError, RewardOutcome, negated},
};

/// One reward line giving away the owed units of the reward product.
pub(super) fn rewards(
    program: &Program,
    reward: &FreeProductReward,
    reward_product: &Product,
    order: &Order,
    coupon: Option<CouponId>,
) -> Result<RewardOutcome, RewardError> {
    if order.regular_lines().next().is_none() {
        return Ok(RewardOutcome::none(Reason::EmptyOrder));
    }

    let total_quantity = order
        .regular_lines()
        .filter(|line| program.rules.valid_products.contains(&line.product))
        .fold(0u32, |acc, line| acc.saturating_add(line.quantity));

    let free_quantity =
        compute_free_quantity(total_quantity, reward.buy_quantity, reward.free_quantity);

    if free_quantity == 0 {
        return Ok(RewardOutcome::none(Reason::ZeroFreeQuantity));
    }

    let price = reward_product.lst_price;
    let amount = line_total_minor(&price, free_quantity)?;

    Ok(RewardOutcome::granted(vec![CandidateReward {
        product: reward.discount_line_product,
        unit_price: negated(price.to_minor_units(), price.currency())?,
        quantity: free_quantity,
        program: program.id,
        taxes: reward_product.taxes.clone(),
        coupon,
        amount: Money::from_minor(amount, price.currency()),
        original_product: Some(reward_product.id),
    }]))
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::USD;
    use smallvec::smallvec;
    use testresult::TestResult;

    use crate::{
        ids::{ProductId, TaxId},
        order::OrderLine,
        programs::{
            Reward,
            test_support::{automatic, free_product, products, program},
        },
    };

    use super::*;

    fn pen() -> Product {
        Product {
            id: ProductId::new(10),
            name: "Pen".to_string(),
            lst_price: Money::from_minor(288, USD),
            taxes: smallvec![TaxId::new(1)],
            available_in_pos: true,
        }
    }

    fn pens(quantity: u32) -> TestResult<Order> {
        let pen = pen();

        Ok(Order::with_lines(
            [OrderLine::new(pen.id, quantity, pen.lst_price, pen.taxes)],
            USD,
        )?)
    }

    fn buy_two_take_one() -> (Program, FreeProductReward) {
        let mut program = program(1, automatic(), free_product(10, 2, 1));
        program.rules.valid_products = products(&[10]);

        let Reward::FreeProduct(reward) = program.reward.clone() else {
            unreachable!("free product program");
        };

        (program, reward)
    }

    #[test]
    fn grants_owed_units_on_discount_line_product() -> TestResult {
        let (program, reward) = buy_two_take_one();

        let outcome = rewards(&program, &reward, &pen(), &pens(5)?, None)?;

        assert_eq!(outcome.reason, None);
        assert_eq!(outcome.rewards.len(), 1);

        let Some(candidate) = outcome.rewards.first() else {
            panic!("expected a reward");
        };

        assert_eq!(candidate.product, ProductId::new(901));
        assert_eq!(candidate.quantity, 1);
        assert_eq!(candidate.unit_price, Money::from_minor(-288, USD));
        assert_eq!(candidate.amount, Money::from_minor(288, USD));
        assert_eq!(candidate.taxes.as_slice(), &[TaxId::new(1)]);
        assert_eq!(candidate.original_product, Some(ProductId::new(10)));

        Ok(())
    }

    #[test]
    fn empty_order_is_reported_before_zero_quantity() -> TestResult {
        let (program, reward) = buy_two_take_one();

        let outcome = rewards(&program, &reward, &pen(), &Order::new(USD), None)?;

        assert_eq!(outcome.reason, Some(Reason::EmptyOrder));
        assert!(outcome.rewards.is_empty());

        Ok(())
    }

    #[test]
    fn too_few_units_owe_nothing() -> TestResult {
        let (program, reward) = buy_two_take_one();

        let outcome = rewards(&program, &reward, &pen(), &pens(2)?, None)?;

        assert_eq!(outcome.reason, Some(Reason::ZeroFreeQuantity));
        assert!(outcome.rewards.is_empty());

        Ok(())
    }

    #[test]
    fn carries_coupon() -> TestResult {
        let (program, reward) = buy_two_take_one();

        let outcome = rewards(
            &program,
            &reward,
            &pen(),
            &pens(9)?,
            Some(CouponId::new(7)),
        )?;

        let Some(candidate) = outcome.rewards.first() else {
            panic!("expected a reward");
        };

        assert_eq!(candidate.coupon, Some(CouponId::new(7)));
        assert_eq!(candidate.quantity, 3);

        Ok(())
    }
}
