//! Reward aggregation
//!
//! Collects the programs relevant to an order, checks their rules, computes
//! their rewards bucket by bucket and keeps a single global discount.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    catalog::ProgramCatalog,
    ids::{CouponId, ProgramId},
    order::{Order, RewardSource},
    programs::{DiscountKind, DiscountScope, Program, Reward},
    reasons::{NonGeneratingEntry, Reason},
    rewards::{CandidateReward, RewardCalculator, RewardError, RewardOutcome},
    rules::{Eligibility, RuleEvaluator},
};

/// Rewards of one computation cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RewardSet {
    /// Free products, fixed amounts, specific products, then the global discount
    pub rewards: Vec<CandidateReward>,

    /// Programs considered that yielded nothing
    pub non_generating: Vec<NonGeneratingEntry>,
}

type Candidate<'a> = (&'a Program, Option<CouponId>);

#[derive(Debug, Default)]
struct Buckets<'a> {
    free_product: Vec<Candidate<'a>>,
    fixed_amount: Vec<Candidate<'a>>,
    specific_products: Vec<Candidate<'a>>,
    cheapest_product: Vec<Candidate<'a>>,
    whole_order: Vec<Candidate<'a>>,
}

impl<'a> Buckets<'a> {
    fn push(&mut self, program: &'a Program, coupon: Option<CouponId>) {
        let bucket = match &program.reward {
            Reward::FreeProduct(_) => &mut self.free_product,
            Reward::Discount(discount) => match &discount.kind {
                DiscountKind::FixedAmount(_) => &mut self.fixed_amount,
                DiscountKind::Percentage { scope, .. } => match scope {
                    DiscountScope::SpecificProducts(_) => &mut self.specific_products,
                    DiscountScope::CheapestProduct => &mut self.cheapest_product,
                    DiscountScope::WholeOrder => &mut self.whole_order,
                },
            },
        };

        bucket.push((program, coupon));
    }
}

/// Orchestrates rule checks and reward calculation for an order.
#[derive(Debug, Clone)]
pub struct RewardAggregator {
    catalog: Arc<ProgramCatalog>,
    rules: RuleEvaluator,
    calculator: RewardCalculator,
}

impl RewardAggregator {
    /// Create an aggregator.
    pub fn new(catalog: Arc<ProgramCatalog>, rules: RuleEvaluator) -> Self {
        Self {
            calculator: RewardCalculator::new(Arc::clone(&catalog)),
            catalog,
            rules,
        }
    }

    /// Compute the rewards owed to `order` given its activation ledger.
    ///
    /// Booked coupon programs and active current-order promotions are checked
    /// against their rules; promotions booked through a coupon are not.
    ///
    /// # Errors
    ///
    /// Returns a [`RewardError`] if amounts overflow or a reward product is unknown.
    #[tracing::instrument(
        name = "aggregator.compute_rewards",
        skip(self, order),
        fields(lines = order.len()),
        err
    )]
    pub async fn compute_rewards(&self, order: &Order) -> Result<RewardSet, RewardError> {
        let ledger = order.ledger();
        let taxes = self.catalog.taxes();

        let mut buckets = Buckets::default();
        let mut non_generating = Vec::new();

        for booked in ledger.booked() {
            let Some(program) = self.program(booked.program) else {
                continue;
            };

            if program.is_coupon() {
                match self.rules.check_program_rules(program, order, taxes).await? {
                    Eligibility::Eligible => buckets.push(program, Some(booked.coupon)),
                    Eligibility::Ineligible(reason) => non_generating.push(
                        NonGeneratingEntry::new(program.id, Some(booked.coupon), reason),
                    ),
                }
            }
        }

        for booked in ledger.booked() {
            if let Some(program) = self.program(booked.program)
                && !program.is_coupon()
            {
                buckets.push(program, Some(booked.coupon));
            }
        }

        for &id in ledger.active_promos() {
            let Some(program) = self.program(id) else {
                continue;
            };

            if !program.is_on_current_order() {
                continue;
            }

            match self.rules.check_program_rules(program, order, taxes).await? {
                Eligibility::Eligible => buckets.push(program, None),
                Eligibility::Ineligible(reason) => {
                    non_generating.push(NonGeneratingEntry::new(program.id, None, reason));
                }
            }
        }

        let mut free_products = Vec::new();

        for &(program, coupon) in &buckets.free_product {
            let outcome = self.calculator.product_rewards(program, order, coupon)?;
            collect(program, coupon, outcome, &mut free_products, &mut non_generating);
        }

        let mut rewards = free_products.clone();

        for &(program, coupon) in buckets
            .fixed_amount
            .iter()
            .chain(&buckets.specific_products)
        {
            let outcome = self
                .calculator
                .discounts(program, order, &free_products, coupon)?;
            collect(program, coupon, outcome, &mut rewards, &mut non_generating);
        }

        let mut global = Vec::new();

        for &(program, coupon) in buckets
            .cheapest_product
            .iter()
            .chain(&buckets.whole_order)
        {
            let outcome = self
                .calculator
                .discounts(program, order, &free_products, coupon)?;
            collect(program, coupon, outcome, &mut global, &mut non_generating);
        }

        rewards.extend(greatest_global_discount(global, &mut non_generating));

        Ok(RewardSet {
            rewards,
            non_generating,
        })
    }

    fn program(&self, id: ProgramId) -> Option<&Program> {
        let program = self.catalog.program(id);

        if program.is_none() {
            warn!(program = %id, "active program missing from catalog");
        }

        program
    }
}

fn collect(
    program: &Program,
    coupon: Option<CouponId>,
    outcome: RewardOutcome,
    rewards: &mut Vec<CandidateReward>,
    non_generating: &mut Vec<NonGeneratingEntry>,
) {
    if let Some(reason) = outcome.reason {
        debug!(program = %program.id, %reason, "program generated no reward");
        non_generating.push(NonGeneratingEntry::new(program.id, coupon, reason));
    }

    rewards.extend(outcome.rewards);
}

/// Keep the (program, coupon) group with the strictly greatest total; the
/// first group wins ties.
fn greatest_global_discount(
    discounts: Vec<CandidateReward>,
    non_generating: &mut Vec<NonGeneratingEntry>,
) -> Vec<CandidateReward> {
    let mut groups: Vec<(RewardSource, Vec<CandidateReward>, i64)> = Vec::new();

    for discount in discounts {
        let source = discount.source();
        let amount = discount.amount.to_minor_units();

        if let Some((_, members, total)) = groups.iter_mut().find(|(key, ..)| *key == source) {
            *total = total.saturating_add(amount);
            members.push(discount);
        } else {
            groups.push((source, vec![discount], amount));
        }
    }

    let mut winner: Option<usize> = None;
    let mut best = 0i64;

    for (position, (_, _, total)) in groups.iter().enumerate() {
        if *total > best {
            best = *total;
            winner = Some(position);
        }
    }

    let Some(winner) = winner else {
        return Vec::new();
    };

    let mut kept = Vec::new();

    for (position, (source, members, _)) in groups.into_iter().enumerate() {
        if position == winner {
            kept = members;
        } else {
            non_generating.push(NonGeneratingEntry::new(
                source.program,
                source.coupon,
                Reason::NotGreatestGlobalDiscount,
            ));
        }
    }

    kept
}
