//! Rule evaluation
//!
//! Decides whether a program may reward an order. Local checks run first;
//! the remote usage counter is queried last and only for capped programs.

use std::{fmt::Debug, sync::Arc};

use jiff::Timestamp;
use tracing::{debug, warn};

use crate::{
    order::{Order, OrderError},
    products::TaxTable,
    programs::{Program, TaxMode},
    reasons::Reason,
    service::CouponService,
};

/// Source of the current time.
pub trait Clock: Debug + Send + Sync {
    /// Current instant.
    fn now(&self) -> Timestamp;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Clock frozen at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

/// Result of checking a program against an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// The program may reward the order.
    Eligible,

    /// The program may not reward the order.
    Ineligible(Reason),
}

impl Eligibility {
    /// Whether the program is eligible.
    pub fn is_eligible(self) -> bool {
        matches!(self, Self::Eligible)
    }
}

/// Checks program rules against orders.
#[derive(Debug, Clone)]
pub struct RuleEvaluator {
    service: Arc<dyn CouponService>,
    clock: Arc<dyn Clock>,
}

impl RuleEvaluator {
    /// Create an evaluator.
    pub fn new(service: Arc<dyn CouponService>, clock: Arc<dyn Clock>) -> Self {
        Self { service, clock }
    }

    /// Check `program` against `order`, short-circuiting on the first failed rule.
    ///
    /// Coupon programs only go through the amount and quantity checks. A
    /// failing usage count query makes the program ineligible.
    ///
    /// # Errors
    ///
    /// Returns an [`OrderError`] if the order total overflows.
    #[tracing::instrument(
        name = "rules.check_program_rules",
        skip(self, program, order, taxes),
        fields(program = %program.id)
    )]
    pub async fn check_program_rules(
        &self,
        program: &Program,
        order: &Order,
        taxes: &TaxTable,
    ) -> Result<Eligibility, OrderError> {
        let rules = &program.rules;

        let amount = match rules.minimum_amount_tax {
            TaxMode::TaxIncluded => order.total_with_tax(taxes)?,
            TaxMode::TaxExcluded => order.total_without_tax()?,
        };

        if amount.to_minor_units() < rules.minimum_amount.to_minor_units() {
            return Ok(ineligible(Reason::MinimumAmountNotReached));
        }

        let valid_quantity = order.quantity_where(|product| rules.valid_products.contains(&product));

        if valid_quantity < rules.min_quantity {
            return Ok(ineligible(Reason::MinimumQuantityNotReached));
        }

        if program.is_coupon() {
            return Ok(Eligibility::Eligible);
        }

        if !rules.accepts_customer(order.customer()) {
            return Ok(ineligible(Reason::CustomerNotEligible));
        }

        if !rules.is_active_at(self.clock.now()) {
            return Ok(ineligible(Reason::Expired));
        }

        if let Some(cap) = rules.usage_cap() {
            match self.service.program_usage_count(program.id).await {
                Ok(used) if used >= cap => {
                    return Ok(ineligible(Reason::UsageLimitReached));
                }
                Ok(_) => {}
                Err(error) => {
                    warn!(program = %program.id, %error, "failed to fetch program usage");

                    return Ok(ineligible(Reason::UsageUnavailable));
                }
            }
        }

        Ok(Eligibility::Eligible)
    }
}

fn ineligible(reason: Reason) -> Eligibility {
    debug!(%reason, "program ineligible");

    Eligibility::Ineligible(reason)
}

#[cfg(test)]
mod tests {
    use jiff::ToSpan;
    use mockall::predicate::eq;
    use rusty_money::{Money, iso::USD};
    use smallvec::smallvec;
    use testresult::TestResult;

    use crate::{
        ids::{PartnerId, ProductId, ProgramId, TaxId},
        order::OrderLine,
        products::Tax,
        programs::{
            ProgramKind,
            test_support::{automatic, products, program, whole_order},
        },
        service::{MockCouponService, ServiceError},
    };

    use super::*;

    fn now() -> TestResult<Timestamp> {
        Ok("2024-06-01T12:00:00Z".parse()?)
    }

    fn evaluator(service: MockCouponService) -> TestResult<RuleEvaluator> {
        Ok(RuleEvaluator::new(
            Arc::new(service),
            Arc::new(FixedClock(now()?)),
        ))
    }

    fn order(quantity: u32, unit_minor: i64) -> TestResult<Order> {
        Ok(Order::with_lines(
            [OrderLine::new(
                ProductId::new(1),
                quantity,
                Money::from_minor(unit_minor, USD),
                smallvec![TaxId::new(1)],
            )],
            USD,
        )?)
    }

    fn taxes() -> TaxTable {
        TaxTable::new([Tax {
            id: TaxId::new(1),
            name: "Sales tax".to_string(),
            rate: decimal_percentage::Percentage::from(0.1),
        }])
    }

    #[tokio::test]
    async fn minimum_amount_respects_tax_mode() -> TestResult {
        let evaluator = evaluator(MockCouponService::new())?;
        let order = order(1, 1000)?;

        let mut promo = program(1, automatic(), whole_order(0.1));
        promo.rules.minimum_amount = Money::from_minor(1050, USD);

        assert_eq!(
            evaluator
                .check_program_rules(&promo, &order, &taxes())
                .await?,
            Eligibility::Eligible
        );

        promo.rules.minimum_amount_tax = TaxMode::TaxExcluded;

        assert_eq!(
            evaluator
                .check_program_rules(&promo, &order, &taxes())
                .await?,
            Eligibility::Ineligible(Reason::MinimumAmountNotReached)
        );

        Ok(())
    }

    #[tokio::test]
    async fn minimum_quantity_counts_valid_products_only() -> TestResult {
        let evaluator = evaluator(MockCouponService::new())?;
        let order = order(3, 100)?;

        let mut promo = program(1, automatic(), whole_order(0.1));
        promo.rules.min_quantity = 3;
        promo.rules.valid_products = products(&[2]);

        assert_eq!(
            evaluator
                .check_program_rules(&promo, &order, &taxes())
                .await?,
            Eligibility::Ineligible(Reason::MinimumQuantityNotReached)
        );

        promo.rules.valid_products = products(&[1, 2]);

        assert!(
            evaluator
                .check_program_rules(&promo, &order, &taxes())
                .await?
                .is_eligible()
        );

        Ok(())
    }

    #[tokio::test]
    async fn coupon_programs_skip_customer_date_and_usage_checks() -> TestResult {
        let mut service = MockCouponService::new();
        service.expect_program_usage_count().never();

        let evaluator = evaluator(service)?;
        let order = order(1, 100)?;

        let mut coupon = program(1, ProgramKind::Coupon, whole_order(0.1));
        coupon.rules.valid_partners = [PartnerId::new(9)].into_iter().collect();
        coupon.rules.date_to = Some(now()? - 1.hour());
        coupon.rules.max_usage = 1;

        assert!(
            evaluator
                .check_program_rules(&coupon, &order, &taxes())
                .await?
                .is_eligible()
        );

        Ok(())
    }

    #[tokio::test]
    async fn customer_must_be_listed() -> TestResult {
        let evaluator = evaluator(MockCouponService::new())?;
        let mut order = order(1, 100)?;

        let mut promo = program(1, automatic(), whole_order(0.1));
        promo.rules.valid_partners = [PartnerId::new(9)].into_iter().collect();

        assert_eq!(
            evaluator
                .check_program_rules(&promo, &order, &taxes())
                .await?,
            Eligibility::Ineligible(Reason::CustomerNotEligible)
        );

        order.set_customer(Some(PartnerId::new(9)));

        assert!(
            evaluator
                .check_program_rules(&promo, &order, &taxes())
                .await?
                .is_eligible()
        );

        Ok(())
    }

    #[tokio::test]
    async fn date_window_is_inclusive() -> TestResult {
        let evaluator = evaluator(MockCouponService::new())?;
        let order = order(1, 100)?;

        let mut promo = program(1, automatic(), whole_order(0.1));
        promo.rules.date_from = Some(now()?);
        promo.rules.date_to = Some(now()?);

        assert!(
            evaluator
                .check_program_rules(&promo, &order, &taxes())
                .await?
                .is_eligible()
        );

        promo.rules.date_to = Some(now()? - 1.second());

        assert_eq!(
            evaluator
                .check_program_rules(&promo, &order, &taxes())
                .await?,
            Eligibility::Ineligible(Reason::Expired)
        );

        Ok(())
    }

    #[tokio::test]
    async fn usage_cap_reached() -> TestResult {
        let mut service = MockCouponService::new();
        service
            .expect_program_usage_count()
            .with(eq(ProgramId::new(1)))
            .once()
            .returning(|_| Ok(5));

        let evaluator = evaluator(service)?;
        let order = order(1, 100)?;

        let mut promo = program(1, automatic(), whole_order(0.1));
        promo.rules.max_usage = 5;

        let eligibility = evaluator
            .check_program_rules(&promo, &order, &taxes())
            .await?;

        let Eligibility::Ineligible(reason) = eligibility else {
            panic!("expected program to be ineligible");
        };

        assert!(
            reason
                .as_str()
                .ends_with("maximum number of usage has been reached.")
        );

        Ok(())
    }

    #[tokio::test]
    async fn usage_query_failure_fails_closed() -> TestResult {
        let mut service = MockCouponService::new();
        service.expect_program_usage_count().once().returning(|_| {
            Err(ServiceError::UnexpectedResponse(
                "connection reset".to_string(),
            ))
        });

        let evaluator = evaluator(service)?;
        let order = order(1, 100)?;

        let mut promo = program(1, automatic(), whole_order(0.1));
        promo.rules.max_usage = 5;

        assert_eq!(
            evaluator
                .check_program_rules(&promo, &order, &taxes())
                .await?,
            Eligibility::Ineligible(Reason::UsageUnavailable)
        );

        Ok(())
    }

    #[tokio::test]
    async fn usage_below_cap_is_eligible() -> TestResult {
        let mut service = MockCouponService::new();
        service
            .expect_program_usage_count()
            .once()
            .returning(|_| Ok(4));

        let evaluator = evaluator(service)?;
        let order = order(1, 100)?;

        let mut promo = program(1, automatic(), whole_order(0.1));
        promo.rules.max_usage = 5;

        assert!(
            evaluator
                .check_program_rules(&promo, &order, &taxes())
                .await?
                .is_eligible()
        );

        Ok(())
    }
}
