//! Coupon lifecycle at order finalization
//!
//! Once an order has been pushed, next-order promotions it qualified for get
//! their coupons generated, and booked coupons that ended up without a reward
//! line are handed back to the server.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use tracing::{error, info};

use crate::{
    catalog::ProgramCatalog,
    config::EngineSettings,
    ids::{CouponId, OrderId, ProgramId},
    order::{Order, OrderError, OrderLine},
    rules::RuleEvaluator,
    service::{CouponService, GeneratedCoupons, ValidateRequest},
};

/// What finalization asked of the coupon service and what it answered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinalizationReport {
    /// Next-order programs whose rules the order satisfies
    pub programs_to_generate: Vec<ProgramId>,

    /// Booked coupons without a reward line on the order
    pub unused_coupons: Vec<CouponId>,

    /// Coupons generated by the server, if the call succeeded
    pub generated: Option<GeneratedCoupons>,
}

/// Runs the finalization step for pushed orders.
#[derive(Debug, Clone)]
pub struct CouponLifecycleManager {
    catalog: Arc<ProgramCatalog>,
    rules: RuleEvaluator,
    service: Arc<dyn CouponService>,
    settings: EngineSettings,
}

impl CouponLifecycleManager {
    /// Create a manager.
    pub fn new(
        catalog: Arc<ProgramCatalog>,
        rules: RuleEvaluator,
        service: Arc<dyn CouponService>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            catalog,
            rules,
            service,
            settings,
        }
    }

    /// Generate next-order coupons and release unused ones for `order`,
    /// which the server stored under `orders`.
    ///
    /// The service call is best effort: a failure is logged and leaves the
    /// order without generated coupons.
    ///
    /// # Errors
    ///
    /// Returns an [`OrderError`] if the order totals overflow while checking rules.
    #[tracing::instrument(name = "lifecycle.on_order_finalized", skip(self, order), err)]
    pub async fn on_order_finalized(
        &self,
        order: &mut Order,
        orders: Vec<OrderId>,
    ) -> Result<FinalizationReport, OrderError> {
        if !self.settings.use_coupon_programs {
            return Ok(FinalizationReport::default());
        }

        let taxes = self.catalog.taxes();
        let mut programs_to_generate = Vec::new();

        for program in order
            .ledger()
            .active_promos()
            .iter()
            .filter_map(|id| self.catalog.program(*id))
            .filter(|program| program.is_on_next_order())
        {
            if self
                .rules
                .check_program_rules(program, order, taxes)
                .await?
                .is_eligible()
            {
                programs_to_generate.push(program.id);
            }
        }

        let rewarded: FxHashSet<CouponId> = order
            .lines()
            .iter()
            .filter_map(OrderLine::coupon)
            .collect();

        let unused_coupons: Vec<CouponId> = order
            .ledger()
            .booked_coupon_ids()
            .into_iter()
            .filter(|coupon| !rewarded.contains(coupon))
            .collect();

        let request = ValidateRequest {
            orders,
            programs_to_generate: programs_to_generate.clone(),
            unused_coupons: unused_coupons.clone(),
        };

        let generated = match self.service.validate_coupon_programs(request).await {
            Ok(generated) => {
                info!(
                    generate = programs_to_generate.len(),
                    unused = unused_coupons.len(),
                    "coupon programs validated"
                );

                order.set_generated_coupons(generated.clone());

                Some(generated)
            }
            Err(error) => {
                error!(%error, "failed to validate coupon programs");

                None
            }
        };

        Ok(FinalizationReport {
            programs_to_generate,
            unused_coupons,
            generated,
        })
    }
}
