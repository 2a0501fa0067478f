//! Order reward synchronization
//!
//! Owns the active order and keeps its reward lines in step with the
//! programs that apply to it. Updates are serialized through the order lock;
//! a refresh requested while another one is already queued is dropped, since
//! the queued one will see the latest order state.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use rustc_hash::FxHashSet;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::{
    aggregator::RewardAggregator,
    catalog::ProgramCatalog,
    config::EngineSettings,
    ids::{CouponId, ProgramId},
    ledger::{Booking, CouponBooker, CouponError, ResetOutcome},
    order::{Order, OrderLine},
    reasons::NonGeneratingEntry,
    rewards::RewardError,
    service::{CouponService, CouponState},
};

/// Result of a reward update.
#[derive(Debug)]
pub enum UpdateOutcome {
    /// Reward lines were recomputed.
    Applied(RewardReport),

    /// Another refresh was already queued and will cover this one.
    Coalesced,

    /// Programs are disabled for this point of sale.
    Disabled,
}

impl UpdateOutcome {
    /// Report of an applied update.
    pub fn report(&self) -> Option<&RewardReport> {
        match self {
            Self::Applied(report) => Some(report),
            Self::Coalesced | Self::Disabled => None,
        }
    }
}

/// What an applied update did.
#[derive(Debug)]
pub struct RewardReport {
    /// Result of activating the code passed to the update, if any
    pub booking: Option<Result<Booking, CouponError>>,

    /// Reward lines removed before recomputation
    pub removed: usize,

    /// Reward lines added
    pub added: usize,

    /// Programs that yielded nothing this cycle
    pub non_generating: Vec<NonGeneratingEntry>,
}

/// Activation dropped because its reward line was removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deactivation {
    /// A booked coupon was released.
    Coupon {
        /// Code the coupon was booked under
        code: String,

        /// Released coupon
        coupon: CouponId,
    },

    /// A promotion program was deactivated.
    Program {
        /// Program id
        program: ProgramId,

        /// Program name
        name: String,
    },
}

impl fmt::Display for Deactivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Coupon { code, .. } => write!(f, "Coupon ({code}) has been deactivated."),
            Self::Program { name, .. } => write!(f, "'{name}' program has been deactivated."),
        }
    }
}

/// Result of removing a line.
#[derive(Debug)]
pub struct LineRemoval {
    /// Lines removed, including reward lines of the same program
    pub removed: Vec<OrderLine>,

    /// Activation dropped along with a reward line
    pub deactivated: Option<Deactivation>,

    /// Reward update that followed the removal
    pub update: UpdateOutcome,
}

impl LineRemoval {
    /// Whether reward lines other than the selected one were removed.
    pub fn removed_siblings(&self) -> bool {
        self.removed.len() > 1
    }
}

/// Result of the "reset programs" action.
#[derive(Debug)]
pub struct ProgramsReset {
    /// Ledger reset
    pub reset: ResetOutcome,

    /// Reward update that followed
    pub update: UpdateOutcome,
}

/// Promotion program shown as active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivePromo {
    /// Program name
    pub name: String,

    /// Promo code, if any
    pub promo_code: Option<String>,
}

/// Booked coupon shown as active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveCoupon {
    /// Program name
    pub program_name: String,

    /// Code as scanned
    pub coupon_code: String,
}

/// Programs to show next to the order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveProgramsSummary {
    /// Current-order promotions that generated rewards
    pub with_rewards_promo_programs: Vec<ActivePromo>,

    /// Booked coupons that generated rewards
    pub with_rewards_booked_coupons: Vec<ActiveCoupon>,

    /// Next-order promotions that will generate a coupon
    pub on_next_order_promo_programs: Vec<String>,
}

impl ActiveProgramsSummary {
    /// Whether there is nothing to show.
    pub fn is_empty(&self) -> bool {
        self.with_rewards_promo_programs.is_empty()
            && self.with_rewards_booked_coupons.is_empty()
            && self.on_next_order_promo_programs.is_empty()
    }
}

/// Keeps the reward lines of one order up to date.
#[derive(Debug)]
pub struct OrderRewardSynchronizer {
    catalog: Arc<ProgramCatalog>,
    aggregator: RewardAggregator,
    booker: CouponBooker,
    service: Arc<dyn CouponService>,
    settings: EngineSettings,
    order: Mutex<Order>,
    refresh_waiting: AtomicBool,
}

impl OrderRewardSynchronizer {
    /// Create a synchronizer owning `order`.
    pub fn new(
        catalog: Arc<ProgramCatalog>,
        aggregator: RewardAggregator,
        booker: CouponBooker,
        service: Arc<dyn CouponService>,
        settings: EngineSettings,
        order: Order,
    ) -> Self {
        Self {
            catalog,
            aggregator,
            booker,
            service,
            settings,
            order: Mutex::new(order),
            refresh_waiting: AtomicBool::new(false),
        }
    }

    /// Exclusive access to the order, e.g. to edit regular lines.
    pub async fn order(&self) -> MutexGuard<'_, Order> {
        self.order.lock().await
    }

    /// Give the order back.
    pub fn into_order(self) -> Order {
        self.order.into_inner()
    }

    /// Activate `code` if given, then replace the order's reward lines with
    /// freshly computed ones.
    ///
    /// A code that cannot be activated is reported in the outcome and does
    /// not prevent the recomputation.
    ///
    /// # Errors
    ///
    /// Returns a [`RewardError`] if the rewards cannot be computed.
    #[tracing::instrument(
        name = "sync.update_rewards",
        skip(self, code),
        fields(with_code = code.is_some()),
        err
    )]
    pub async fn update_rewards(&self, code: Option<&str>) -> Result<UpdateOutcome, RewardError> {
        if !self.settings.use_coupon_programs {
            return Ok(UpdateOutcome::Disabled);
        }

        if code.is_none() && self.refresh_waiting.swap(true, Ordering::AcqRel) {
            debug!("refresh already queued");

            return Ok(UpdateOutcome::Coalesced);
        }

        // Clears the queued flag even if this future is dropped while waiting.
        let queued = code
            .is_none()
            .then(|| QueuedRefresh(&self.refresh_waiting));

        let mut order = self.order.lock().await;

        drop(queued);

        let booking = match code {
            Some(code) => {
                let customer = order.customer();
                let booking = self
                    .booker
                    .book_code(order.ledger_mut(), code, customer)
                    .await;

                if let Err(error) = &booking {
                    info!(%error, "code not activated");
                }

                Some(booking)
            }
            None => None,
        };

        let report = self.recompute(&mut order, booking).await?;

        Ok(UpdateOutcome::Applied(report))
    }

    /// Remove the line at `index`.
    ///
    /// Removing a reward line removes every reward line of its program and
    /// deactivates the coupon or promotion program that produced it. Rewards
    /// are recomputed afterwards.
    ///
    /// # Errors
    ///
    /// Returns a [`RewardError`] if there is no line at `index` or the rewards
    /// cannot be recomputed.
    #[tracing::instrument(name = "sync.remove_line", skip(self), err)]
    pub async fn remove_line(&self, index: usize) -> Result<LineRemoval, RewardError> {
        let mut order = self.order.lock().await;

        let Some(source) = order.line(index)?.reward else {
            let removed = order.remove_line(index)?;
            let update = self.refresh_locked(&mut order).await?;

            return Ok(LineRemoval {
                removed: vec![removed],
                deactivated: None,
                update,
            });
        };

        let removed = order.remove_program_rewards(source.program);

        let deactivated = match source.coupon {
            Some(coupon) => match order.ledger_mut().release_coupon(coupon) {
                Some(booked) => {
                    if let Err(error) = self
                        .service
                        .set_coupon_state(vec![coupon], CouponState::New)
                        .await
                    {
                        warn!(%coupon, %error, "failed to release coupon");
                    }

                    Some(Deactivation::Coupon {
                        code: booked.code,
                        coupon,
                    })
                }
                None => None,
            },
            None => order
                .ledger_mut()
                .deactivate_promo(source.program)
                .then(|| Deactivation::Program {
                    program: source.program,
                    name: self
                        .catalog
                        .program(source.program)
                        .map(|program| program.name.clone())
                        .unwrap_or_default(),
                }),
        };

        if let Some(deactivation) = &deactivated {
            info!(program = %source.program, %deactivation, removed = removed.len());
        }

        let update = self.refresh_locked(&mut order).await?;

        Ok(LineRemoval {
            removed,
            deactivated,
            update,
        })
    }

    /// Reset the activation ledger, then recompute rewards.
    ///
    /// # Errors
    ///
    /// Returns a [`RewardError`] if the rewards cannot be computed.
    #[tracing::instrument(name = "sync.reset_programs", skip(self), err)]
    pub async fn reset_programs(&self) -> Result<ProgramsReset, RewardError> {
        let mut order = self.order.lock().await;

        let reset = self.booker.reset(order.ledger_mut()).await;
        let update = self.refresh_locked(&mut order).await?;

        Ok(ProgramsReset { reset, update })
    }

    /// Programs to show as active after the last update.
    pub async fn active_programs_summary(&self) -> ActiveProgramsSummary {
        let order = self.order.lock().await;

        summarize(&order, &self.catalog)
    }

    async fn refresh_locked(&self, order: &mut Order) -> Result<UpdateOutcome, RewardError> {
        if !self.settings.use_coupon_programs {
            return Ok(UpdateOutcome::Disabled);
        }

        Ok(UpdateOutcome::Applied(self.recompute(order, None).await?))
    }

    async fn recompute(
        &self,
        order: &mut Order,
        booking: Option<Result<Booking, CouponError>>,
    ) -> Result<RewardReport, RewardError> {
        let removed = order.clear_reward_lines();
        let set = self.aggregator.compute_rewards(order).await?;
        let added = set.rewards.len();

        for reward in set.rewards {
            order.push_line(reward.into_line())?;
        }

        order.set_non_generating(set.non_generating.clone());

        debug!(removed, added, "reward lines replaced");

        Ok(RewardReport {
            booking,
            removed,
            added,
            non_generating: set.non_generating,
        })
    }
}

fn summarize(order: &Order, catalog: &ProgramCatalog) -> ActiveProgramsSummary {
    let non_generating_programs: FxHashSet<ProgramId> = order
        .non_generating()
        .iter()
        .map(|entry| entry.program)
        .collect();

    let non_generating_coupons: FxHashSet<CouponId> = order
        .non_generating()
        .iter()
        .filter_map(|entry| entry.coupon)
        .collect();

    let mut summary = ActiveProgramsSummary::default();

    for program in order
        .ledger()
        .active_promos()
        .iter()
        .filter_map(|id| catalog.program(*id))
    {
        if program.is_on_next_order() {
            summary.on_next_order_promo_programs.push(program.name.clone());
        } else if !non_generating_programs.contains(&program.id) {
            summary.with_rewards_promo_programs.push(ActivePromo {
                name: program.name.clone(),
                promo_code: program
                    .promotion()
                    .and_then(|promo| promo.code.clone()),
            });
        }
    }

    for booked in order.ledger().booked() {
        if non_generating_coupons.contains(&booked.coupon) {
            continue;
        }

        if let Some(program) = catalog.program(booked.program) {
            summary.with_rewards_booked_coupons.push(ActiveCoupon {
                program_name: program.name.clone(),
                coupon_code: booked.code.clone(),
            });
        }
    }

    summary
}

struct QueuedRefresh<'a>(&'a AtomicBool);

impl Drop for QueuedRefresh<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
