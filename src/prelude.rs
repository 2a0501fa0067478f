//! POS Rewards prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    aggregator::{RewardAggregator, RewardSet},
    catalog::{CatalogError, ProgramCatalog},
    config::{EngineConfig, EngineSettings},
    engine::{EngineInitError, RewardEngine},
    ids::{CouponId, OrderId, PartnerId, ProductId, ProgramId, SessionId, TaxId},
    ledger::{ActivationLedger, Booking, CouponError},
    lifecycle::{CouponLifecycleManager, FinalizationReport},
    order::{Order, OrderError, OrderLine},
    prices::Price,
    products::{Product, TaxTable},
    programs::{Program, Reward},
    reasons::{NonGeneratingEntry, Reason},
    rewards::{CandidateReward, RewardError},
    rules::{Clock, Eligibility, FixedClock, SystemClock},
    service::{CouponService, CouponState, GeneratedCoupons, ServiceError},
    sync::{ActiveProgramsSummary, Deactivation, OrderRewardSynchronizer, UpdateOutcome},
};
