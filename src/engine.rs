//! Engine
//!
//! Wires the catalog, coupon service and clock into the per-order
//! synchronizer and the finalization manager.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::{
    aggregator::RewardAggregator,
    catalog::{CatalogError, ProgramCatalog},
    config::{EngineConfig, EngineSettings},
    ledger::CouponBooker,
    lifecycle::CouponLifecycleManager,
    order::Order,
    rules::{Clock, RuleEvaluator, SystemClock},
    service::{CouponService, JsonRpcCouponService, ServiceError},
    sync::OrderRewardSynchronizer,
};

/// Errors raised while building an engine from configuration.
#[derive(Debug, Error)]
pub enum EngineInitError {
    /// No catalog path was configured.
    #[error("no program catalog configured")]
    MissingCatalog,

    /// The catalog could not be loaded.
    #[error("failed to load program catalog")]
    Catalog(#[source] CatalogError),

    /// The coupon service client could not be built.
    #[error("failed to build coupon service client")]
    Service(#[source] ServiceError),
}

/// Session-wide engine.
#[derive(Debug, Clone)]
pub struct RewardEngine {
    catalog: Arc<ProgramCatalog>,
    service: Arc<dyn CouponService>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl RewardEngine {
    /// Create an engine using the system clock.
    pub fn new(
        catalog: Arc<ProgramCatalog>,
        service: Arc<dyn CouponService>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            catalog,
            service,
            clock: Arc::new(SystemClock),
            settings,
        }
    }

    /// Replace the clock used for validity windows.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build an engine from configuration, loading the catalog from disk and
    /// talking JSON-RPC to the coupon service.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog is missing or invalid, or the HTTP
    /// client cannot be built.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineInitError> {
        let path = config
            .catalog_path
            .as_deref()
            .ok_or(EngineInitError::MissingCatalog)?;

        let catalog = ProgramCatalog::load(path).map_err(EngineInitError::Catalog)?;
        let service = JsonRpcCouponService::new(&config.remote).map_err(EngineInitError::Service)?;

        info!(
            session = %config.session_id,
            enabled = config.use_coupon_programs,
            "reward engine ready"
        );

        Ok(Self::new(
            Arc::new(catalog),
            Arc::new(service),
            config.settings(),
        ))
    }

    /// Program catalog.
    pub fn catalog(&self) -> &Arc<ProgramCatalog> {
        &self.catalog
    }

    /// Runtime settings.
    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    /// Empty order in the catalog currency.
    pub fn new_order(&self) -> Order {
        Order::new(self.catalog.currency())
    }

    /// Start tracking `order`: its ledger is reset so that only the automatic
    /// promotion programs are active.
    pub async fn open_order(&self, mut order: Order) -> OrderRewardSynchronizer {
        self.booker().reset(order.ledger_mut()).await;

        self.resume_order(order)
    }

    /// Track `order` with its ledger as is, e.g. after restoring it from storage.
    pub fn resume_order(&self, order: Order) -> OrderRewardSynchronizer {
        OrderRewardSynchronizer::new(
            Arc::clone(&self.catalog),
            RewardAggregator::new(Arc::clone(&self.catalog), self.rules()),
            self.booker(),
            Arc::clone(&self.service),
            self.settings,
            order,
        )
    }

    /// Finalization manager.
    pub fn lifecycle(&self) -> CouponLifecycleManager {
        CouponLifecycleManager::new(
            Arc::clone(&self.catalog),
            self.rules(),
            Arc::clone(&self.service),
            self.settings,
        )
    }

    fn rules(&self) -> RuleEvaluator {
        RuleEvaluator::new(Arc::clone(&self.service), Arc::clone(&self.clock))
    }

    fn booker(&self) -> CouponBooker {
        CouponBooker::new(
            Arc::clone(&self.catalog),
            Arc::clone(&self.service),
            self.settings.session,
        )
    }
}
