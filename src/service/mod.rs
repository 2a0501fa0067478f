//! Remote coupon service
//!
//! Program usage counters and coupon state live on the server. The engine
//! only reaches them through [`CouponService`].

use std::fmt::Debug;

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{CouponId, OrderId, PartnerId, ProgramId, SessionId};

mod jsonrpc;

pub use jsonrpc::JsonRpcCouponService;

/// Errors talking to the coupon service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// An HTTP transport or serialization error occurred.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a JSON-RPC error.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// Error code
        code: i64,

        /// Error message
        message: String,
    },

    /// The server returned a non-2xx response or an unexpected body.
    #[error("unexpected response from coupon service: {0}")]
    UnexpectedResponse(String),
}

/// Coupon state as stored on the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponState {
    /// Not redeemed.
    New,

    /// Redeemed.
    Used,
}

/// Coupon code lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    /// Session of the terminal scanning the code
    pub session: SessionId,

    /// Scanned or typed code
    pub code: String,

    /// Current customer
    pub customer: Option<PartnerId>,

    /// Programs that already have a coupon booked on this order
    pub excluded_programs: Vec<ProgramId>,
}

/// Result of a coupon code lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The coupon exists, is usable and has been reserved.
    Accepted {
        /// Program the coupon belongs to
        program: ProgramId,

        /// Coupon reserved
        coupon: CouponId,
    },

    /// The server refused the code.
    Rejected {
        /// Server-provided explanation
        message: String,
    },
}

/// Coupon consumption and generation at order validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidateRequest {
    /// Server ids of the pushed order
    pub orders: Vec<OrderId>,

    /// Next-order programs that earned a coupon
    pub programs_to_generate: Vec<ProgramId>,

    /// Booked coupons whose reward did not make it into the order
    pub unused_coupons: Vec<CouponId>,
}

/// Coupons generated by the server, forwarded untouched for printing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneratedCoupons(pub serde_json::Value);

/// Remote procedures the engine depends on.
#[automock]
#[async_trait]
pub trait CouponService: Debug + Send + Sync {
    /// Number of times `program` has been used.
    async fn program_usage_count(&self, program: ProgramId) -> Result<u32, ServiceError>;

    /// Look up and reserve a coupon code.
    async fn scan_code(&self, request: ScanRequest) -> Result<ScanOutcome, ServiceError>;

    /// Set the state of the given coupons.
    async fn set_coupon_state(
        &self,
        coupons: Vec<CouponId>,
        state: CouponState,
    ) -> Result<(), ServiceError>;

    /// Generate next-order coupons and release unused ones.
    async fn validate_coupon_programs(
        &self,
        request: ValidateRequest,
    ) -> Result<GeneratedCoupons, ServiceError>;
}
