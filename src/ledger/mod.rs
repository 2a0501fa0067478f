//! Activation ledger
//!
//! Per-order record of the promotion programs that are active and the coupon
//! codes booked on the order. Both collections keep insertion order so that
//! reward computation visits programs deterministically.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    ids::{CouponId, ProgramId},
    service::ServiceError,
};

mod booking;

pub use booking::{Booking, CouponBooker, ResetOutcome};

/// Errors raised while activating a code. All of them are shown to the cashier.
#[derive(Debug, Error)]
pub enum CouponError {
    /// The promo code's program is already active on the order.
    #[error("That promo code program has already been activated.")]
    PromoAlreadyActive(ProgramId),

    /// The coupon code is already booked on the order.
    #[error("That coupon code has been scanned and activated.")]
    AlreadyScanned(String),

    /// The coupon service refused the code.
    #[error("{0}")]
    Rejected(String),

    /// The coupon service returned a program the session does not know.
    #[error("coupon belongs to unknown program {0}")]
    UnknownProgram(ProgramId),

    /// The coupon service could not be reached.
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Coupon code booked on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedCoupon {
    /// Code as scanned
    pub code: String,

    /// Program the coupon belongs to
    pub program: ProgramId,

    /// Reserved coupon
    pub coupon: CouponId,
}

/// Active programs and booked coupons of one order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationLedger {
    active_promos: Vec<ProgramId>,
    booked: Vec<BookedCoupon>,
}

impl ActivationLedger {
    /// Whether `program` is active.
    pub fn is_promo_active(&self, program: ProgramId) -> bool {
        self.active_promos.contains(&program)
    }

    /// Active promotion programs, in activation order.
    pub fn active_promos(&self) -> &[ProgramId] {
        &self.active_promos
    }

    /// Activate a promotion program.
    ///
    /// # Errors
    ///
    /// Returns [`CouponError::PromoAlreadyActive`] if the program is already active.
    pub fn activate_promo(&mut self, program: ProgramId) -> Result<(), CouponError> {
        if self.is_promo_active(program) {
            return Err(CouponError::PromoAlreadyActive(program));
        }

        self.active_promos.push(program);

        Ok(())
    }

    /// Deactivate a promotion program. Returns whether it was active.
    pub fn deactivate_promo(&mut self, program: ProgramId) -> bool {
        let before = self.active_promos.len();

        self.active_promos.retain(|active| *active != program);

        self.active_promos.len() != before
    }

    /// Whether `code` is booked.
    pub fn is_booked(&self, code: &str) -> bool {
        self.booked.iter().any(|booked| booked.code == code)
    }

    /// Booked coupons, in booking order.
    pub fn booked(&self) -> &[BookedCoupon] {
        &self.booked
    }

    /// Book a coupon under `code`.
    ///
    /// # Errors
    ///
    /// Returns [`CouponError::AlreadyScanned`] if the code is already booked.
    pub fn book_coupon(
        &mut self,
        code: &str,
        program: ProgramId,
        coupon: CouponId,
    ) -> Result<(), CouponError> {
        if self.is_booked(code) {
            return Err(CouponError::AlreadyScanned(code.to_string()));
        }

        self.booked.push(BookedCoupon {
            code: code.to_string(),
            program,
            coupon,
        });

        Ok(())
    }

    /// Remove the booking holding `coupon`.
    pub fn release_coupon(&mut self, coupon: CouponId) -> Option<BookedCoupon> {
        let position = self
            .booked
            .iter()
            .position(|booked| booked.coupon == coupon)?;

        Some(self.booked.remove(position))
    }

    /// Programs with a booked coupon.
    pub fn booked_program_ids(&self) -> Vec<ProgramId> {
        self.booked.iter().map(|booked| booked.program).collect()
    }

    /// Booked coupon ids.
    pub fn booked_coupon_ids(&self) -> Vec<CouponId> {
        self.booked.iter().map(|booked| booked.coupon).collect()
    }

    /// Drop every booking and replace the active programs with `active_promos`.
    ///
    /// Returns the dropped bookings and previously active programs.
    pub fn reset(
        &mut self,
        active_promos: impl IntoIterator<Item = ProgramId>,
    ) -> (Vec<BookedCoupon>, Vec<ProgramId>) {
        let booked = std::mem::take(&mut self.booked);
        let previous =
            std::mem::replace(&mut self.active_promos, active_promos.into_iter().collect());

        (booked, previous)
    }
}
