//! Code booking
//!
//! Promo codes activate promotion programs locally. Any other code is looked
//! up on the coupon service, which reserves the coupon for this order.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    catalog::ProgramCatalog,
    ids::{CouponId, PartnerId, ProgramId, SessionId},
    ledger::{ActivationLedger, CouponError},
    programs::CodeUsage,
    service::{CouponService, CouponState, ScanOutcome, ScanRequest},
};

/// What a code activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Booking {
    /// A promotion program was activated by its promo code or barcode.
    PromoActivated(ProgramId),

    /// A coupon was reserved and booked on the order.
    CouponBooked {
        /// Program the coupon belongs to
        program: ProgramId,

        /// Reserved coupon
        coupon: CouponId,
    },
}

/// Result of resetting a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResetOutcome {
    /// Whether booked coupons or code-activated programs were dropped
    pub deactivated: bool,

    /// Coupons released back to the server
    pub released: Vec<CouponId>,
}

/// Books codes into an [`ActivationLedger`].
#[derive(Debug, Clone)]
pub struct CouponBooker {
    catalog: Arc<ProgramCatalog>,
    service: Arc<dyn CouponService>,
    session: SessionId,
}

impl CouponBooker {
    /// Create a booker for the terminal `session`.
    pub fn new(
        catalog: Arc<ProgramCatalog>,
        service: Arc<dyn CouponService>,
        session: SessionId,
    ) -> Self {
        Self {
            catalog,
            service,
            session,
        }
    }

    /// Activate `code` on the ledger.
    ///
    /// # Errors
    ///
    /// Returns a [`CouponError`] if the code is already active, is refused by
    /// the coupon service, or the service cannot be reached.
    #[tracing::instrument(name = "ledger.book_code", skip(self, ledger), err)]
    pub async fn book_code(
        &self,
        ledger: &mut ActivationLedger,
        code: &str,
        customer: Option<PartnerId>,
    ) -> Result<Booking, CouponError> {
        if let Some(program) = self.catalog.promo_program_by_code(code) {
            ledger.activate_promo(program.id)?;

            info!(program = %program.id, "promo code activated");

            return Ok(Booking::PromoActivated(program.id));
        }

        if ledger.is_booked(code) {
            return Err(CouponError::AlreadyScanned(code.to_string()));
        }

        let request = ScanRequest {
            session: self.session,
            code: code.to_string(),
            customer,
            excluded_programs: ledger.booked_program_ids(),
        };

        match self.service.scan_code(request).await? {
            ScanOutcome::Accepted { program, coupon } => {
                if self.catalog.program(program).is_none() {
                    // The server already marked the coupon used.
                    if let Err(error) = self
                        .service
                        .set_coupon_state(vec![coupon], CouponState::New)
                        .await
                    {
                        warn!(%error, %coupon, "failed to release coupon of unknown program");
                    }

                    return Err(CouponError::UnknownProgram(program));
                }

                ledger.book_coupon(code, program, coupon)?;

                info!(%program, %coupon, "coupon booked");

                Ok(Booking::CouponBooked { program, coupon })
            }
            ScanOutcome::Rejected { message } => Err(CouponError::Rejected(message)),
        }
    }

    /// Clear the ledger, release booked coupons and reactivate the automatic
    /// promotion programs.
    ///
    /// Releasing coupons is best effort: a failure is logged and the local
    /// reset still happens.
    #[tracing::instrument(name = "ledger.reset", skip(self, ledger))]
    pub async fn reset(&self, ledger: &mut ActivationLedger) -> ResetOutcome {
        let (booked, previous) = ledger.reset(self.catalog.automatic_promo_programs());

        let code_activated = previous.iter().any(|program| {
            self.catalog
                .program(*program)
                .and_then(|program| program.promotion())
                .is_some_and(|promo| promo.code_usage == CodeUsage::CodeNeeded)
        });

        let released: Vec<CouponId> = booked.iter().map(|booked| booked.coupon).collect();

        let release = if released.is_empty() {
            Ok(())
        } else {
            self.service
                .set_coupon_state(released.clone(), CouponState::New)
                .await
        };

        if let Err(error) = release {
            warn!(%error, coupons = released.len(), "failed to release booked coupons");
        }

        let deactivated = !booked.is_empty() || code_activated;

        if deactivated {
            info!("Active coupons and promo codes were deactivated.");
        }

        ResetOutcome {
            deactivated,
            released,
        }
    }
}
