//! Programs
//!
//! A program is a promotion or coupon rule definition authored on the
//! server. Its reward is either a free product or a discount; the
//! [`Reward`] enum makes it impossible to populate both.

use crate::ids::{ProductId, ProgramId};

pub mod rewards;
pub mod rules;

pub use rewards::{DiscountKind, DiscountReward, DiscountScope, FreeProductReward, Reward};
pub use rules::{ProgramRules, TaxMode};

/// Program definition, immutable for the whole session.
#[derive(Debug, Clone)]
pub struct Program {
    /// Program id
    pub id: ProgramId,

    /// Display name
    pub name: String,

    /// Coupon or promotion program, with promotion-only settings
    pub kind: ProgramKind,

    /// Eligibility rules
    pub rules: ProgramRules,

    /// What the program grants
    pub reward: Reward,
}

impl Program {
    /// Whether this is a coupon program.
    pub fn is_coupon(&self) -> bool {
        matches!(self.kind, ProgramKind::Coupon)
    }

    /// Promotion settings, if this is a promotion program.
    pub fn promotion(&self) -> Option<&PromotionSettings> {
        match &self.kind {
            ProgramKind::Coupon => None,
            ProgramKind::Promotion(settings) => Some(settings),
        }
    }

    /// Whether this is a promotion program rewarding the current order.
    pub fn is_on_current_order(&self) -> bool {
        self.promotion()
            .is_some_and(|promo| promo.applicability == Applicability::OnCurrentOrder)
    }

    /// Whether this is a promotion program generating coupons for a next order.
    pub fn is_on_next_order(&self) -> bool {
        self.promotion()
            .is_some_and(|promo| promo.applicability == Applicability::OnNextOrder)
    }

    /// Whether this promotion program applies without entering a code.
    pub fn is_automatic(&self) -> bool {
        self.promotion()
            .is_some_and(|promo| promo.code_usage == CodeUsage::NoCodeNeeded)
    }

    /// Whether `code` is this promotion program's promo code or barcode.
    pub fn matches_code(&self, code: &str) -> bool {
        self.promotion().is_some_and(|promo| {
            promo.code.as_deref() == Some(code) || promo.barcode.as_deref() == Some(code)
        })
    }

    /// Product used for the reward lines of this program.
    pub fn discount_line_product(&self) -> ProductId {
        match &self.reward {
            Reward::FreeProduct(reward) => reward.discount_line_product,
            Reward::Discount(reward) => reward.line_product,
        }
    }

    /// Product given away, for free-product programs.
    pub fn reward_product(&self) -> Option<ProductId> {
        match &self.reward {
            Reward::FreeProduct(reward) => Some(reward.reward_product),
            Reward::Discount(_) => None,
        }
    }
}

/// Program kind.
#[derive(Debug, Clone)]
pub enum ProgramKind {
    /// Activated by scanning a coupon code issued by the server.
    Coupon,

    /// Promotion program, automatic or activated by a promo code.
    Promotion(PromotionSettings),
}

/// Promotion-only program settings.
#[derive(Debug, Clone)]
pub struct PromotionSettings {
    /// Whether the reward applies to this order or to a future one
    pub applicability: Applicability,

    /// Whether a code must be entered to activate the program
    pub code_usage: CodeUsage,

    /// Promo code typed in by the cashier
    pub code: Option<String>,

    /// Promo barcode scanned by the cashier
    pub barcode: Option<String>,
}

/// Order the promotion rewards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applicability {
    /// Rewards are added to the current order.
    OnCurrentOrder,

    /// A coupon is generated for a future order.
    OnNextOrder,
}

/// Promotion activation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeUsage {
    /// Applied automatically.
    NoCodeNeeded,

    /// Applied once its promo code or barcode is entered.
    CodeNeeded,
}
