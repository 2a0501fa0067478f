//! Order
//!
//! The engine's view of the active order: regular sale lines, the reward
//! lines it synthesized, the customer and the per-order activation ledger.

use rusty_money::{Money, iso::Currency};
use serde::Serialize;
use thiserror::Error;

use crate::{
    ids::{CouponId, PartnerId, ProductId, ProgramId, TaxId, TaxIds},
    ledger::ActivationLedger,
    prices::{Price, PriceError, line_total_minor, sum_minor},
    products::TaxTable,
    reasons::NonGeneratingEntry,
    service::GeneratedCoupons,
};

/// Errors related to order lines or totals.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    /// A line's currency differs from the order currency (line currency, order currency).
    #[error("Line has currency {0}, but order has currency {1}")]
    CurrencyMismatch(&'static str, &'static str),

    /// A line was not found in the order.
    #[error("Line {0} not found")]
    LineNotFound(usize),

    /// Totals could not be computed.
    #[error(transparent)]
    Price(#[from] PriceError),
}

/// Program (and coupon) a reward line was generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RewardSource {
    /// Program that generated the line
    pub program: ProgramId,

    /// Coupon the program was activated with, if any
    pub coupon: Option<CouponId>,
}

/// Order line.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    /// Product sold
    pub product: ProductId,

    /// Whole units
    pub quantity: u32,

    /// Price charged per unit
    pub unit_price: Price,

    /// Public price per unit, used as discount base
    pub lst_price: Price,

    /// Ordered taxes applied to the line
    pub taxes: TaxIds,

    /// Set when the engine synthesized the line as a reward
    pub reward: Option<RewardSource>,
}

impl OrderLine {
    /// Create a regular sale line priced at its list price.
    pub fn new(product: ProductId, quantity: u32, price: Price, taxes: TaxIds) -> Self {
        Self {
            product,
            quantity,
            unit_price: price,
            lst_price: price,
            taxes,
            reward: None,
        }
    }

    /// Whether the line was generated by a program.
    pub fn is_program_reward(&self) -> bool {
        self.reward.is_some()
    }

    /// Program that generated the line, if any.
    pub fn program(&self) -> Option<ProgramId> {
        self.reward.map(|source| source.program)
    }

    /// Coupon the line was generated for, if any.
    pub fn coupon(&self) -> Option<CouponId> {
        self.reward.and_then(|source| source.coupon)
    }

    /// `unit_price * quantity` in minor units.
    ///
    /// # Errors
    ///
    /// Returns a [`PriceError`] if the product overflows.
    pub fn subtotal_minor(&self) -> Result<i64, PriceError> {
        line_total_minor(&self.unit_price, self.quantity)
    }

    /// `lst_price * quantity` in minor units.
    ///
    /// # Errors
    ///
    /// Returns a [`PriceError`] if the product overflows.
    pub fn list_total_minor(&self) -> Result<i64, PriceError> {
        line_total_minor(&self.lst_price, self.quantity)
    }

    /// Serializable form of the line, as sent with the order.
    pub fn export(&self) -> ExportedLine {
        ExportedLine {
            product_id: self.product,
            qty: self.quantity,
            price_unit: self.unit_price.to_minor_units(),
            tax_ids: self.taxes.iter().copied().collect(),
            is_program_reward: self.is_program_reward(),
            program_id: self.program(),
            coupon_id: self.coupon(),
        }
    }
}

/// Exported order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedLine {
    /// Product id
    pub product_id: ProductId,

    /// Quantity
    pub qty: u32,

    /// Unit price in minor units
    pub price_unit: i64,

    /// Tax ids
    pub tax_ids: Vec<TaxId>,

    /// Whether the line is a program reward
    pub is_program_reward: bool,

    /// Program that generated the line
    pub program_id: Option<ProgramId>,

    /// Coupon the line was generated for
    pub coupon_id: Option<CouponId>,
}

/// Active order.
#[derive(Debug)]
pub struct Order {
    currency: &'static Currency,
    lines: Vec<OrderLine>,
    customer: Option<PartnerId>,
    ledger: ActivationLedger,
    non_generating: Vec<NonGeneratingEntry>,
    generated_coupons: Option<GeneratedCoupons>,
}

impl Order {
    /// Create an empty order.
    #[must_use]
    pub fn new(currency: &'static Currency) -> Self {
        Self {
            currency,
            lines: Vec::new(),
            customer: None,
            ledger: ActivationLedger::default(),
            non_generating: Vec::new(),
            generated_coupons: None,
        }
    }

    /// Create an order with the given regular lines.
    ///
    /// # Errors
    ///
    /// Returns an [`OrderError::CurrencyMismatch`] if a line is priced in another currency.
    pub fn with_lines(
        lines: impl IntoIterator<Item = OrderLine>,
        currency: &'static Currency,
    ) -> Result<Self, OrderError> {
        let mut order = Self::new(currency);

        for line in lines {
            order.push_line(line)?;
        }

        Ok(order)
    }

    /// Append a line.
    ///
    /// # Errors
    ///
    /// Returns an [`OrderError::CurrencyMismatch`] if the line is priced in another currency.
    pub fn push_line(&mut self, line: OrderLine) -> Result<(), OrderError> {
        let line_currency = line.unit_price.currency();

        if line_currency != self.currency || line.lst_price.currency() != self.currency {
            return Err(OrderError::CurrencyMismatch(
                line_currency.iso_alpha_code,
                self.currency.iso_alpha_code,
            ));
        }

        self.lines.push(line);

        Ok(())
    }

    /// Remove the line at `index`.
    ///
    /// # Errors
    ///
    /// Returns an [`OrderError::LineNotFound`] if there is no such line.
    pub fn remove_line(&mut self, index: usize) -> Result<OrderLine, OrderError> {
        if index >= self.lines.len() {
            return Err(OrderError::LineNotFound(index));
        }

        Ok(self.lines.remove(index))
    }

    /// Get a line.
    ///
    /// # Errors
    ///
    /// Returns an [`OrderError::LineNotFound`] if there is no such line.
    pub fn line(&self, index: usize) -> Result<&OrderLine, OrderError> {
        self.lines.get(index).ok_or(OrderError::LineNotFound(index))
    }

    /// Lines in insertion order.
    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    /// Lines as shown to the cashier: regular lines first, reward lines last.
    pub fn lines_for_display(&self) -> impl Iterator<Item = &OrderLine> {
        self.regular_lines().chain(self.reward_lines())
    }

    /// Lines sold by the cashier.
    pub fn regular_lines(&self) -> impl Iterator<Item = &OrderLine> {
        self.lines.iter().filter(|line| !line.is_program_reward())
    }

    /// Lines generated by programs.
    pub fn reward_lines(&self) -> impl Iterator<Item = &OrderLine> {
        self.lines.iter().filter(|line| line.is_program_reward())
    }

    /// Remove every reward line, returning how many were removed.
    pub fn clear_reward_lines(&mut self) -> usize {
        let before = self.lines.len();
        self.lines.retain(|line| !line.is_program_reward());

        before - self.lines.len()
    }

    /// Remove every reward line generated by `program`.
    pub fn remove_program_rewards(&mut self, program: ProgramId) -> Vec<OrderLine> {
        let (removed, kept) = std::mem::take(&mut self.lines)
            .into_iter()
            .partition(|line| line.program() == Some(program));

        self.lines = kept;

        removed
    }

    /// Whether the order has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Order currency.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Current customer.
    pub fn customer(&self) -> Option<PartnerId> {
        self.customer
    }

    /// Set or clear the customer.
    pub fn set_customer(&mut self, customer: Option<PartnerId>) {
        self.customer = customer;
    }

    /// Untaxed total.
    ///
    /// # Errors
    ///
    /// Returns an [`OrderError::Price`] if the total overflows.
    pub fn total_without_tax(&self) -> Result<Price, OrderError> {
        let total = sum_minor(
            self.lines
                .iter()
                .map(OrderLine::subtotal_minor)
                .collect::<Result<Vec<_>, _>>()?,
        )?;

        Ok(Money::from_minor(total, self.currency))
    }

    /// Total including the taxes listed on each line.
    ///
    /// # Errors
    ///
    /// Returns an [`OrderError::Price`] if the total overflows.
    pub fn total_with_tax(&self, taxes: &TaxTable) -> Result<Price, OrderError> {
        let total = self.lines.iter().try_fold(0i64, |acc, line| {
            let untaxed = line.subtotal_minor()?;
            let tax = taxes.tax_on(&line.taxes, untaxed)?;

            acc.checked_add(untaxed)
                .and_then(|acc| acc.checked_add(tax))
                .ok_or(PriceError::Overflow)
        })?;

        Ok(Money::from_minor(total, self.currency))
    }

    /// Total quantity of lines whose product satisfies `is_valid`.
    pub fn quantity_where(&self, mut is_valid: impl FnMut(ProductId) -> bool) -> u32 {
        self.lines
            .iter()
            .filter(|line| is_valid(line.product))
            .fold(0u32, |acc, line| acc.saturating_add(line.quantity))
    }

    /// Activation ledger of the order.
    pub fn ledger(&self) -> &ActivationLedger {
        &self.ledger
    }

    /// Activation ledger of the order, mutably.
    pub fn ledger_mut(&mut self) -> &mut ActivationLedger {
        &mut self.ledger
    }

    /// Programs considered during the last reward computation that produced no reward.
    pub fn non_generating(&self) -> &[NonGeneratingEntry] {
        &self.non_generating
    }

    /// Replace the non-generating programs of the last reward computation.
    pub fn set_non_generating(&mut self, entries: Vec<NonGeneratingEntry>) {
        self.non_generating = entries;
    }

    /// Coupons generated when the order was validated.
    pub fn generated_coupons(&self) -> Option<&GeneratedCoupons> {
        self.generated_coupons.as_ref()
    }

    /// Record the coupons generated when the order was validated.
    pub fn set_generated_coupons(&mut self, coupons: GeneratedCoupons) {
        self.generated_coupons = Some(coupons);
    }
}
