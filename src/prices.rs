//! Prices
//!
//! Amounts are carried as [`rusty_money::Money`] but all arithmetic happens on
//! checked `i64` minor units.

use decimal_percentage::Percentage;
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use rusty_money::{Money, iso::Currency};
use thiserror::Error;

/// Money amount in an ISO currency.
pub type Price = Money<'static, Currency>;

/// Errors raised by minor-unit arithmetic.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PriceError {
    /// Multiplication or summation left the `i64` range.
    #[error("money arithmetic overflowed")]
    Overflow,

    /// Percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed or was not finite")]
    PercentConversion,
}

/// Zero in the given currency.
pub fn zero(currency: &'static Currency) -> Price {
    Money::from_minor(0, currency)
}

/// `unit * quantity` in minor units.
///
/// # Errors
///
/// Returns [`PriceError::Overflow`] if the product does not fit in an `i64`.
pub fn line_total_minor(unit: &Price, quantity: u32) -> Result<i64, PriceError> {
    unit.to_minor_units()
        .checked_mul(i64::from(quantity))
        .ok_or(PriceError::Overflow)
}

/// Checked sum of minor-unit amounts.
///
/// # Errors
///
/// Returns [`PriceError::Overflow`] if the sum does not fit in an `i64`.
pub fn sum_minor(amounts: impl IntoIterator<Item = i64>) -> Result<i64, PriceError> {
    amounts
        .into_iter()
        .try_fold(0i64, |acc, amount| acc.checked_add(amount))
        .ok_or(PriceError::Overflow)
}

/// Calculate `percent` of a minor-unit amount, rounded half away from zero.
///
/// # Errors
///
/// Returns [`PriceError::PercentConversion`] if the calculation overflows.
pub fn percent_of_minor(percent: &Percentage, minor: i64) -> Result<i64, PriceError> {
    let minor = Decimal::from_i64(minor).ok_or(PriceError::PercentConversion)?;

    ((*percent) * Decimal::ONE)
        .checked_mul(minor)
        .ok_or(PriceError::PercentConversion)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(PriceError::PercentConversion)
}

/// Parse a decimal amount such as `"2.88"` into minor units of `currency`.
///
/// Returns `None` for malformed input or amounts outside the `i64` range.
pub fn parse_minor(amount: &str, currency: &'static Currency) -> Option<i64> {
    let amount = amount.trim().parse::<Decimal>().ok()?;
    let scale = Decimal::from_i64(10i64.checked_pow(currency.exponent)?)?;

    amount
        .checked_mul(scale)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::{GBP, JPY, USD};
    use testresult::TestResult;

    use super::*;

    #[test]
    fn line_total_multiplies_quantity() -> TestResult {
        let unit = Money::from_minor(288, USD);

        assert_eq!(line_total_minor(&unit, 5)?, 1440);
        assert_eq!(line_total_minor(&unit, 0)?, 0);

        Ok(())
    }

    #[test]
    fn line_total_overflow_returns_error() {
        let unit = Money::from_minor(i64::MAX, USD);

        assert_eq!(line_total_minor(&unit, 2), Err(PriceError::Overflow));
    }

    #[test]
    fn sum_minor_overflow_returns_error() {
        assert_eq!(sum_minor([i64::MAX, 1]), Err(PriceError::Overflow));
    }

    #[test]
    fn percent_of_minor_rounds_half_away_from_zero() -> TestResult {
        assert_eq!(percent_of_minor(&Percentage::from(0.9), 288)?, 259);
        assert_eq!(percent_of_minor(&Percentage::from(0.5), 5)?, 3);
        assert_eq!(percent_of_minor(&Percentage::from(0.5), -5)?, -3);

        Ok(())
    }

    #[test]
    fn percent_of_minor_overflow_returns_error() {
        let percent = Percentage::from(2.0);

        assert_eq!(
            percent_of_minor(&percent, i64::MAX),
            Err(PriceError::PercentConversion)
        );
    }

    #[test]
    fn parse_minor_uses_currency_exponent() {
        assert_eq!(parse_minor("2.88", USD), Some(288));
        assert_eq!(parse_minor(" 10 ", GBP), Some(1000));
        assert_eq!(parse_minor("150", JPY), Some(150));
        assert_eq!(parse_minor("abc", USD), None);
    }

    #[test]
    fn zero_has_currency() {
        let price = zero(GBP);

        assert_eq!(price.to_minor_units(), 0);
        assert_eq!(price.currency(), GBP);
    }
}
