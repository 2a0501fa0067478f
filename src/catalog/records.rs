//! Catalog records
//!
//! Wire shape of the catalog document, using the backend's field names.

use decimal_percentage::Percentage;
use jiff::Timestamp;
use rusty_money::{
    Money,
    iso::{Currency, EUR, GBP, USD},
};
use serde::Deserialize;
use smallvec::SmallVec;

use crate::{
    catalog::CatalogError,
    ids::{PartnerId, ProductId, ProgramId, TaxId},
    prices::{Price, parse_minor},
    products::{Product, Tax},
    programs::{
        Applicability, CodeUsage, DiscountKind, DiscountReward, DiscountScope, FreeProductReward,
        Program, ProgramKind, ProgramRules, PromotionSettings, Reward, TaxMode,
    },
};

/// Catalog document
#[derive(Debug, Deserialize)]
pub struct CatalogRecord {
    /// ISO currency code (e.g. "USD")
    pub currency: String,

    /// Taxes
    #[serde(default)]
    pub taxes: Vec<TaxRecord>,

    /// Products referenced by programs
    #[serde(default)]
    pub products: Vec<ProductRecord>,

    /// Programs enabled for the session
    #[serde(default)]
    pub programs: Vec<ProgramRecord>,
}

/// Tax record
#[derive(Debug, Deserialize)]
pub struct TaxRecord {
    /// Tax id
    pub id: TaxId,

    /// Tax name
    pub name: String,

    /// Rate (e.g. "15%")
    pub rate: String,
}

/// Product record
#[derive(Debug, Deserialize)]
pub struct ProductRecord {
    /// Product id
    pub id: ProductId,

    /// Product name
    pub name: String,

    /// List price (e.g. "2.88")
    pub lst_price: String,

    /// Tax ids
    #[serde(default)]
    pub taxes_id: Vec<TaxId>,

    /// Whether the product is sold at the point of sale
    #[serde(default = "default_true")]
    pub available_in_pos: bool,
}

/// Program type
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramTypeRecord {
    /// Coupon program
    CouponProgram,

    /// Promotion program
    PromotionProgram,
}

/// Reward type
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardTypeRecord {
    /// Free product
    Product,

    /// Discount
    Discount,
}

/// Discount type
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountTypeRecord {
    /// Percentage
    Percentage,

    /// Fixed amount
    FixedAmount,
}

/// Discount target
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountApplyOnRecord {
    /// Whole order
    #[default]
    OnOrder,

    /// Cheapest product
    CheapestProduct,

    /// Specific products
    SpecificProducts,
}

/// Minimum amount tax mode
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxInclusionRecord {
    /// Tax included
    #[default]
    TaxIncluded,

    /// Tax excluded
    TaxExcluded,
}

/// Promotion applicability
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicabilityRecord {
    /// Current order
    #[default]
    OnCurrentOrder,

    /// Next order
    OnNextOrder,
}

/// Promotion code usage
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeUsageRecord {
    /// Automatic
    #[default]
    NoCodeNeeded,

    /// Code needed
    CodeNeeded,
}

/// Program record
#[derive(Debug, Deserialize)]
pub struct ProgramRecord {
    /// Program id
    pub id: ProgramId,

    /// Program name
    pub name: String,

    /// Coupon or promotion program
    pub program_type: ProgramTypeRecord,

    /// Minimum order amount (e.g. "50.00")
    #[serde(default)]
    pub rule_minimum_amount: Option<String>,

    /// Whether the minimum amount includes taxes
    #[serde(default)]
    pub rule_minimum_amount_tax_inclusion: TaxInclusionRecord,

    /// Minimum quantity of valid products
    #[serde(default)]
    pub rule_min_quantity: u32,

    /// Products counted towards the minimum quantity
    #[serde(default)]
    pub valid_product_ids: Vec<ProductId>,

    /// Customers allowed to use the program
    #[serde(default)]
    pub valid_partner_ids: Vec<PartnerId>,

    /// Start of validity
    #[serde(default)]
    pub rule_date_from: Option<Timestamp>,

    /// End of validity
    #[serde(default)]
    pub rule_date_to: Option<Timestamp>,

    /// Usage cap, zero for unlimited
    #[serde(default)]
    pub maximum_use_number: u32,

    /// Free product or discount
    pub reward_type: RewardTypeRecord,

    /// Free product
    #[serde(default)]
    pub reward_product_id: Option<ProductId>,

    /// Units given for free
    #[serde(default)]
    pub reward_product_quantity: Option<u32>,

    /// Units to buy; defaults to `rule_min_quantity`
    #[serde(default)]
    pub reward_buy_quantity: Option<u32>,

    /// Product used for reward lines
    pub discount_line_product_id: ProductId,

    /// Percentage or fixed amount
    #[serde(default)]
    pub discount_type: Option<DiscountTypeRecord>,

    /// Percentage (e.g. "10%")
    #[serde(default)]
    pub discount_percentage: Option<String>,

    /// Fixed amount (e.g. "5.00")
    #[serde(default)]
    pub discount_fixed_amount: Option<String>,

    /// Cap per discount line, "0" for none
    #[serde(default)]
    pub discount_max_amount: Option<String>,

    /// What a percentage discount applies to
    #[serde(default)]
    pub discount_apply_on: DiscountApplyOnRecord,

    /// Products discounted by a specific-products discount
    #[serde(default)]
    pub discount_specific_product_ids: Vec<ProductId>,

    /// Current or next order
    #[serde(default)]
    pub promo_applicability: ApplicabilityRecord,

    /// Automatic or code needed
    #[serde(default)]
    pub promo_code_usage: CodeUsageRecord,

    /// Promo code
    #[serde(default)]
    pub promo_code: Option<String>,

    /// Promo barcode
    #[serde(default)]
    pub promo_barcode: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Map an ISO code to a supported currency.
///
/// # Errors
///
/// Returns [`CatalogError::UnknownCurrency`] for unsupported codes.
pub fn parse_currency(code: &str) -> Result<&'static Currency, CatalogError> {
    match code.trim() {
        "GBP" => Ok(GBP),
        "USD" => Ok(USD),
        "EUR" => Ok(EUR),
        other => Err(CatalogError::UnknownCurrency(other.to_string())),
    }
}

/// Parse an amount (e.g. "2.88") in `currency`.
///
/// # Errors
///
/// Returns [`CatalogError::InvalidPrice`] for malformed amounts.
pub fn parse_price(amount: &str, currency: &'static Currency) -> Result<Price, CatalogError> {
    parse_minor(amount, currency)
        .map(|minor| Money::from_minor(minor, currency))
        .ok_or_else(|| CatalogError::InvalidPrice(amount.to_string()))
}

/// Parse a percentage string (e.g. "15%" or "0.15").
///
/// # Errors
///
/// Returns [`CatalogError::InvalidPercentage`] if the string cannot be parsed.
pub fn parse_percentage(s: &str) -> Result<Percentage, CatalogError> {
    let trimmed = s.trim();

    if let Some(percent_str) = trimmed.strip_suffix('%') {
        let value = percent_str
            .trim()
            .parse::<f64>()
            .map_err(|_err| CatalogError::InvalidPercentage(s.to_string()))?;

        Ok(Percentage::from(value / 100.0))
    } else {
        let value = trimmed
            .parse::<f64>()
            .map_err(|_err| CatalogError::InvalidPercentage(s.to_string()))?;

        Ok(Percentage::from(value))
    }
}

impl TaxRecord {
    /// Convert into a [`Tax`].
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidPercentage`] for a malformed rate.
    pub fn into_tax(self) -> Result<Tax, CatalogError> {
        Ok(Tax {
            id: self.id,
            name: self.name,
            rate: parse_percentage(&self.rate)?,
        })
    }
}

impl ProductRecord {
    /// Convert into a [`Product`] priced in `currency`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidPrice`] for a malformed price.
    pub fn into_product(self, currency: &'static Currency) -> Result<Product, CatalogError> {
        Ok(Product {
            id: self.id,
            name: self.name,
            lst_price: parse_price(&self.lst_price, currency)?,
            taxes: SmallVec::from_vec(self.taxes_id),
            available_in_pos: self.available_in_pos,
        })
    }
}

impl ProgramRecord {
    /// Convert into a [`Program`] with amounts in `currency`.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] if amounts are malformed or the reward
    /// fields required by `reward_type` are missing.
    pub fn into_program(self, currency: &'static Currency) -> Result<Program, CatalogError> {
        let invalid = |reason: &str| CatalogError::InvalidProgram {
            program: self.id,
            reason: reason.to_string(),
        };

        let reward = match self.reward_type {
            RewardTypeRecord::Product => {
                let reward_product = self
                    .reward_product_id
                    .ok_or_else(|| invalid("free product program without reward product"))?;

                let buy_quantity = self.reward_buy_quantity.unwrap_or(self.rule_min_quantity);

                if buy_quantity == 0 {
                    return Err(invalid("buy quantity must be at least one"));
                }

                Reward::FreeProduct(FreeProductReward {
                    buy_quantity,
                    free_quantity: self.reward_product_quantity.unwrap_or(1),
                    reward_product,
                    discount_line_product: self.discount_line_product_id,
                })
            }
            RewardTypeRecord::Discount => {
                let kind = match self.discount_type {
                    Some(DiscountTypeRecord::FixedAmount) => {
                        let amount = self
                            .discount_fixed_amount
                            .as_deref()
                            .ok_or_else(|| invalid("fixed amount discount without amount"))?;

                        DiscountKind::FixedAmount(parse_price(amount, currency)?)
                    }
                    Some(DiscountTypeRecord::Percentage) => {
                        let percentage = self
                            .discount_percentage
                            .as_deref()
                            .ok_or_else(|| invalid("percentage discount without percentage"))?;

                        let scope = match self.discount_apply_on {
                            DiscountApplyOnRecord::OnOrder => DiscountScope::WholeOrder,
                            DiscountApplyOnRecord::CheapestProduct => {
                                DiscountScope::CheapestProduct
                            }
                            DiscountApplyOnRecord::SpecificProducts => {
                                DiscountScope::SpecificProducts(
                                    self.discount_specific_product_ids.iter().copied().collect(),
                                )
                            }
                        };

                        DiscountKind::Percentage {
                            percentage: parse_percentage(percentage)?,
                            scope,
                        }
                    }
                    None => return Err(invalid("discount program without discount type")),
                };

                let max_amount = self
                    .discount_max_amount
                    .as_deref()
                    .map(|amount| parse_price(amount, currency))
                    .transpose()?
                    .filter(|max| max.to_minor_units() > 0);

                Reward::Discount(DiscountReward {
                    kind,
                    max_amount,
                    line_product: self.discount_line_product_id,
                })
            }
        };

        let kind = match self.program_type {
            ProgramTypeRecord::CouponProgram => ProgramKind::Coupon,
            ProgramTypeRecord::PromotionProgram => ProgramKind::Promotion(PromotionSettings {
                applicability: match self.promo_applicability {
                    ApplicabilityRecord::OnCurrentOrder => Applicability::OnCurrentOrder,
                    ApplicabilityRecord::OnNextOrder => Applicability::OnNextOrder,
                },
                code_usage: match self.promo_code_usage {
                    CodeUsageRecord::NoCodeNeeded => CodeUsage::NoCodeNeeded,
                    CodeUsageRecord::CodeNeeded => CodeUsage::CodeNeeded,
                },
                code: self.promo_code.filter(|code| !code.is_empty()),
                barcode: self.promo_barcode.filter(|code| !code.is_empty()),
            }),
        };

        let minimum_amount = match self.rule_minimum_amount.as_deref() {
            Some(amount) => parse_price(amount, currency)?,
            None => Money::from_minor(0, currency),
        };

        let rules = ProgramRules {
            minimum_amount,
            minimum_amount_tax: match self.rule_minimum_amount_tax_inclusion {
                TaxInclusionRecord::TaxIncluded => TaxMode::TaxIncluded,
                TaxInclusionRecord::TaxExcluded => TaxMode::TaxExcluded,
            },
            min_quantity: self.rule_min_quantity,
            valid_products: self.valid_product_ids.into_iter().collect(),
            valid_partners: self.valid_partner_ids.into_iter().collect(),
            date_from: self.rule_date_from,
            date_to: self.rule_date_to,
            max_usage: self.maximum_use_number,
        };

        Ok(Program {
            id: self.id,
            name: self.name,
            kind,
            rules,
            reward,
        })
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn parse_percentage_accepts_both_forms() -> TestResult {
        let percent = parse_percentage("15%")?;
        let decimal = parse_percentage("0.15")?;

        assert_eq!(crate::prices::percent_of_minor(&percent, 1000)?, 150);
        assert_eq!(crate::prices::percent_of_minor(&decimal, 1000)?, 150);

        Ok(())
    }

    #[test]
    fn parse_percentage_rejects_garbage() {
        assert!(matches!(
            parse_percentage("lots"),
            Err(CatalogError::InvalidPercentage(_))
        ));
    }

    #[test]
    fn parse_currency_rejects_unknown_codes() {
        assert!(matches!(
            parse_currency("XYZ"),
            Err(CatalogError::UnknownCurrency(code)) if code == "XYZ"
        ));
    }

    #[test]
    fn free_product_without_buy_quantity_is_invalid() -> TestResult {
        let record: ProgramRecord = serde_norway::from_str(
            "
id: 3
name: Free pens
program_type: promotion_program
reward_type: product
reward_product_id: 10
discount_line_product_id: 90
",
        )?;

        assert!(matches!(
            record.into_program(USD),
            Err(CatalogError::InvalidProgram { program, .. }) if program == ProgramId::new(3)
        ));

        Ok(())
    }

    #[test]
    fn zero_max_amount_means_uncapped() -> TestResult {
        let record: ProgramRecord = serde_norway::from_str(
            "
id: 4
name: Ten off
program_type: coupon_program
reward_type: discount
discount_type: percentage
discount_percentage: 10%
discount_max_amount: '0'
discount_line_product_id: 90
",
        )?;

        let program = record.into_program(USD)?;

        assert!(program.is_coupon());
        assert!(matches!(
            program.reward,
            Reward::Discount(DiscountReward {
                max_amount: None,
                kind: DiscountKind::Percentage {
                    scope: DiscountScope::WholeOrder,
                    ..
                },
                ..
            })
        ));

        Ok(())
    }
}
