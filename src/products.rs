//! Products

use decimal_percentage::Percentage;
use rustc_hash::FxHashMap;

use crate::{
    ids::{ProductId, TaxId, TaxIds},
    prices::{Price, PriceError, percent_of_minor},
};

/// Product referenced by a program, either as the rewarded product or as the
/// product used for synthesized reward lines.
#[derive(Debug, Clone)]
pub struct Product {
    /// Product id
    pub id: ProductId,

    /// Product name
    pub name: String,

    /// Public (list) price
    pub lst_price: Price,

    /// Taxes applied when the product is sold
    pub taxes: TaxIds,

    /// Whether the product can be sold at the point of sale
    pub available_in_pos: bool,
}

/// Price-exclusive percentage tax.
#[derive(Debug, Clone)]
pub struct Tax {
    /// Tax id
    pub id: TaxId,

    /// Tax name
    pub name: String,

    /// Rate applied on top of the untaxed price
    pub rate: Percentage,
}

/// Taxes known to the session, by id.
#[derive(Debug, Clone, Default)]
pub struct TaxTable {
    taxes: FxHashMap<TaxId, Tax>,
}

impl TaxTable {
    /// Build a table from a list of taxes.
    pub fn new(taxes: impl IntoIterator<Item = Tax>) -> Self {
        Self {
            taxes: taxes.into_iter().map(|tax| (tax.id, tax)).collect(),
        }
    }

    /// Look up a tax.
    pub fn get(&self, id: TaxId) -> Option<&Tax> {
        self.taxes.get(&id)
    }

    /// Tax amount owed on an untaxed minor-unit amount.
    ///
    /// Unknown tax ids contribute nothing.
    ///
    /// # Errors
    ///
    /// Returns a [`PriceError`] if the calculation overflows.
    pub fn tax_on(&self, taxes: &[TaxId], untaxed: i64) -> Result<i64, PriceError> {
        taxes
            .iter()
            .filter_map(|id| self.taxes.get(id))
            .try_fold(0i64, |acc, tax| {
                acc.checked_add(percent_of_minor(&tax.rate, untaxed)?)
                    .ok_or(PriceError::Overflow)
            })
    }

    /// Number of known taxes.
    pub fn len(&self) -> usize {
        self.taxes.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.taxes.is_empty()
    }
}
