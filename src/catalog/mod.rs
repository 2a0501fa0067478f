//! Program catalog
//!
//! Programs, the products they reference and the tax table, loaded once when
//! the session opens and read-only afterwards.

use std::{fmt, fs, path::Path};

use rustc_hash::FxHashMap;
use rusty_money::iso::Currency;
use thiserror::Error;
use tracing::info;

use crate::{
    ids::{ProductId, ProgramId},
    products::{Product, TaxTable},
    programs::Program,
};

pub mod records;

use records::{CatalogRecord, parse_currency};

/// Errors that can occur while building a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    /// The catalog document is not valid YAML for the expected shape.
    #[error("failed to parse catalog: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// An amount could not be parsed.
    #[error("invalid price: {0}")]
    InvalidPrice(String),

    /// A percentage could not be parsed.
    #[error("invalid percentage: {0}")]
    InvalidPercentage(String),

    /// The currency code is not supported.
    #[error("unknown currency: {0}")]
    UnknownCurrency(String),

    /// Two programs share the same id.
    #[error("duplicate program id {0}")]
    DuplicateProgram(ProgramId),

    /// Two products share the same id.
    #[error("duplicate product id {0}")]
    DuplicateProduct(ProductId),

    /// A program definition is incomplete or inconsistent.
    #[error("invalid program {program}: {reason}")]
    InvalidProgram {
        /// Program id
        program: ProgramId,

        /// What is wrong with it
        reason: String,
    },

    /// Reward or reward-line products are missing or not sold at the point
    /// of sale.
    #[error(
        "The following products are not available in the point of sale but are used as rewards: {}",
        UnavailableList(.0)
    )]
    UnavailableRewardProducts(Vec<UnavailableProduct>),
}

/// A program referencing a product it cannot use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnavailableProduct {
    /// Program name
    pub program: String,

    /// Offending product
    pub product: ProductId,

    /// Product name, if the product is known at all
    pub product_name: Option<String>,
}

struct UnavailableList<'a>(&'a [UnavailableProduct]);

impl fmt::Display for UnavailableList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }

            match &entry.product_name {
                Some(name) => write!(f, "{name} ({})", entry.program)?,
                None => write!(f, "product {} ({})", entry.product, entry.program)?,
            }
        }

        Ok(())
    }
}

/// Programs and products available to the session.
#[derive(Debug)]
pub struct ProgramCatalog {
    currency: &'static Currency,
    programs: Vec<Program>,
    index: FxHashMap<ProgramId, usize>,
    products: FxHashMap<ProductId, Product>,
    taxes: TaxTable,
}

impl ProgramCatalog {
    /// Build a catalog, validating program ids and reward products.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DuplicateProgram`] or
    /// [`CatalogError::DuplicateProduct`] for repeated ids, and
    /// [`CatalogError::UnavailableRewardProducts`] listing every program whose
    /// reward or reward-line product is missing or not sold at the point of
    /// sale.
    pub fn new(
        currency: &'static Currency,
        programs: Vec<Program>,
        products: impl IntoIterator<Item = Product>,
        taxes: TaxTable,
    ) -> Result<Self, CatalogError> {
        let mut product_map = FxHashMap::default();

        for product in products {
            let id = product.id;

            if product_map.insert(id, product).is_some() {
                return Err(CatalogError::DuplicateProduct(id));
            }
        }

        let mut index = FxHashMap::default();

        for (position, program) in programs.iter().enumerate() {
            if index.insert(program.id, position).is_some() {
                return Err(CatalogError::DuplicateProgram(program.id));
            }
        }

        let unavailable: Vec<UnavailableProduct> = programs
            .iter()
            .flat_map(|program| {
                program
                    .reward_product()
                    .into_iter()
                    .chain([program.discount_line_product()])
                    .filter_map(|product_id| {
                        let product = product_map.get(&product_id);

                        if product.is_some_and(|product: &Product| product.available_in_pos) {
                            return None;
                        }

                        Some(UnavailableProduct {
                            program: program.name.clone(),
                            product: product_id,
                            product_name: product.map(|product| product.name.clone()),
                        })
                    })
            })
            .collect();

        if !unavailable.is_empty() {
            return Err(CatalogError::UnavailableRewardProducts(unavailable));
        }

        Ok(Self {
            currency,
            programs,
            index,
            products: product_map,
            taxes,
        })
    }

    /// Parse a catalog from a YAML document.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] if the document is malformed or fails validation.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        let record: CatalogRecord = serde_norway::from_str(yaml)?;
        let currency = parse_currency(&record.currency)?;

        let taxes = record
            .taxes
            .into_iter()
            .map(records::TaxRecord::into_tax)
            .collect::<Result<Vec<_>, _>>()?;

        let products = record
            .products
            .into_iter()
            .map(|product| product.into_product(currency))
            .collect::<Result<Vec<_>, _>>()?;

        let programs = record
            .programs
            .into_iter()
            .map(|program| program.into_program(currency))
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(currency, programs, products, TaxTable::new(taxes))
    }

    /// Load a catalog from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns a [`CatalogError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let yaml = fs::read_to_string(path)?;
        let catalog = Self::from_yaml_str(&yaml)?;

        info!(
            path = %path.display(),
            programs = catalog.programs.len(),
            products = catalog.products.len(),
            "loaded program catalog"
        );

        Ok(catalog)
    }

    /// Catalog currency.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Look up a program.
    pub fn program(&self, id: ProgramId) -> Option<&Program> {
        self.index
            .get(&id)
            .and_then(|&position| self.programs.get(position))
    }

    /// All programs, in catalog order.
    pub fn programs(&self) -> &[Program] {
        &self.programs
    }

    /// Coupon programs.
    pub fn coupon_programs(&self) -> impl Iterator<Item = &Program> {
        self.programs.iter().filter(|program| program.is_coupon())
    }

    /// Promotion programs.
    pub fn promo_programs(&self) -> impl Iterator<Item = &Program> {
        self.programs.iter().filter(|program| !program.is_coupon())
    }

    /// Promotion program whose promo code or barcode is `code`.
    pub fn promo_program_by_code(&self, code: &str) -> Option<&Program> {
        self.promo_programs()
            .find(|program| program.matches_code(code))
    }

    /// Ids of the promotion programs that need no code.
    pub fn automatic_promo_programs(&self) -> impl Iterator<Item = ProgramId> + '_ {
        self.promo_programs()
            .filter(|program| program.is_automatic())
            .map(|program| program.id)
    }

    /// Look up a product.
    pub fn product(&self, id: ProductId) -> Option<&Product> {
        self.products.get(&id)
    }

    /// Tax table.
    pub fn taxes(&self) -> &TaxTable {
        &self.taxes
    }
}
