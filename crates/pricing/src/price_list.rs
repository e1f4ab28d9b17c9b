//! Price tables: catalog, volume tiers and customer contracts.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use docflow_calculation::{Tier, TierTable};
use docflow_core::{DomainError, DomainResult, PartyId, ProductId};

/// Negotiated unit price for one customer and product.
///
/// The optional window is inclusive on both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractPrice {
    pub customer_id: PartyId,
    pub product_id: ProductId,
    pub unit_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<NaiveDate>,
}

impl ContractPrice {
    pub fn new(customer_id: PartyId, product_id: ProductId, unit_price: Decimal) -> Self {
        Self {
            customer_id,
            product_id,
            unit_price,
            valid_from: None,
            valid_until: None,
        }
    }

    pub fn valid_between(mut self, from: Option<NaiveDate>, until: Option<NaiveDate>) -> Self {
        self.valid_from = from;
        self.valid_until = until;
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        ensure_price(self.unit_price, "contract price")?;
        if let (Some(from), Some(until)) = (self.valid_from, self.valid_until) {
            if from > until {
                return Err(DomainError::configuration(format!(
                    "contract price window starts {from} after it ends {until}"
                )));
            }
        }
        Ok(())
    }

    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.valid_from.is_none_or(|from| from <= date)
            && self.valid_until.is_none_or(|until| date <= until)
    }

    fn overlaps(&self, other: &ContractPrice) -> bool {
        let starts_before_other_ends = match (self.valid_from, other.valid_until) {
            (Some(from), Some(until)) => from <= until,
            _ => true,
        };
        let ends_after_other_starts = match (self.valid_until, other.valid_from) {
            (Some(until), Some(from)) => until >= from,
            _ => true,
        };
        starts_before_other_ends && ends_after_other_starts
    }

    pub(crate) fn ensure_disjoint(&self, existing: &[ContractPrice]) -> DomainResult<()> {
        if existing.iter().any(|other| self.overlaps(other)) {
            return Err(DomainError::configuration(format!(
                "contract price for customer {} and product {} overlaps an existing entry",
                self.customer_id, self.product_id
            )));
        }
        Ok(())
    }
}

/// Quantity breakpoints for one product. Thresholds are minimum quantities,
/// values are unit prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumePricing {
    pub product_id: ProductId,
    pub tiers: TierTable<Decimal>,
}

impl VolumePricing {
    pub fn new(product_id: ProductId, tiers: Vec<Tier<Decimal>>) -> DomainResult<Self> {
        let pricing = Self {
            product_id,
            tiers: TierTable::new(tiers)?,
        };
        pricing.validate()?;
        Ok(pricing)
    }

    pub fn validate(&self) -> DomainResult<()> {
        for tier in self.tiers.tiers() {
            ensure_price(tier.value, "volume price")?;
        }
        Ok(())
    }

    pub fn price_for(&self, quantity: Decimal) -> Option<Decimal> {
        self.tiers.select(quantity).map(|tier| tier.value)
    }
}

/// Catalog (list) price of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogPrice {
    pub product_id: ProductId,
    pub unit_price: Decimal,
}

/// All pricing tables, as supplied by the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingTables {
    pub catalog: Vec<CatalogPrice>,
    pub volume: Vec<VolumePricing>,
    pub contracts: Vec<ContractPrice>,
}

pub(crate) fn ensure_price(price: Decimal, what: &str) -> DomainResult<()> {
    if price < Decimal::ZERO {
        return Err(DomainError::validation(format!(
            "{what} must not be negative, got {price}"
        )));
    }
    Ok(())
}
