//! Pricing Service: resolves the unit price of a product for a customer.
//!
//! Resolution order is contract, then volume tier, then catalog price. The
//! first source that yields a price wins and is reported back with the price.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use docflow_calculation::LineItem;
use docflow_core::{DomainError, DomainResult, LineItemId, PartyId, ProductId};

use crate::price_list::{ContractPrice, PricingTables, VolumePricing, ensure_price};

/// Where a resolved price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Contract,
    VolumeDiscount,
    Standard,
}

impl core::fmt::Display for PriceSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            PriceSource::Contract => "contract",
            PriceSource::VolumeDiscount => "volume_discount",
            PriceSource::Standard => "standard",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRequest {
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<PartyId>,
    pub quantity: Decimal,
    /// Pricing date; contract windows are checked against it.
    pub on: NaiveDate,
}

impl PriceRequest {
    pub fn new(product_id: ProductId, quantity: Decimal, on: NaiveDate) -> Self {
        Self {
            product_id,
            customer_id: None,
            quantity,
            on,
        }
    }

    pub fn for_customer(mut self, customer_id: PartyId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPrice {
    pub unit_price: Decimal,
    pub source: PriceSource,
}

#[derive(Debug, Clone, Default)]
pub struct PricingService {
    catalog: HashMap<ProductId, Decimal>,
    volume: HashMap<ProductId, VolumePricing>,
    contracts: HashMap<(PartyId, ProductId), Vec<ContractPrice>>,
}

impl PricingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a service from stored tables, validating every entry.
    pub fn from_tables(tables: PricingTables) -> DomainResult<Self> {
        let mut service = Self::new();
        for entry in tables.catalog {
            service.set_catalog_price(entry.product_id, entry.unit_price)?;
        }
        for pricing in tables.volume {
            service.add_volume_pricing(pricing)?;
        }
        for contract in tables.contracts {
            service.add_contract(contract)?;
        }
        Ok(service)
    }

    pub fn set_catalog_price(&mut self, product_id: ProductId, unit_price: Decimal) -> DomainResult<()> {
        ensure_price(unit_price, "catalog price")?;
        self.catalog.insert(product_id, unit_price);
        Ok(())
    }

    /// Install (or replace) the volume table of a product.
    pub fn add_volume_pricing(&mut self, pricing: VolumePricing) -> DomainResult<()> {
        pricing.validate()?;
        self.volume.insert(pricing.product_id, pricing);
        Ok(())
    }

    /// Add a contract price. Windows for the same customer and product must
    /// not overlap.
    pub fn add_contract(&mut self, contract: ContractPrice) -> DomainResult<()> {
        contract.validate()?;
        let key = (contract.customer_id, contract.product_id);
        let existing = self.contracts.entry(key).or_default();
        contract.ensure_disjoint(existing)?;
        existing.push(contract);
        Ok(())
    }

    pub fn catalog_price(&self, product_id: ProductId) -> Option<Decimal> {
        self.catalog.get(&product_id).copied()
    }

    pub fn resolve(&self, request: &PriceRequest) -> DomainResult<ResolvedPrice> {
        if request.quantity <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "quantity must be positive, got {}",
                request.quantity
            )));
        }

        let resolved = self
            .contract_price(request)
            .map(|unit_price| ResolvedPrice {
                unit_price,
                source: PriceSource::Contract,
            })
            .or_else(|| {
                self.volume
                    .get(&request.product_id)
                    .and_then(|pricing| pricing.price_for(request.quantity))
                    .map(|unit_price| ResolvedPrice {
                        unit_price,
                        source: PriceSource::VolumeDiscount,
                    })
            })
            .or_else(|| {
                self.catalog_price(request.product_id).map(|unit_price| ResolvedPrice {
                    unit_price,
                    source: PriceSource::Standard,
                })
            });

        match resolved {
            Some(price) => {
                tracing::debug!(
                    product_id = %request.product_id,
                    customer_id = ?request.customer_id,
                    quantity = %request.quantity,
                    unit_price = %price.unit_price,
                    source = %price.source,
                    "resolved unit price"
                );
                Ok(price)
            }
            None => {
                tracing::warn!(
                    product_id = %request.product_id,
                    quantity = %request.quantity,
                    "no applicable price"
                );
                Err(DomainError::pricing(format!(
                    "product {} has no applicable price",
                    request.product_id
                )))
            }
        }
    }

    /// Resolve the price and build a priced line item (no discount or tax).
    pub fn line_item(&self, id: LineItemId, request: &PriceRequest) -> DomainResult<LineItem> {
        let price = self.resolve(request)?;
        Ok(LineItem::new(id, request.quantity, price.unit_price).with_product(request.product_id))
    }

    fn contract_price(&self, request: &PriceRequest) -> Option<Decimal> {
        let customer_id = request.customer_id?;
        self.contracts
            .get(&(customer_id, request.product_id))?
            .iter()
            .find(|contract| contract.is_valid_on(request.on))
            .map(|contract| contract.unit_price)
    }
}
