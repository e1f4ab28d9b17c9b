//! Unit price resolution: contract, volume tier, catalog.

pub mod price_list;
pub mod service;

pub use price_list::{CatalogPrice, ContractPrice, PricingTables, VolumePricing};
pub use service::{PriceRequest, PriceSource, PricingService, ResolvedPrice};
