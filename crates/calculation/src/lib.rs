//! Line-item calculation pipeline (discount -> tax -> rounding).
//!
//! Strategies are enums dispatched by `match`; the [`CalculationService`]
//! composes them and the [`LineItemsManager`] owns a document's ordered lines.
//! Everything here is pure and synchronous.

pub mod config;
pub mod discount;
pub mod line;
pub mod manager;
pub mod rounding;
pub mod service;
pub mod tax;
pub mod tier;

pub use config::CalculationSettings;
pub use discount::{DiscountConfig, TierBasis, TieredDiscount};
pub use line::{LineItem, LineItemPatch};
pub use manager::{LineCommand, LineItemsManager};
pub use rounding::RoundingMode;
pub use service::{CalculationService, DocumentTotals, LineComputation};
pub use tax::TaxConfig;
pub use tier::{Tier, TierTable};
