//! Discount strategies.
//!
//! `apply` always returns an amount in `[0, base]`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use docflow_core::{DomainError, DomainResult, ValueObject};

use crate::tier::TierTable;

/// What a tiered discount's thresholds are compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierBasis {
    /// The line quantity.
    Quantity,
    /// The line subtotal (quantity x unit price).
    Amount,
}

/// Tiered discount: thresholds map to percentage rates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TieredDiscount {
    pub basis: TierBasis,
    pub tiers: TierTable<Decimal>,
}

/// Discount configuration of a line item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscountConfig {
    #[default]
    None,
    /// Fixed amount off the line.
    Amount { value: Decimal },
    /// Percentage (0-100) of the line subtotal.
    Percent { rate: Decimal },
    /// Percentage chosen from a threshold table.
    Tiered(TieredDiscount),
}

impl DiscountConfig {
    pub fn amount(value: Decimal) -> DomainResult<Self> {
        let config = Self::Amount { value };
        config.validate()?;
        Ok(config)
    }

    pub fn percent(rate: Decimal) -> DomainResult<Self> {
        let config = Self::Percent { rate };
        config.validate()?;
        Ok(config)
    }

    pub fn tiered(basis: TierBasis, tiers: TierTable<Decimal>) -> DomainResult<Self> {
        let config = Self::Tiered(TieredDiscount { basis, tiers });
        config.validate()?;
        Ok(config)
    }

    /// Check parameter ranges.
    ///
    /// Tier ordering is already guaranteed by [`TierTable`]; tier rates are
    /// checked here and reported as configuration errors.
    pub fn validate(&self) -> DomainResult<()> {
        match self {
            DiscountConfig::None => Ok(()),
            DiscountConfig::Amount { value } => {
                if *value < Decimal::ZERO {
                    return Err(DomainError::validation(format!(
                        "discount amount must not be negative, got {value}"
                    )));
                }
                Ok(())
            }
            DiscountConfig::Percent { rate } => {
                if !is_percentage(*rate) {
                    return Err(DomainError::validation(format!(
                        "discount percent must be between 0 and 100, got {rate}"
                    )));
                }
                Ok(())
            }
            DiscountConfig::Tiered(tiered) => {
                if let Some(tier) = tiered.tiers.tiers().iter().find(|t| !is_percentage(t.value)) {
                    return Err(DomainError::configuration(format!(
                        "tier rate at threshold {} must be between 0 and 100, got {}",
                        tier.threshold, tier.value
                    )));
                }
                Ok(())
            }
        }
    }
}

impl ValueObject for DiscountConfig {}

/// Discount for a line with subtotal `base` and quantity `quantity`.
///
/// `quantity` is only consulted by tiered discounts on a quantity basis.
pub fn apply(base: Decimal, quantity: Decimal, config: &DiscountConfig) -> DomainResult<Decimal> {
    let raw = match config {
        DiscountConfig::None => Decimal::ZERO,
        DiscountConfig::Amount { value } => *value,
        DiscountConfig::Percent { rate } => percent_of(base, *rate)?,
        DiscountConfig::Tiered(tiered) => {
            let basis = match tiered.basis {
                TierBasis::Quantity => quantity,
                TierBasis::Amount => base,
            };
            tiered
                .tiers
                .select(basis)
                .map(|tier| percent_of(base, tier.value))
                .transpose()?
                .unwrap_or(Decimal::ZERO)
        }
    };
    Ok(clamp(raw, base))
}

/// `rate` percent of `base`; overflow is a validation error.
pub(crate) fn percent_of(base: Decimal, rate: Decimal) -> DomainResult<Decimal> {
    base.checked_mul(rate)
        .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
        .ok_or_else(|| DomainError::validation(format!("amount overflow taking {rate}% of {base}")))
}

pub(crate) fn is_percentage(rate: Decimal) -> bool {
    rate >= Decimal::ZERO && rate <= Decimal::ONE_HUNDRED
}

fn clamp(amount: Decimal, base: Decimal) -> Decimal {
    amount.min(base).max(Decimal::ZERO)
}
