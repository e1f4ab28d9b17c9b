//! Tax strategies (exclusive / inclusive pricing).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use docflow_core::{DomainError, DomainResult, ValueObject};

use crate::discount::{is_percentage, percent_of};

/// Tax configuration of a line item. Rates are percentages (0-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaxConfig {
    #[default]
    None,
    /// Tax is added on top of the price.
    Exclusive { rate: Decimal },
    /// Tax is already embedded in the price and is backed out of it.
    Inclusive { rate: Decimal },
}

impl TaxConfig {
    pub fn exclusive(rate: Decimal) -> DomainResult<Self> {
        let config = Self::Exclusive { rate };
        config.validate()?;
        Ok(config)
    }

    pub fn inclusive(rate: Decimal) -> DomainResult<Self> {
        let config = Self::Inclusive { rate };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DomainResult<()> {
        match self {
            TaxConfig::None => Ok(()),
            TaxConfig::Exclusive { rate } | TaxConfig::Inclusive { rate } => {
                if !is_percentage(*rate) {
                    return Err(DomainError::validation(format!(
                        "tax rate must be between 0 and 100, got {rate}"
                    )));
                }
                Ok(())
            }
        }
    }

    pub fn is_inclusive(&self) -> bool {
        matches!(self, TaxConfig::Inclusive { .. })
    }

    pub fn rate(&self) -> Decimal {
        match self {
            TaxConfig::None => Decimal::ZERO,
            TaxConfig::Exclusive { rate } | TaxConfig::Inclusive { rate } => *rate,
        }
    }
}

impl ValueObject for TaxConfig {}

/// Tax amount for `base`.
///
/// For inclusive tax `base` is treated as tax-included and the embedded tax is
/// returned; the reporting taxable base is then `base - tax`.
pub fn apply(base: Decimal, config: &TaxConfig) -> DomainResult<Decimal> {
    match config {
        TaxConfig::None => Ok(Decimal::ZERO),
        TaxConfig::Exclusive { rate } => percent_of(base, *rate),
        TaxConfig::Inclusive { rate } => {
            let overflow = || {
                DomainError::validation(format!("amount overflow backing {rate}% tax out of {base}"))
            };
            let divisor = (*rate / Decimal::ONE_HUNDRED)
                .checked_add(Decimal::ONE)
                .ok_or_else(overflow)?;
            let net = base.checked_div(divisor).ok_or_else(overflow)?;
            base.checked_sub(net).ok_or_else(overflow)
        }
    }
}
