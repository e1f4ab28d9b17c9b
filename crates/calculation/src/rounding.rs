//! Rounding strategies for monetary amounts.
//!
//! Rounding is applied once, to a final total. Intermediate values (subtotal,
//! discount, tax) always keep full precision.

use core::fmt;
use core::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use docflow_core::{DomainError, DomainResult};

/// Unit used by [`RoundingMode::Indonesian`].
pub const INDONESIAN_UNIT: Decimal = Decimal::ONE_HUNDRED;

/// Largest scale a `Decimal` can carry.
const MAX_DECIMALS: u32 = 28;

/// Rounding policy selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum RoundingMode {
    /// Keep full precision.
    #[default]
    None,
    /// Round to a number of decimal places, half away from zero.
    Standard(u32),
    /// Round to the nearest 100, half away from zero.
    Indonesian,
    /// Round toward positive infinity to the next multiple of the unit.
    RoundUp(Decimal),
    /// Round to the nearest multiple of the unit, half away from zero.
    Nearest(Decimal),
}

impl RoundingMode {
    /// Check the mode's parameters.
    pub fn validate(&self) -> DomainResult<()> {
        match self {
            RoundingMode::None | RoundingMode::Indonesian => Ok(()),
            RoundingMode::Standard(dp) => {
                if *dp > MAX_DECIMALS {
                    return Err(DomainError::configuration(format!(
                        "standard rounding supports at most {MAX_DECIMALS} decimals, got {dp}"
                    )));
                }
                Ok(())
            }
            RoundingMode::RoundUp(unit) | RoundingMode::Nearest(unit) => {
                if *unit <= Decimal::ZERO {
                    return Err(DomainError::configuration(format!(
                        "rounding unit must be positive, got {unit}"
                    )));
                }
                Ok(())
            }
        }
    }
}

/// Round `amount` according to `mode`.
pub fn round(amount: Decimal, mode: RoundingMode) -> DomainResult<Decimal> {
    mode.validate()?;
    match mode {
        RoundingMode::None => Ok(amount),
        RoundingMode::Standard(dp) => {
            Ok(amount.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero))
        }
        RoundingMode::Indonesian => to_nearest(amount, INDONESIAN_UNIT),
        RoundingMode::Nearest(unit) => to_nearest(amount, unit),
        RoundingMode::RoundUp(unit) => up_to(amount, unit),
    }
}

fn to_nearest(amount: Decimal, unit: Decimal) -> DomainResult<Decimal> {
    let units = amount
        .checked_div(unit)
        .ok_or_else(|| DomainError::validation("amount overflow while rounding"))?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    units
        .checked_mul(unit)
        .map(|v| v.normalize())
        .ok_or_else(|| DomainError::validation("amount overflow while rounding"))
}

fn up_to(amount: Decimal, unit: Decimal) -> DomainResult<Decimal> {
    let units = amount
        .checked_div(unit)
        .ok_or_else(|| DomainError::validation("amount overflow while rounding"))?
        .ceil();
    units
        .checked_mul(unit)
        .map(|v| v.normalize())
        .ok_or_else(|| DomainError::validation("amount overflow while rounding"))
}

impl fmt::Display for RoundingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundingMode::None => f.write_str("none"),
            RoundingMode::Standard(dp) => write!(f, "standard:{dp}"),
            RoundingMode::Indonesian => f.write_str("indonesian"),
            RoundingMode::RoundUp(unit) => write!(f, "round_up:{unit}"),
            RoundingMode::Nearest(unit) => write!(f, "nearest:{unit}"),
        }
    }
}

/// Parses the compact form used in environment variables:
/// `none`, `indonesian`, `standard:<dp>`, `round_up:<unit>`, `nearest:<unit>`.
impl FromStr for RoundingMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name.trim(), Some(arg.trim())),
            None => (s, None),
        };

        let unit = |arg: Option<&str>| -> DomainResult<Decimal> {
            let raw = arg.ok_or_else(|| {
                DomainError::configuration(format!("rounding mode '{name}' needs a unit"))
            })?;
            Decimal::from_str(raw).map_err(|e| {
                DomainError::configuration(format!("invalid rounding unit '{raw}': {e}"))
            })
        };

        let mode = match (name.to_ascii_lowercase().as_str(), arg) {
            ("none", None) => RoundingMode::None,
            ("indonesian", None) => RoundingMode::Indonesian,
            ("standard", Some(raw)) => {
                let dp = raw.parse::<u32>().map_err(|e| {
                    DomainError::configuration(format!("invalid decimal places '{raw}': {e}"))
                })?;
                RoundingMode::Standard(dp)
            }
            ("round_up", arg) => RoundingMode::RoundUp(unit(arg)?),
            ("nearest", arg) => RoundingMode::Nearest(unit(arg)?),
            _ => {
                return Err(DomainError::configuration(format!(
                    "unknown rounding mode '{s}'"
                )));
            }
        };
        mode.validate()?;
        Ok(mode)
    }
}
