//! Calculation settings (rounding policy).
//!
//! Settings are plain serde data so the embedding application can store them
//! per tenant or per document type. `from_env` reads process defaults.

use serde::{Deserialize, Serialize};

use docflow_core::{DomainError, DomainResult};

use crate::rounding::RoundingMode;

/// Environment variable holding the rounding mode (e.g. `indonesian`, `standard:2`).
pub const ROUNDING_ENV: &str = "DOCFLOW_ROUNDING";
/// Environment variable toggling per-line rounding (`true` / `false`).
pub const PER_LINE_ROUNDING_ENV: &str = "DOCFLOW_PER_LINE_ROUNDING";

/// How a document's totals are rounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculationSettings {
    /// Rounding applied to final totals.
    pub rounding: RoundingMode,
    /// When set, each line total is rounded once and the grand total is the
    /// sum of those; otherwise the grand total is rounded once.
    pub per_line_rounding: bool,
}

impl CalculationSettings {
    pub fn new(rounding: RoundingMode) -> Self {
        Self {
            rounding,
            per_line_rounding: false,
        }
    }

    pub fn per_line(mut self) -> Self {
        self.per_line_rounding = true;
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        self.rounding.validate()
    }

    /// Parse settings from JSON, e.g. `{"rounding":{"mode":"indonesian"}}`.
    pub fn from_json(raw: &str) -> DomainResult<Self> {
        let settings: Self = serde_json::from_str(raw)
            .map_err(|e| DomainError::configuration(format!("calculation settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read settings from the process environment.
    ///
    /// Missing variables use the defaults; malformed values are logged and
    /// replaced by the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let rounding = match lookup(ROUNDING_ENV) {
            None => defaults.rounding,
            Some(raw) => raw.parse::<RoundingMode>().unwrap_or_else(|err| {
                tracing::warn!(
                    variable = ROUNDING_ENV,
                    value = %raw,
                    error = %err,
                    "invalid rounding mode; using default"
                );
                defaults.rounding
            }),
        };

        let per_line_rounding = match lookup(PER_LINE_ROUNDING_ENV) {
            None => defaults.per_line_rounding,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    tracing::warn!(
                        variable = PER_LINE_ROUNDING_ENV,
                        value = %raw,
                        "invalid boolean; using default"
                    );
                    defaults.per_line_rounding
                }
            },
        };

        Self {
            rounding,
            per_line_rounding,
        }
    }
}
