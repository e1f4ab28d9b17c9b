//! Numbering sequences.
//!
//! A sequence is a plain value. `next` never mutates it; it returns the issued
//! number together with the advanced sequence, which the caller persists.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use docflow_core::{DomainError, DomainResult};

/// Widest zero padding accepted (u64 has 20 digits).
pub const MAX_WIDTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberingPolicy {
    /// One counter for the lifetime of the sequence.
    #[default]
    Sequential,
    /// Counter restarts at 1 in every calendar month.
    MonthlyReset,
    /// Counter restarts at 1 in every calendar year.
    YearlyReset,
}

impl NumberingPolicy {
    /// Period key of `on`, or `None` when the policy never resets.
    ///
    /// Keys sort in calendar order (`YYYY-MM`, `YYYY`).
    pub fn period_key(self, on: NaiveDate) -> Option<String> {
        match self {
            NumberingPolicy::Sequential => None,
            NumberingPolicy::MonthlyReset => Some(on.format("%Y-%m").to_string()),
            NumberingPolicy::YearlyReset => Some(on.format("%Y").to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumberingSequence {
    pub policy: NumberingPolicy,
    pub prefix: String,
    /// Zero-pad width of the counter. Counters wider than this are not truncated.
    pub width: usize,
    /// Last issued counter (0 = nothing issued yet in the current period).
    #[serde(default)]
    pub counter: u64,
    /// Period of the last issued number, for reset policies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
}

impl NumberingSequence {
    pub fn new(prefix: impl Into<String>, width: usize, policy: NumberingPolicy) -> DomainResult<Self> {
        let sequence = Self {
            policy,
            prefix: prefix.into(),
            width,
            counter: 0,
            period: None,
        };
        sequence.validate()?;
        Ok(sequence)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.prefix.trim().is_empty() {
            return Err(DomainError::configuration("numbering prefix must not be empty"));
        }
        if self.width == 0 || self.width > MAX_WIDTH {
            return Err(DomainError::configuration(format!(
                "numbering width must be between 1 and {MAX_WIDTH}, got {}",
                self.width
            )));
        }
        Ok(())
    }

    /// Issue the next number for a document dated `on`.
    pub fn next(&self, on: NaiveDate) -> DomainResult<(String, NumberingSequence)> {
        let period = self.policy.period_key(on);

        let counter = match (&self.period, &period) {
            (Some(stored), Some(current)) if current < stored => {
                return Err(DomainError::validation(format!(
                    "sequence {} is already in period {stored}; cannot issue for {current}",
                    self.prefix
                )));
            }
            (Some(stored), Some(current)) if current == stored => self.bump()?,
            (_, Some(_)) => 1,
            (_, None) => self.bump()?,
        };

        let number = self.format(counter, period.as_deref());
        let advanced = NumberingSequence {
            counter,
            period,
            ..self.clone()
        };
        Ok((number, advanced))
    }

    /// The number `next` would issue, without consuming it.
    pub fn peek(&self, on: NaiveDate) -> DomainResult<String> {
        self.next(on).map(|(number, _)| number)
    }

    fn bump(&self) -> DomainResult<u64> {
        self.counter
            .checked_add(1)
            .ok_or_else(|| DomainError::invariant(format!("sequence {} is exhausted", self.prefix)))
    }

    fn format(&self, counter: u64, period: Option<&str>) -> String {
        let width = self.width;
        match period {
            Some(period) => format!("{}-{period}-{counter:0width$}", self.prefix),
            None => format!("{}-{counter:0width$}", self.prefix),
        }
    }
}
