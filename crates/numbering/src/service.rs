//! Numbering Service: one sequence per scope (document type).
//!
//! The registry is caller-owned state; concurrent issuance for the same scope
//! must be serialized by the caller.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use docflow_core::{DomainError, DomainResult};

use crate::sequence::{NumberingPolicy, NumberingSequence};

fn default_width() -> usize {
    4
}

/// Static configuration of one sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceConfig {
    pub prefix: String,
    #[serde(default = "default_width")]
    pub width: usize,
    #[serde(default)]
    pub policy: NumberingPolicy,
}

impl SequenceConfig {
    pub fn build(&self) -> DomainResult<NumberingSequence> {
        NumberingSequence::new(self.prefix.clone(), self.width, self.policy)
    }
}

/// Scope -> sequence configuration, e.g.
/// `{"invoice":{"prefix":"INV","policy":"monthly_reset"}}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NumberingConfig {
    pub sequences: BTreeMap<String, SequenceConfig>,
}

impl NumberingConfig {
    pub fn from_json(raw: &str) -> DomainResult<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| DomainError::configuration(format!("numbering config: {e}")))?;
        for (scope, sequence) in &config.sequences {
            sequence
                .build()
                .map_err(|e| DomainError::configuration(format!("scope '{scope}': {e}")))?;
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NumberingService {
    sequences: BTreeMap<String, NumberingSequence>,
}

impl NumberingService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh sequences (counter 0) for every configured scope.
    pub fn from_config(config: &NumberingConfig) -> DomainResult<Self> {
        let mut service = Self::new();
        for (scope, sequence) in &config.sequences {
            service.register(scope.clone(), sequence.build()?)?;
        }
        Ok(service)
    }

    /// Add a sequence, e.g. one restored from storage.
    pub fn register(&mut self, scope: impl Into<String>, sequence: NumberingSequence) -> DomainResult<()> {
        let scope = scope.into();
        sequence.validate()?;
        if self.sequences.contains_key(&scope) {
            return Err(DomainError::conflict(format!(
                "numbering scope '{scope}' already registered"
            )));
        }
        self.sequences.insert(scope, sequence);
        Ok(())
    }

    pub fn sequence(&self, scope: &str) -> Option<&NumberingSequence> {
        self.sequences.get(scope)
    }

    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.sequences.keys().map(String::as_str)
    }

    /// Issue the next number for `scope`. The stored sequence only advances
    /// when a number is actually issued.
    pub fn issue(&mut self, scope: &str, on: NaiveDate) -> DomainResult<String> {
        let current = self
            .sequences
            .get_mut(scope)
            .ok_or_else(|| DomainError::not_found(format!("numbering scope '{scope}'")))?;
        let (number, advanced) = current.next(on)?;
        *current = advanced;

        tracing::info!(scope, number = %number, counter = current.counter, "issued document number");
        Ok(number)
    }

    pub fn peek(&self, scope: &str, on: NaiveDate) -> DomainResult<String> {
        self.sequences
            .get(scope)
            .ok_or_else(|| DomainError::not_found(format!("numbering scope '{scope}'")))?
            .peek(on)
    }
}
