//! Workflow instances, their history, and event payloads.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use docflow_core::{DomainError, DomainResult, UserId};

use crate::definition::{EventName, StateId};

/// Data accompanying a triggered event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Monetary amount carried by the event (e.g. a payment).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
}

impl EventPayload {
    pub fn new(actor: UserId, occurred_at: DateTime<Utc>) -> Self {
        Self {
            actor,
            occurred_at,
            reason: None,
            amount: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_amount(mut self, amount: Decimal) -> Self {
        self.amount = Some(amount);
        self
    }

    /// The reason, if present and not blank.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref().map(str::trim).filter(|r| !r.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub from: StateId,
    pub to: StateId,
    pub event: EventName,
    pub at: DateTime<Utc>,
    pub actor: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Current state of one document in a workflow, with its history.
///
/// History is append-only. Instances are values: advancing one returns a new
/// instance and leaves the original untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowInstance {
    workflow: String,
    current: StateId,
    #[serde(default)]
    history: Vec<HistoryEntry>,
}

impl WorkflowInstance {
    /// Instance in `initial` with no history. Prefer [`WorkflowEngine::start`].
    ///
    /// [`WorkflowEngine::start`]: crate::WorkflowEngine::start
    pub fn new(workflow: impl Into<String>, initial: StateId) -> Self {
        Self {
            workflow: workflow.into(),
            current: initial,
            history: Vec::new(),
        }
    }

    pub fn workflow(&self) -> &str {
        &self.workflow
    }

    pub fn current(&self) -> &StateId {
        &self.current
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn last_entry(&self) -> Option<&HistoryEntry> {
        self.history.last()
    }

    pub(crate) fn advanced(&self, entry: HistoryEntry) -> Self {
        let mut next = self.clone();
        next.current = entry.to.clone();
        next.history.push(entry);
        next
    }

    /// Re-apply a recorded history entry.
    ///
    /// The entry must start from the current state; anything else means the
    /// recorded stream is out of order or belongs to another document.
    pub fn replay(&self, entry: &HistoryEntry) -> DomainResult<Self> {
        if entry.from != self.current {
            return Err(DomainError::invariant(format!(
                "workflow '{}': recorded '{}' starts from '{}' but the instance is in '{}'",
                self.workflow, entry.event, entry.from, self.current
            )));
        }
        Ok(self.advanced(entry.clone()))
    }
}
