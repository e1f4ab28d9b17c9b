//! Quotation workflow: states, transitions, guards.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use docflow_core::{DomainResult, UserId};
use docflow_workflow::{
    EventPayload, Snapshot, StateDef, Transition, WorkflowDefinition, WorkflowEngine,
};

pub const WORKFLOW_NAME: &str = "quotation";

pub mod states {
    pub const DRAFT: &str = "draft";
    pub const SUBMITTED: &str = "submitted";
    pub const APPROVED: &str = "approved";
    pub const CONVERTED: &str = "converted";
    pub const REJECTED: &str = "rejected";
}

pub mod events {
    pub const SUBMIT: &str = "submit";
    pub const APPROVE: &str = "approve";
    pub const REJECT: &str = "reject";
    pub const CONVERT: &str = "convert";
    pub const REVISE: &str = "revise";
}

/// Header data changed by workflow side effects.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuotationHeader {
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub converted_at: Option<DateTime<Utc>>,
}

impl QuotationHeader {
    pub fn apply(&mut self, patch: &QuotationPatch) {
        match patch {
            QuotationPatch::Approved { by, at } => {
                self.approved_by = Some(*by);
                self.approved_at = Some(*at);
            }
            QuotationPatch::Rejected { reason } => {
                self.rejection_reason = Some(reason.clone());
            }
            QuotationPatch::Converted { at } => {
                self.converted_at = Some(*at);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuotationPatch {
    Approved { by: UserId, at: DateTime<Utc> },
    Rejected { reason: String },
    Converted { at: DateTime<Utc> },
}

/// What the quotation guards see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotationSnapshot {
    pub line_count: usize,
    pub grand_total: Decimal,
    pub header: QuotationHeader,
}

impl Snapshot for QuotationSnapshot {
    type Patch = QuotationPatch;

    fn apply_patch(&mut self, patch: &QuotationPatch) {
        self.header.apply(patch);
    }
}

fn has_lines(s: &QuotationSnapshot, _: &EventPayload) -> Result<(), String> {
    if s.line_count == 0 {
        return Err("quotation has no lines".to_string());
    }
    Ok(())
}

fn positive_total(s: &QuotationSnapshot, _: &EventPayload) -> Result<(), String> {
    if s.grand_total <= Decimal::ZERO {
        return Err("total must be greater than zero".to_string());
    }
    Ok(())
}

fn has_reason(_: &QuotationSnapshot, p: &EventPayload) -> Result<(), String> {
    p.reason()
        .map(|_| ())
        .ok_or_else(|| "a rejection reason is required".to_string())
}

fn record_approval(_: &QuotationSnapshot, p: &EventPayload) -> QuotationPatch {
    QuotationPatch::Approved {
        by: p.actor,
        at: p.occurred_at,
    }
}

fn record_rejection(_: &QuotationSnapshot, p: &EventPayload) -> QuotationPatch {
    QuotationPatch::Rejected {
        reason: p.reason().unwrap_or_default().to_string(),
    }
}

fn record_conversion(_: &QuotationSnapshot, p: &EventPayload) -> QuotationPatch {
    QuotationPatch::Converted { at: p.occurred_at }
}

pub fn definition() -> DomainResult<WorkflowDefinition<QuotationSnapshot>> {
    use self::events::*;
    use self::states::*;

    WorkflowDefinition::builder(WORKFLOW_NAME, DRAFT)
        .state(StateDef::new(DRAFT, "Draft").editable())
        .state(StateDef::new(SUBMITTED, "Submitted"))
        .state(StateDef::new(APPROVED, "Approved"))
        .state(StateDef::new(CONVERTED, "Converted").terminal())
        .state(StateDef::new(REJECTED, "Rejected").terminal())
        .transition(Transition::new(DRAFT, SUBMIT, SUBMITTED).guarded(has_lines))
        .transition(
            Transition::new(SUBMITTED, APPROVE, APPROVED)
                .guarded(positive_total)
                .with_effect(record_approval),
        )
        .transition(
            Transition::new(SUBMITTED, REJECT, REJECTED)
                .guarded(has_reason)
                .with_effect(record_rejection),
        )
        .transition(Transition::new(APPROVED, CONVERT, CONVERTED).with_effect(record_conversion))
        .transition(Transition::new(APPROVED, REVISE, DRAFT))
        .build()
}

pub fn engine() -> DomainResult<WorkflowEngine<QuotationSnapshot>> {
    Ok(WorkflowEngine::new(definition()?))
}
