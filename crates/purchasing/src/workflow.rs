//! Purchase order workflow.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use docflow_core::{DomainResult, UserId};
use docflow_workflow::{
    EventPayload, Snapshot, StateDef, Transition, WorkflowDefinition, WorkflowEngine,
};

pub const WORKFLOW_NAME: &str = "purchase_order";

pub mod states {
    pub const DRAFT: &str = "draft";
    pub const SUBMITTED: &str = "submitted";
    pub const APPROVED: &str = "approved";
    pub const RECEIVED: &str = "received";
    pub const BILLED: &str = "billed";
    pub const REJECTED: &str = "rejected";
}

pub mod events {
    pub const SUBMIT: &str = "submit";
    pub const APPROVE: &str = "approve";
    pub const REJECT: &str = "reject";
    pub const RECEIVE: &str = "receive";
    pub const BILL: &str = "bill";
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PurchaseOrderHeader {
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub received_by: Option<UserId>,
    pub received_at: Option<DateTime<Utc>>,
    pub billed_at: Option<DateTime<Utc>>,
    /// Supplier's bill reference, taken from the `bill` event's reason.
    pub bill_reference: Option<String>,
}

impl PurchaseOrderHeader {
    pub fn apply(&mut self, patch: &PurchaseOrderPatch) {
        match patch {
            PurchaseOrderPatch::Approved { by, at } => {
                self.approved_by = Some(*by);
                self.approved_at = Some(*at);
            }
            PurchaseOrderPatch::Rejected { reason } => {
                self.rejection_reason = Some(reason.clone());
            }
            PurchaseOrderPatch::Received { by, at } => {
                self.received_by = Some(*by);
                self.received_at = Some(*at);
            }
            PurchaseOrderPatch::Billed { at, reference } => {
                self.billed_at = Some(*at);
                self.bill_reference = reference.clone();
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PurchaseOrderPatch {
    Approved { by: UserId, at: DateTime<Utc> },
    Rejected { reason: String },
    Received { by: UserId, at: DateTime<Utc> },
    Billed { at: DateTime<Utc>, reference: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrderSnapshot {
    pub line_count: usize,
    pub grand_total: Decimal,
    pub header: PurchaseOrderHeader,
}

impl Snapshot for PurchaseOrderSnapshot {
    type Patch = PurchaseOrderPatch;

    fn apply_patch(&mut self, patch: &PurchaseOrderPatch) {
        self.header.apply(patch);
    }
}

fn has_lines(s: &PurchaseOrderSnapshot, _: &EventPayload) -> Result<(), String> {
    if s.line_count == 0 {
        return Err("purchase order has no lines".to_string());
    }
    Ok(())
}

fn positive_total(s: &PurchaseOrderSnapshot, _: &EventPayload) -> Result<(), String> {
    if s.grand_total <= Decimal::ZERO {
        return Err("total must be greater than zero".to_string());
    }
    Ok(())
}

fn has_reason(_: &PurchaseOrderSnapshot, p: &EventPayload) -> Result<(), String> {
    p.reason()
        .map(|_| ())
        .ok_or_else(|| "a rejection reason is required".to_string())
}

fn record_approval(_: &PurchaseOrderSnapshot, p: &EventPayload) -> PurchaseOrderPatch {
    PurchaseOrderPatch::Approved {
        by: p.actor,
        at: p.occurred_at,
    }
}

fn record_rejection(_: &PurchaseOrderSnapshot, p: &EventPayload) -> PurchaseOrderPatch {
    PurchaseOrderPatch::Rejected {
        reason: p.reason().unwrap_or_default().to_string(),
    }
}

fn record_receipt(_: &PurchaseOrderSnapshot, p: &EventPayload) -> PurchaseOrderPatch {
    PurchaseOrderPatch::Received {
        by: p.actor,
        at: p.occurred_at,
    }
}

fn record_bill(_: &PurchaseOrderSnapshot, p: &EventPayload) -> PurchaseOrderPatch {
    PurchaseOrderPatch::Billed {
        at: p.occurred_at,
        reference: p.reason().map(str::to_string),
    }
}

pub fn definition() -> DomainResult<WorkflowDefinition<PurchaseOrderSnapshot>> {
    use self::events::*;
    use self::states::*;

    WorkflowDefinition::builder(WORKFLOW_NAME, DRAFT)
        .state(StateDef::new(DRAFT, "Draft").editable())
        .state(StateDef::new(SUBMITTED, "Submitted"))
        .state(StateDef::new(APPROVED, "Approved"))
        .state(StateDef::new(RECEIVED, "Received"))
        .state(StateDef::new(BILLED, "Billed").terminal())
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
        .transition(Transition::new(APPROVED, RECEIVE, RECEIVED).with_effect(record_receipt))
        .transition(Transition::new(RECEIVED, BILL, BILLED).with_effect(record_bill))
        .build()
}

pub fn engine() -> DomainResult<WorkflowEngine<PurchaseOrderSnapshot>> {
    Ok(WorkflowEngine::new(definition()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use docflow_core::DomainError;
    use rust_decimal_macros::dec;

    fn snapshot(line_count: usize, grand_total: Decimal) -> PurchaseOrderSnapshot {
        PurchaseOrderSnapshot {
            line_count,
            grand_total,
            header: PurchaseOrderHeader::default(),
        }
    }

    fn payload() -> EventPayload {
        EventPayload::new(UserId::new(), Utc.with_ymd_and_hms(2025, 5, 2, 8, 30, 0).unwrap())
    }

    #[test]
    fn definition_is_valid() {
        let def = definition().unwrap();
        assert_eq!(def.initial().as_str(), states::DRAFT);
        let terminal: Vec<&str> = def
            .states()
            .iter()
            .filter(|s| s.is_terminal)
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(terminal, [states::BILLED, states::REJECTED]);
    }

    #[test]
    fn cannot_receive_before_approval() {
        let engine = engine().unwrap();
        let submitted = engine
            .transition(&engine.start(), &snapshot(1, dec!(10)), events::SUBMIT, &payload())
            .unwrap()
            .instance;

        let err = engine
            .transition(&submitted, &snapshot(1, dec!(10)), events::RECEIVE, &payload())
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::invalid_transition(states::SUBMITTED, events::RECEIVE)
        );
    }

    #[test]
    fn rejection_needs_a_reason() {
        let engine = engine().unwrap();
        let submitted = engine
            .transition(&engine.start(), &snapshot(1, dec!(10)), events::SUBMIT, &payload())
            .unwrap()
            .instance;

        let err = engine
            .transition(&submitted, &snapshot(1, dec!(10)), events::REJECT, &payload().with_reason("   "))
            .unwrap_err();
        assert_eq!(err, DomainError::guard_rejected("a rejection reason is required"));

        let rejected = engine
            .transition(
                &submitted,
                &snapshot(1, dec!(10)),
                events::REJECT,
                &payload().with_reason("supplier out of stock"),
            )
            .unwrap();
        assert_eq!(rejected.instance.current().as_str(), states::REJECTED);
        assert_eq!(
            rejected.snapshot.header.rejection_reason.as_deref(),
            Some("supplier out of stock")
        );
    }

    #[test]
    fn bill_records_supplier_reference() {
        let engine = engine().unwrap();
        let p = payload();
        let mut step = engine
            .transition(&engine.start(), &snapshot(2, dec!(500)), events::SUBMIT, &p)
            .unwrap();
        for event in [events::APPROVE, events::RECEIVE] {
            step = engine.transition(&step.instance, &step.snapshot, event, &p).unwrap();
        }
        let billed = engine
            .transition(&step.instance, &step.snapshot, events::BILL, &p.clone().with_reason("SUP-INV-88"))
            .unwrap();

        assert_eq!(billed.instance.current().as_str(), states::BILLED);
        assert_eq!(billed.snapshot.header.received_by, Some(p.actor));
        assert_eq!(billed.snapshot.header.bill_reference.as_deref(), Some("SUP-INV-88"));
        assert_eq!(billed.instance.history().len(), 4);
    }
}
