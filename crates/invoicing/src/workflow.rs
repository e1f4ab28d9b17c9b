//! Invoice workflow.
//!
//! `record_payment` has two candidates from every payable state: the partial
//! one is declared first, so a payment below the outstanding amount lands in
//! `partial` and one that settles the invoice lands in `paid`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use docflow_core::DomainResult;
use docflow_workflow::{
    EventPayload, Snapshot, StateDef, Transition, WorkflowDefinition, WorkflowEngine,
};

pub const WORKFLOW_NAME: &str = "invoice";

pub mod states {
    pub const DRAFT: &str = "draft";
    pub const SENT: &str = "sent";
    pub const PARTIAL: &str = "partial";
    pub const OVERDUE: &str = "overdue";
    pub const PAID: &str = "paid";
    pub const VOID: &str = "void";
}

pub mod events {
    pub const SEND: &str = "send";
    pub const RECORD_PAYMENT: &str = "record_payment";
    pub const OVERDUE: &str = "overdue";
    pub const VOID: &str = "void";
}

/// Invoice data changed by workflow side effects.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InvoiceHeader {
    pub amount_paid: Decimal,
    pub sent_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub voided_at: Option<DateTime<Utc>>,
    pub void_reason: Option<String>,
}

impl InvoiceHeader {
    pub fn apply(&mut self, patch: &InvoicePatch) {
        match patch {
            InvoicePatch::Sent { at } => self.sent_at = Some(*at),
            InvoicePatch::PaymentRecorded { amount, at, settled } => {
                self.amount_paid += *amount;
                if *settled {
                    self.paid_at = Some(*at);
                }
            }
            InvoicePatch::Voided { at, reason } => {
                self.voided_at = Some(*at);
                self.void_reason = reason.clone();
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvoicePatch {
    Sent {
        at: DateTime<Utc>,
    },
    PaymentRecorded {
        amount: Decimal,
        at: DateTime<Utc>,
        settled: bool,
    },
    Voided {
        at: DateTime<Utc>,
        reason: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceSnapshot {
    pub line_count: usize,
    pub grand_total: Decimal,
    pub due_date: NaiveDate,
    pub header: InvoiceHeader,
}

impl InvoiceSnapshot {
    pub fn outstanding(&self) -> Decimal {
        (self.grand_total - self.header.amount_paid).max(Decimal::ZERO)
    }
}

impl Snapshot for InvoiceSnapshot {
    type Patch = InvoicePatch;

    fn apply_patch(&mut self, patch: &InvoicePatch) {
        self.header.apply(patch);
    }
}

fn positive_total(s: &InvoiceSnapshot, _: &EventPayload) -> Result<(), String> {
    if s.grand_total <= Decimal::ZERO {
        return Err("total must be greater than zero".to_string());
    }
    Ok(())
}

/// Payment amount, if it is positive and within the outstanding amount.
fn payment_amount(s: &InvoiceSnapshot, p: &EventPayload) -> Result<Decimal, String> {
    let amount = p.amount.ok_or_else(|| "payment amount is required".to_string())?;
    if amount <= Decimal::ZERO {
        return Err("payment amount must be greater than zero".to_string());
    }
    let outstanding = s.outstanding();
    if amount > outstanding {
        return Err(format!(
            "payment of {amount} exceeds the outstanding amount of {outstanding}"
        ));
    }
    Ok(amount)
}

fn partial_payment(s: &InvoiceSnapshot, p: &EventPayload) -> Result<(), String> {
    if payment_amount(s, p)? == s.outstanding() {
        return Err("payment settles the invoice in full".to_string());
    }
    Ok(())
}

fn full_payment(s: &InvoiceSnapshot, p: &EventPayload) -> Result<(), String> {
    if payment_amount(s, p)? < s.outstanding() {
        return Err("payment does not settle the invoice".to_string());
    }
    Ok(())
}

fn past_due(s: &InvoiceSnapshot, p: &EventPayload) -> Result<(), String> {
    if p.occurred_at.date_naive() <= s.due_date {
        return Err(format!("invoice is not past its due date {}", s.due_date));
    }
    Ok(())
}

fn record_sent(_: &InvoiceSnapshot, p: &EventPayload) -> InvoicePatch {
    InvoicePatch::Sent { at: p.occurred_at }
}

fn record_partial_payment(_: &InvoiceSnapshot, p: &EventPayload) -> InvoicePatch {
    InvoicePatch::PaymentRecorded {
        amount: p.amount.unwrap_or_default(),
        at: p.occurred_at,
        settled: false,
    }
}

fn record_full_payment(_: &InvoiceSnapshot, p: &EventPayload) -> InvoicePatch {
    InvoicePatch::PaymentRecorded {
        amount: p.amount.unwrap_or_default(),
        at: p.occurred_at,
        settled: true,
    }
}

fn record_void(_: &InvoiceSnapshot, p: &EventPayload) -> InvoicePatch {
    InvoicePatch::Voided {
        at: p.occurred_at,
        reason: p.reason().map(str::to_string),
    }
}

pub fn definition() -> DomainResult<WorkflowDefinition<InvoiceSnapshot>> {
    use self::events::*;
    use self::states::*;

    let mut builder = WorkflowDefinition::builder(WORKFLOW_NAME, DRAFT)
        .state(StateDef::new(DRAFT, "Draft").editable())
        .state(StateDef::new(SENT, "Sent"))
        .state(StateDef::new(PARTIAL, "Partially paid"))
        .state(StateDef::new(states::OVERDUE, "Overdue"))
        .state(StateDef::new(PAID, "Paid").terminal())
        .state(StateDef::new(states::VOID, "Void").terminal())
        .transition(
            Transition::new(DRAFT, SEND, SENT)
                .guarded(positive_total)
                .with_effect(record_sent),
        );

    for from in [SENT, PARTIAL, states::OVERDUE] {
        builder = builder
            .transition(
                Transition::new(from, RECORD_PAYMENT, PARTIAL)
                    .guarded(partial_payment)
                    .with_effect(record_partial_payment),
            )
            .transition(
                Transition::new(from, RECORD_PAYMENT, PAID)
                    .guarded(full_payment)
                    .with_effect(record_full_payment),
            );
    }

    for from in [SENT, PARTIAL] {
        builder = builder.transition(
            Transition::new(from, events::OVERDUE, states::OVERDUE).guarded(past_due),
        );
    }

    builder
        .from_any_non_terminal(Transition::from_any(events::VOID, states::VOID).with_effect(record_void))
        .build()
}

pub fn engine() -> DomainResult<WorkflowEngine<InvoiceSnapshot>> {
    Ok(WorkflowEngine::new(definition()?))
}
