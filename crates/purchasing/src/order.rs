//! Purchase order aggregate.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use docflow_calculation::{
    CalculationService, CalculationSettings, DocumentTotals, LineCommand, LineItem,
    LineItemsManager,
};
use docflow_core::{Aggregate, AggregateRoot, DocumentId, DomainError, DomainResult, Event, PartyId};
use docflow_workflow::{EventName, EventPayload, HistoryEntry, StateDef, StateId, WorkflowInstance};

use crate::workflow::{
    self, PurchaseOrderHeader, PurchaseOrderPatch, PurchaseOrderSnapshot, WORKFLOW_NAME, states,
};

/// Aggregate root: PurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrder {
    id: DocumentId,
    number: String,
    supplier_id: Option<PartyId>,
    expected_on: Option<NaiveDate>,
    settings: CalculationSettings,
    lines: Vec<LineItem>,
    header: PurchaseOrderHeader,
    workflow: WorkflowInstance,
    version: u64,
    created: bool,
}

impl PurchaseOrder {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: DocumentId) -> Self {
        Self {
            id,
            number: String::new(),
            supplier_id: None,
            expected_on: None,
            settings: CalculationSettings::default(),
            lines: Vec::new(),
            header: PurchaseOrderHeader::default(),
            workflow: WorkflowInstance::new(WORKFLOW_NAME, StateId::from(states::DRAFT)),
            version: 0,
            created: false,
        }
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn supplier_id(&self) -> Option<PartyId> {
        self.supplier_id
    }

    pub fn expected_on(&self) -> Option<NaiveDate> {
        self.expected_on
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn header(&self) -> &PurchaseOrderHeader {
        &self.header
    }

    pub fn workflow(&self) -> &WorkflowInstance {
        &self.workflow
    }

    pub fn status(&self) -> &StateId {
        self.workflow.current()
    }

    pub fn history(&self) -> &[HistoryEntry] {
        self.workflow.history()
    }

    pub fn line_items(&self) -> DomainResult<LineItemsManager> {
        LineItemsManager::from_items(CalculationService::new(self.settings)?, self.lines.iter().cloned())
    }

    pub fn totals(&self) -> DomainResult<DocumentTotals> {
        CalculationService::new(self.settings)?.compute_document(&self.lines)
    }

    pub fn snapshot(&self) -> DomainResult<PurchaseOrderSnapshot> {
        Ok(PurchaseOrderSnapshot {
            line_count: self.lines.len(),
            grand_total: self.totals()?.grand_total,
            header: self.header.clone(),
        })
    }

    pub fn state(&self) -> DomainResult<StateDef> {
        Ok(workflow::engine()?.current_state(&self.workflow)?.clone())
    }

    pub fn available_events(&self, payload: &EventPayload) -> DomainResult<Vec<EventName>> {
        Ok(workflow::engine()?.available_events(&self.workflow, &self.snapshot()?, payload))
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = DocumentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreatePurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePurchaseOrder {
    pub order_id: DocumentId,
    pub number: String,
    pub supplier_id: Option<PartyId>,
    #[serde(default)]
    pub expected_on: Option<NaiveDate>,
    #[serde(default)]
    pub settings: CalculationSettings,
    #[serde(default)]
    pub lines: Vec<LineItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: EditLines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditLines {
    pub order_id: DocumentId,
    pub command: LineCommand,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FireEvent (`submit`, `approve`, `reject`, `receive`, `bill`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FireEvent {
    pub order_id: DocumentId,
    pub event: EventName,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderCommand {
    CreatePurchaseOrder(CreatePurchaseOrder),
    EditLines(EditLines),
    FireEvent(FireEvent),
}

/// Event: PurchaseOrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderCreated {
    pub order_id: DocumentId,
    pub number: String,
    pub supplier_id: Option<PartyId>,
    pub expected_on: Option<NaiveDate>,
    pub settings: CalculationSettings,
    pub lines: Vec<LineItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LinesEdited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinesEdited {
    pub order_id: DocumentId,
    pub command: LineCommand,
    pub lines: Vec<LineItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderTransitioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderTransitioned {
    pub order_id: DocumentId,
    pub entry: HistoryEntry,
    pub patch: Option<PurchaseOrderPatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderEvent {
    PurchaseOrderCreated(PurchaseOrderCreated),
    LinesEdited(LinesEdited),
    PurchaseOrderTransitioned(PurchaseOrderTransitioned),
}

impl Event for PurchaseOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(_) => "purchasing.purchase_order.created",
            PurchaseOrderEvent::LinesEdited(_) => "purchasing.purchase_order.lines_edited",
            PurchaseOrderEvent::PurchaseOrderTransitioned(_) => "purchasing.purchase_order.transitioned",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => e.occurred_at,
            PurchaseOrderEvent::LinesEdited(e) => e.occurred_at,
            PurchaseOrderEvent::PurchaseOrderTransitioned(e) => e.entry.at,
        }
    }
}

impl Aggregate for PurchaseOrder {
    type Command = PurchaseOrderCommand;
    type Event = PurchaseOrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => {
                self.id = e.order_id;
                self.number = e.number.clone();
                self.supplier_id = e.supplier_id;
                self.expected_on = e.expected_on;
                self.settings = e.settings;
                self.lines = e.lines.clone();
                self.header = PurchaseOrderHeader::default();
                self.workflow = WorkflowInstance::new(WORKFLOW_NAME, StateId::from(states::DRAFT));
                self.created = true;
            }
            PurchaseOrderEvent::LinesEdited(e) => {
                self.lines = e.lines.clone();
            }
            PurchaseOrderEvent::PurchaseOrderTransitioned(e) => {
                match self.workflow.replay(&e.entry) {
                    Ok(next) => self.workflow = next,
                    Err(err) => {
                        error!(order = %self.id, error = %err, "skipping out-of-order transition");
                        return;
                    }
                }
                if let Some(patch) = &e.patch {
                    self.header.apply(patch);
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseOrderCommand::CreatePurchaseOrder(cmd) => self.handle_create(cmd),
            PurchaseOrderCommand::EditLines(cmd) => self.handle_edit_lines(cmd),
            PurchaseOrderCommand::FireEvent(cmd) => self.handle_fire(cmd),
        }
    }
}

impl PurchaseOrder {
    fn ensure_created(&self) -> DomainResult<()> {
        if !self.created {
            return Err(DomainError::not_found(format!("purchase order {}", self.id)));
        }
        Ok(())
    }

    fn ensure_order_id(&self, order_id: DocumentId) -> DomainResult<()> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreatePurchaseOrder) -> DomainResult<Vec<PurchaseOrderEvent>> {
        if self.created {
            return Err(DomainError::conflict("purchase order already exists"));
        }
        self.ensure_order_id(cmd.order_id)?;
        if cmd.number.trim().is_empty() {
            return Err(DomainError::validation("purchase order number must not be empty"));
        }

        let lines = LineItemsManager::from_items(
            CalculationService::new(cmd.settings)?,
            cmd.lines.iter().cloned(),
        )?;

        Ok(vec![PurchaseOrderEvent::PurchaseOrderCreated(PurchaseOrderCreated {
            order_id: cmd.order_id,
            number: cmd.number.clone(),
            supplier_id: cmd.supplier_id,
            expected_on: cmd.expected_on,
            settings: cmd.settings,
            lines: lines.items().to_vec(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_edit_lines(&self, cmd: &EditLines) -> DomainResult<Vec<PurchaseOrderEvent>> {
        self.ensure_created()?;
        self.ensure_order_id(cmd.order_id)?;

        let state = self.state()?;
        if !state.is_editable {
            return Err(DomainError::invariant(format!(
                "purchase order {} cannot be edited in state '{}'",
                self.number, state.id
            )));
        }

        let mut lines = self.line_items()?;
        lines.execute(&cmd.command)?;

        Ok(vec![PurchaseOrderEvent::LinesEdited(LinesEdited {
            order_id: cmd.order_id,
            command: cmd.command.clone(),
            lines: lines.items().to_vec(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_fire(&self, cmd: &FireEvent) -> DomainResult<Vec<PurchaseOrderEvent>> {
        self.ensure_created()?;
        self.ensure_order_id(cmd.order_id)?;

        let out = workflow::engine()?.transition(
            &self.workflow,
            &self.snapshot()?,
            cmd.event.clone(),
            &cmd.payload,
        )?;
        debug!(
            order = %self.number,
            from = %out.entry.from,
            to = %out.entry.to,
            "purchase order transition accepted"
        );

        Ok(vec![PurchaseOrderEvent::PurchaseOrderTransitioned(PurchaseOrderTransitioned {
            order_id: cmd.order_id,
            entry: out.entry,
            patch: out.patch,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::events;
    use chrono::TimeZone;
    use docflow_core::{LineItemId, ProductId, UserId};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn test_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 2, 8, 0, 0).unwrap()
    }

    fn payload() -> EventPayload {
        EventPayload::new(UserId::new(), test_time())
    }

    fn line(qty: Decimal, price: Decimal) -> LineItem {
        LineItem::new(LineItemId::new(), qty, price).with_product(ProductId::new())
    }

    fn create_cmd(id: DocumentId, lines: Vec<LineItem>) -> PurchaseOrderCommand {
        PurchaseOrderCommand::CreatePurchaseOrder(CreatePurchaseOrder {
            order_id: id,
            number: "PO-2025-0001".to_string(),
            supplier_id: Some(PartyId::new()),
            expected_on: NaiveDate::from_ymd_opt(2025, 5, 20),
            settings: CalculationSettings::default(),
            lines,
            occurred_at: test_time(),
        })
    }

    fn created(lines: Vec<LineItem>) -> PurchaseOrder {
        let id = DocumentId::new();
        let mut order = PurchaseOrder::empty(id);
        order.execute(&create_cmd(id, lines)).unwrap();
        order
    }

    fn fire(order: &mut PurchaseOrder, event: &str, payload: EventPayload) -> DomainResult<Vec<PurchaseOrderEvent>> {
        let cmd = PurchaseOrderCommand::FireEvent(FireEvent {
            order_id: *order.id(),
            event: event.into(),
            payload,
        });
        order.execute(&cmd)
    }

    #[test]
    fn create_purchase_order_emits_purchase_order_created_event() {
        let id = DocumentId::new();
        let order = PurchaseOrder::empty(id);

        let emitted = order.handle(&create_cmd(id, vec![line(dec!(10), dec!(2500))])).unwrap();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].event_type(), "purchasing.purchase_order.created");
        match &emitted[0] {
            PurchaseOrderEvent::PurchaseOrderCreated(e) => {
                assert_eq!(e.order_id, id);
                assert_eq!(e.lines.len(), 1);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn creating_twice_is_a_conflict() {
        let order = created(Vec::new());
        let err = order.handle(&create_cmd(*order.id(), Vec::new())).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn approve_moves_status_to_approved() {
        let mut order = created(vec![line(dec!(10), dec!(2500))]);
        fire(&mut order, events::SUBMIT, payload()).unwrap();
        fire(&mut order, events::APPROVE, payload()).unwrap();

        assert_eq!(order.status().as_str(), states::APPROVED);
        assert!(order.header().approved_by.is_some());
        assert_eq!(order.version(), 3);
    }

    #[test]
    fn cannot_receive_before_approval() {
        let mut order = created(vec![line(dec!(10), dec!(2500))]);
        fire(&mut order, events::SUBMIT, payload()).unwrap();

        let err = fire(&mut order, events::RECEIVE, payload()).unwrap_err();
        assert_eq!(err, DomainError::invalid_transition(states::SUBMITTED, events::RECEIVE));
        assert_eq!(order.status().as_str(), states::SUBMITTED);
    }

    #[test]
    fn empty_order_cannot_be_submitted() {
        let mut order = created(Vec::new());
        let err = fire(&mut order, events::SUBMIT, payload()).unwrap_err();
        assert_eq!(err, DomainError::guard_rejected("purchase order has no lines"));
    }

    #[test]
    fn lines_are_editable_only_in_draft() {
        let mut order = created(Vec::new());
        let edit = |order: &PurchaseOrder| {
            PurchaseOrderCommand::EditLines(EditLines {
                order_id: *order.id(),
                command: LineCommand::Add {
                    item: line(dec!(4), dec!(1250)),
                },
                occurred_at: test_time(),
            })
        };

        let cmd = edit(&order);
        order.execute(&cmd).unwrap();
        assert_eq!(order.totals().unwrap().grand_total, dec!(5000));

        fire(&mut order, events::SUBMIT, payload()).unwrap();
        let err = order.handle(&edit(&order)).unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn receive_after_approval_then_bill() {
        let mut order = created(vec![line(dec!(10), dec!(2500))]);
        for event in [events::SUBMIT, events::APPROVE, events::RECEIVE] {
            fire(&mut order, event, payload()).unwrap();
        }
        assert!(order.header().received_at.is_some());
        assert_eq!(
            order.available_events(&payload()).unwrap(),
            vec![EventName::from(events::BILL)]
        );

        fire(&mut order, events::BILL, payload().with_reason("SUP-7781")).unwrap();
        assert_eq!(order.status().as_str(), states::BILLED);
        assert!(order.available_events(&payload()).unwrap().is_empty());
    }

    #[test]
    fn apply_is_deterministic() {
        let id = DocumentId::new();
        let emitted = PurchaseOrder::empty(id)
            .handle(&create_cmd(id, vec![line(dec!(1), dec!(10))]))
            .unwrap();

        let mut a = PurchaseOrder::empty(id);
        let mut b = PurchaseOrder::empty(id);
        for e in &emitted {
            a.apply(e);
            b.apply(e);
        }
        assert_eq!(a, b);
    }

    #[test]
    fn stored_events_rehydrate_the_same_order() {
        let id = DocumentId::new();
        let mut source = PurchaseOrder::empty(id);
        let mut stream = source.execute(&create_cmd(id, vec![line(dec!(3), dec!(410))])).unwrap();
        for event in [events::SUBMIT, events::APPROVE, events::RECEIVE] {
            stream.extend(fire(&mut source, event, payload()).unwrap());
        }

        let json = serde_json::to_string(&stream).unwrap();
        let stored: Vec<PurchaseOrderEvent> = serde_json::from_str(&json).unwrap();

        let mut replayed = PurchaseOrder::empty(id);
        for event in &stored {
            replayed.apply(event);
        }
        assert_eq!(replayed, source);
        assert_eq!(replayed.status().as_str(), states::RECEIVED);
    }

    #[test]
    fn out_of_order_transition_is_not_applied() {
        let mut order = created(vec![line(dec!(1), dec!(10))]);
        let before = order.clone();

        order.apply(&PurchaseOrderEvent::PurchaseOrderTransitioned(PurchaseOrderTransitioned {
            order_id: *order.id(),
            entry: HistoryEntry {
                from: states::APPROVED.into(),
                to: states::RECEIVED.into(),
                event: events::RECEIVE.into(),
                at: test_time(),
                actor: UserId::new(),
                reason: None,
            },
            patch: None,
        }));

        assert_eq!(order, before);
        assert_eq!(order.status().as_str(), states::DRAFT);
    }
}
