//! Invoice aggregate: lines, payments and workflow status.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use docflow_calculation::{
    CalculationService, CalculationSettings, DocumentTotals, LineCommand, LineItem,
    LineItemsManager,
};
use docflow_core::{Aggregate, AggregateRoot, DocumentId, DomainError, DomainResult, Event, PartyId};
use docflow_workflow::{EventName, EventPayload, HistoryEntry, StateDef, StateId, WorkflowInstance};

use crate::workflow::{self, InvoiceHeader, InvoicePatch, InvoiceSnapshot, WORKFLOW_NAME, states};

/// Aggregate root: Invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    id: DocumentId,
    number: String,
    customer_id: Option<PartyId>,
    quotation_id: Option<DocumentId>,
    issued_on: NaiveDate,
    due_date: NaiveDate,
    settings: CalculationSettings,
    lines: Vec<LineItem>,
    header: InvoiceHeader,
    workflow: WorkflowInstance,
    version: u64,
    created: bool,
}

impl Invoice {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: DocumentId) -> Self {
        Self {
            id,
            number: String::new(),
            customer_id: None,
            quotation_id: None,
            issued_on: NaiveDate::MIN,
            due_date: NaiveDate::MIN,
            settings: CalculationSettings::default(),
            lines: Vec::new(),
            header: InvoiceHeader::default(),
            workflow: WorkflowInstance::new(WORKFLOW_NAME, StateId::from(states::DRAFT)),
            version: 0,
            created: false,
        }
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn customer_id(&self) -> Option<PartyId> {
        self.customer_id
    }

    /// Quotation this invoice was raised from, if any.
    pub fn quotation_id(&self) -> Option<DocumentId> {
        self.quotation_id
    }

    pub fn issued_on(&self) -> NaiveDate {
        self.issued_on
    }

    pub fn due_date(&self) -> NaiveDate {
        self.due_date
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn header(&self) -> &InvoiceHeader {
        &self.header
    }

    pub fn amount_paid(&self) -> Decimal {
        self.header.amount_paid
    }

    pub fn outstanding(&self) -> DomainResult<Decimal> {
        Ok(self.snapshot()?.outstanding())
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

    pub fn snapshot(&self) -> DomainResult<InvoiceSnapshot> {
        Ok(InvoiceSnapshot {
            line_count: self.lines.len(),
            grand_total: self.totals()?.grand_total,
            due_date: self.due_date,
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

impl AggregateRoot for Invoice {
    type Id = DocumentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInvoice {
    pub invoice_id: DocumentId,
    pub number: String,
    pub customer_id: Option<PartyId>,
    #[serde(default)]
    pub quotation_id: Option<DocumentId>,
    pub issued_on: NaiveDate,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub settings: CalculationSettings,
    #[serde(default)]
    pub lines: Vec<LineItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: EditLines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditLines {
    pub invoice_id: DocumentId,
    pub command: LineCommand,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FireEvent (`send`, `record_payment`, `overdue`, `void`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FireEvent {
    pub invoice_id: DocumentId,
    pub event: EventName,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    CreateInvoice(CreateInvoice),
    EditLines(EditLines),
    FireEvent(FireEvent),
}

/// Event: InvoiceCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCreated {
    pub invoice_id: DocumentId,
    pub number: String,
    pub customer_id: Option<PartyId>,
    pub quotation_id: Option<DocumentId>,
    pub issued_on: NaiveDate,
    pub due_date: NaiveDate,
    pub settings: CalculationSettings,
    pub lines: Vec<LineItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LinesEdited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinesEdited {
    pub invoice_id: DocumentId,
    pub command: LineCommand,
    pub lines: Vec<LineItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceTransitioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTransitioned {
    pub invoice_id: DocumentId,
    pub entry: HistoryEntry,
    pub patch: Option<InvoicePatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceCreated(InvoiceCreated),
    LinesEdited(LinesEdited),
    InvoiceTransitioned(InvoiceTransitioned),
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceCreated(_) => "invoicing.invoice.created",
            InvoiceEvent::LinesEdited(_) => "invoicing.invoice.lines_edited",
            InvoiceEvent::InvoiceTransitioned(_) => "invoicing.invoice.transitioned",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceCreated(e) => e.occurred_at,
            InvoiceEvent::LinesEdited(e) => e.occurred_at,
            InvoiceEvent::InvoiceTransitioned(e) => e.entry.at,
        }
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::InvoiceCreated(e) => {
                self.id = e.invoice_id;
                self.number = e.number.clone();
                self.customer_id = e.customer_id;
                self.quotation_id = e.quotation_id;
                self.issued_on = e.issued_on;
                self.due_date = e.due_date;
                self.settings = e.settings;
                self.lines = e.lines.clone();
                self.header = InvoiceHeader::default();
                self.workflow = WorkflowInstance::new(WORKFLOW_NAME, StateId::from(states::DRAFT));
                self.created = true;
            }
            InvoiceEvent::LinesEdited(e) => {
                self.lines = e.lines.clone();
            }
            InvoiceEvent::InvoiceTransitioned(e) => {
                match self.workflow.replay(&e.entry) {
                    Ok(next) => self.workflow = next,
                    Err(err) => {
                        error!(invoice = %self.id, error = %err, "skipping out-of-order transition");
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
            InvoiceCommand::CreateInvoice(cmd) => self.handle_create(cmd),
            InvoiceCommand::EditLines(cmd) => self.handle_edit_lines(cmd),
            InvoiceCommand::FireEvent(cmd) => self.handle_fire(cmd),
        }
    }
}

impl Invoice {
    fn ensure_created(&self) -> DomainResult<()> {
        if !self.created {
            return Err(DomainError::not_found(format!("invoice {}", self.id)));
        }
        Ok(())
    }

    fn ensure_invoice_id(&self, invoice_id: DocumentId) -> DomainResult<()> {
        if self.id != invoice_id {
            return Err(DomainError::invariant("invoice_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateInvoice) -> DomainResult<Vec<InvoiceEvent>> {
        if self.created {
            return Err(DomainError::conflict("invoice already exists"));
        }
        self.ensure_invoice_id(cmd.invoice_id)?;
        if cmd.number.trim().is_empty() {
            return Err(DomainError::validation("invoice number must not be empty"));
        }
        if cmd.due_date < cmd.issued_on {
            return Err(DomainError::validation(format!(
                "due date {} is before issue date {}",
                cmd.due_date, cmd.issued_on
            )));
        }

        let lines = LineItemsManager::from_items(
            CalculationService::new(cmd.settings)?,
            cmd.lines.iter().cloned(),
        )?;

        Ok(vec![InvoiceEvent::InvoiceCreated(InvoiceCreated {
            invoice_id: cmd.invoice_id,
            number: cmd.number.clone(),
            customer_id: cmd.customer_id,
            quotation_id: cmd.quotation_id,
            issued_on: cmd.issued_on,
            due_date: cmd.due_date,
            settings: cmd.settings,
            lines: lines.items().to_vec(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_edit_lines(&self, cmd: &EditLines) -> DomainResult<Vec<InvoiceEvent>> {
        self.ensure_created()?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        let state = self.state()?;
        if !state.is_editable {
            return Err(DomainError::invariant(format!(
                "invoice {} cannot be edited in state '{}'",
                self.number, state.id
            )));
        }

        let mut lines = self.line_items()?;
        lines.execute(&cmd.command)?;

        Ok(vec![InvoiceEvent::LinesEdited(LinesEdited {
            invoice_id: cmd.invoice_id,
            command: cmd.command.clone(),
            lines: lines.items().to_vec(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_fire(&self, cmd: &FireEvent) -> DomainResult<Vec<InvoiceEvent>> {
        self.ensure_created()?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        let out = workflow::engine()?.transition(
            &self.workflow,
            &self.snapshot()?,
            cmd.event.clone(),
            &cmd.payload,
        )?;
        debug!(
            invoice = %self.number,
            from = %out.entry.from,
            to = %out.entry.to,
            amount_paid = %out.snapshot.header.amount_paid,
            "invoice transition accepted"
        );

        Ok(vec![InvoiceEvent::InvoiceTransitioned(InvoiceTransitioned {
            invoice_id: cmd.invoice_id,
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
    use docflow_calculation::{RoundingMode, TaxConfig};
    use docflow_core::{LineItemId, UserId};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32) -> EventPayload {
        EventPayload::new(UserId::new(), Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap())
    }

    fn line(qty: Decimal, price: Decimal) -> LineItem {
        LineItem::new(LineItemId::new(), qty, price)
    }

    fn created(lines: Vec<LineItem>) -> Invoice {
        let id = DocumentId::new();
        let mut invoice = Invoice::empty(id);
        invoice
            .execute(&InvoiceCommand::CreateInvoice(CreateInvoice {
                invoice_id: id,
                number: "INV-2025-01-0043".to_string(),
                customer_id: Some(PartyId::new()),
                quotation_id: None,
                issued_on: date(2025, 1, 31),
                due_date: date(2025, 2, 28),
                settings: CalculationSettings::new(RoundingMode::Indonesian),
                lines,
                occurred_at: at(2025, 1, 31).occurred_at,
            }))
            .unwrap();
        invoice
    }

    fn fire(invoice: &mut Invoice, event: &str, payload: EventPayload) -> DomainResult<Vec<InvoiceEvent>> {
        let cmd = InvoiceCommand::FireEvent(FireEvent {
            invoice_id: *invoice.id(),
            event: event.into(),
            payload,
        });
        invoice.execute(&cmd)
    }

    #[test]
    fn due_date_before_issue_date_is_invalid() {
        let id = DocumentId::new();
        let err = Invoice::empty(id)
            .handle(&InvoiceCommand::CreateInvoice(CreateInvoice {
                invoice_id: id,
                number: "INV-1".to_string(),
                customer_id: None,
                quotation_id: None,
                issued_on: date(2025, 2, 1),
                due_date: date(2025, 1, 1),
                settings: CalculationSettings::default(),
                lines: Vec::new(),
                occurred_at: at(2025, 2, 1).occurred_at,
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn invalid_initial_line_is_rejected() {
        let id = DocumentId::new();
        let err = Invoice::empty(id)
            .handle(&InvoiceCommand::CreateInvoice(CreateInvoice {
                invoice_id: id,
                number: "INV-1".to_string(),
                customer_id: None,
                quotation_id: None,
                issued_on: date(2025, 2, 1),
                due_date: date(2025, 2, 1),
                settings: CalculationSettings::default(),
                lines: vec![line(dec!(0), dec!(10))],
                occurred_at: at(2025, 2, 1).occurred_at,
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn full_lifecycle_draft_sent_partial_paid() {
        let mut invoice = created(vec![
            line(dec!(3), dec!(100000)).with_tax(TaxConfig::exclusive(dec!(11)).unwrap()),
        ]);
        assert_eq!(invoice.outstanding().unwrap(), dec!(333000));

        fire(&mut invoice, events::SEND, at(2025, 2, 1)).unwrap();
        assert_eq!(invoice.status().as_str(), states::SENT);
        assert!(invoice.header().sent_at.is_some());

        fire(&mut invoice, events::RECORD_PAYMENT, at(2025, 2, 5).with_amount(dec!(100000))).unwrap();
        fire(&mut invoice, events::RECORD_PAYMENT, at(2025, 2, 6).with_amount(dec!(33000))).unwrap();
        assert_eq!(invoice.status().as_str(), states::PARTIAL);
        assert_eq!(invoice.amount_paid(), dec!(133000));
        assert_eq!(invoice.outstanding().unwrap(), dec!(200000));

        fire(&mut invoice, events::RECORD_PAYMENT, at(2025, 2, 7).with_amount(dec!(200000))).unwrap();
        assert_eq!(invoice.status().as_str(), states::PAID);
        assert_eq!(invoice.outstanding().unwrap(), Decimal::ZERO);
        assert_eq!(invoice.history().len(), 4);
        assert_eq!(invoice.version(), 5);
    }

    #[test]
    fn overdue_invoice_can_still_be_paid() {
        let mut invoice = created(vec![line(dec!(1), dec!(5000))]);
        fire(&mut invoice, events::SEND, at(2025, 2, 1)).unwrap();

        let err = fire(&mut invoice, events::OVERDUE, at(2025, 2, 15)).unwrap_err();
        assert!(matches!(err, DomainError::GuardRejected(_)));

        fire(&mut invoice, events::OVERDUE, at(2025, 3, 3)).unwrap();
        assert_eq!(invoice.status().as_str(), states::OVERDUE);

        fire(&mut invoice, events::RECORD_PAYMENT, at(2025, 3, 4).with_amount(dec!(5000))).unwrap();
        assert_eq!(invoice.status().as_str(), states::PAID);
    }

    #[test]
    fn lines_are_frozen_once_sent() {
        let mut invoice = created(vec![line(dec!(1), dec!(5000))]);
        fire(&mut invoice, events::SEND, at(2025, 2, 1)).unwrap();

        let err = invoice
            .handle(&InvoiceCommand::EditLines(EditLines {
                invoice_id: *invoice.id(),
                command: LineCommand::Add {
                    item: line(dec!(1), dec!(1)),
                },
                occurred_at: at(2025, 2, 2).occurred_at,
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn void_from_partial_and_nothing_after() {
        let mut invoice = created(vec![line(dec!(1), dec!(5000))]);
        fire(&mut invoice, events::SEND, at(2025, 2, 1)).unwrap();
        fire(&mut invoice, events::RECORD_PAYMENT, at(2025, 2, 2).with_amount(dec!(1000))).unwrap();

        fire(&mut invoice, events::VOID, at(2025, 2, 3).with_reason("customer dispute")).unwrap();
        assert_eq!(invoice.status().as_str(), states::VOID);
        assert_eq!(invoice.header().void_reason.as_deref(), Some("customer dispute"));

        let err = fire(&mut invoice, events::RECORD_PAYMENT, at(2025, 2, 4).with_amount(dec!(1))).unwrap_err();
        assert_eq!(err, DomainError::invalid_transition(states::VOID, events::RECORD_PAYMENT));
    }

    #[test]
    fn available_events_for_a_sent_invoice() {
        let mut invoice = created(vec![line(dec!(1), dec!(5000))]);
        fire(&mut invoice, events::SEND, at(2025, 2, 1)).unwrap();

        let available = invoice.available_events(&at(2025, 2, 10).with_amount(dec!(10))).unwrap();
        assert_eq!(
            available,
            vec![EventName::from(events::RECORD_PAYMENT), EventName::from(events::VOID)]
        );

        let available = invoice.available_events(&at(2025, 3, 10)).unwrap();
        assert_eq!(
            available,
            vec![EventName::from(events::OVERDUE), EventName::from(events::VOID)]
        );
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let invoice = created(vec![line(dec!(1), dec!(5000))]);
        let before = invoice.clone();
        let cmd = InvoiceCommand::FireEvent(FireEvent {
            invoice_id: *invoice.id(),
            event: events::SEND.into(),
            payload: at(2025, 2, 1),
        });

        let events1 = invoice.handle(&cmd).unwrap();
        let events2 = invoice.handle(&cmd).unwrap();
        assert_eq!(invoice, before);
        assert_eq!(events1, events2);
    }

    #[test]
    fn stored_events_rehydrate_the_same_invoice() {
        let id = DocumentId::new();
        let mut source = Invoice::empty(id);
        let mut stream = source
            .execute(&InvoiceCommand::CreateInvoice(CreateInvoice {
                invoice_id: id,
                number: "INV-2025-02-0001".to_string(),
                customer_id: Some(PartyId::new()),
                quotation_id: Some(DocumentId::new()),
                issued_on: date(2025, 2, 1),
                due_date: date(2025, 2, 15),
                settings: CalculationSettings::new(RoundingMode::Indonesian),
                lines: vec![line(dec!(2), dec!(7500))],
                occurred_at: at(2025, 2, 1).occurred_at,
            }))
            .unwrap();
        stream.extend(fire(&mut source, events::SEND, at(2025, 2, 1)).unwrap());
        stream.extend(
            fire(&mut source, events::RECORD_PAYMENT, at(2025, 2, 3).with_amount(dec!(2500.50))).unwrap(),
        );

        let json = serde_json::to_string(&stream).unwrap();
        let stored: Vec<InvoiceEvent> = serde_json::from_str(&json).unwrap();

        let mut replayed = Invoice::empty(id);
        for event in &stored {
            replayed.apply(event);
        }
        assert_eq!(replayed, source);
        assert_eq!(replayed.outstanding().unwrap(), dec!(12499.50));
    }
}
