//! Quotation aggregate: lines, workflow status and revisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docflow_calculation::{
    CalculationService, CalculationSettings, DocumentTotals, LineCommand, LineItem,
    LineItemsManager,
};
use docflow_core::{Aggregate, AggregateRoot, DocumentId, DomainError, DomainResult, Event, PartyId};
use docflow_workflow::{EventName, EventPayload, HistoryEntry, StateDef, StateId, WorkflowInstance};

use crate::workflow::{self, QuotationHeader, QuotationPatch, QuotationSnapshot, WORKFLOW_NAME, events, states};

/// Aggregate root: Quotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quotation {
    id: DocumentId,
    number: String,
    customer_id: Option<PartyId>,
    revision: u32,
    revision_of: Option<DocumentId>,
    settings: CalculationSettings,
    lines: Vec<LineItem>,
    header: QuotationHeader,
    workflow: WorkflowInstance,
    version: u64,
    created: bool,
}

impl Quotation {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: DocumentId) -> Self {
        Self {
            id,
            number: String::new(),
            customer_id: None,
            revision: 0,
            revision_of: None,
            settings: CalculationSettings::default(),
            lines: Vec::new(),
            header: QuotationHeader::default(),
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

    /// 0 for the original, +1 per revision.
    pub fn revision(&self) -> u32 {
        self.revision
    }

    /// The quotation this one revises.
    pub fn revision_of(&self) -> Option<DocumentId> {
        self.revision_of
    }

    pub fn settings(&self) -> &CalculationSettings {
        &self.settings
    }

    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn header(&self) -> &QuotationHeader {
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

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// The lines as a manager, for computing or previewing edits.
    pub fn line_items(&self) -> DomainResult<LineItemsManager> {
        LineItemsManager::from_items(CalculationService::new(self.settings)?, self.lines.iter().cloned())
    }

    pub fn totals(&self) -> DomainResult<DocumentTotals> {
        CalculationService::new(self.settings)?.compute_document(&self.lines)
    }

    pub fn snapshot(&self) -> DomainResult<QuotationSnapshot> {
        Ok(QuotationSnapshot {
            line_count: self.lines.len(),
            grand_total: self.totals()?.grand_total,
            header: self.header.clone(),
        })
    }

    pub fn state(&self) -> DomainResult<StateDef> {
        Ok(workflow::engine()?.current_state(&self.workflow)?.clone())
    }

    pub fn is_editable(&self) -> DomainResult<bool> {
        Ok(self.state()?.is_editable)
    }

    /// Events the user could fire right now with `payload`.
    pub fn available_events(&self, payload: &EventPayload) -> DomainResult<Vec<EventName>> {
        Ok(workflow::engine()?.available_events(&self.workflow, &self.snapshot()?, payload))
    }

    /// Start a new revision of an approved quotation.
    ///
    /// The new quotation gets `new_id`, the next revision number, a copy of the
    /// lines, and a number suffixed `-R{revision}`. `self` is left untouched;
    /// the returned events create the new revision.
    pub fn revise(
        &self,
        new_id: DocumentId,
        payload: &EventPayload,
    ) -> DomainResult<(Quotation, Vec<QuotationEvent>)> {
        self.ensure_created()?;
        workflow::engine()?.can_fire(&self.workflow, &self.snapshot()?, events::REVISE, payload)?;
        if new_id == self.id {
            return Err(DomainError::conflict("a revision needs a new quotation id"));
        }

        let revision = self
            .revision
            .checked_add(1)
            .ok_or_else(|| DomainError::invariant("revision counter exhausted"))?;

        let created = QuotationEvent::QuotationCreated(QuotationCreated {
            quotation_id: new_id,
            number: format!("{}-R{revision}", self.base_number()),
            customer_id: self.customer_id,
            settings: self.settings,
            revision,
            revision_of: Some(self.id),
            lines: self.lines.clone(),
            occurred_at: payload.occurred_at,
        });

        let mut next = Quotation::empty(new_id);
        next.apply(&created);

        tracing::info!(
            quotation_id = %self.id,
            revision_id = %new_id,
            revision,
            number = %next.number,
            "quotation revised"
        );
        Ok((next, vec![created]))
    }

    fn base_number(&self) -> &str {
        match self.number.rsplit_once("-R") {
            Some((base, suffix)) if self.revision > 0 && suffix.parse::<u32>().is_ok() => base,
            _ => &self.number,
        }
    }
}

impl AggregateRoot for Quotation {
    type Id = DocumentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateQuotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateQuotation {
    pub quotation_id: DocumentId,
    /// Issued by the numbering service.
    pub number: String,
    pub customer_id: Option<PartyId>,
    #[serde(default)]
    pub settings: CalculationSettings,
    #[serde(default)]
    pub lines: Vec<LineItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: EditLines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditLines {
    pub quotation_id: DocumentId,
    pub command: LineCommand,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FireEvent (workflow event such as `submit` or `approve`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FireEvent {
    pub quotation_id: DocumentId,
    pub event: EventName,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuotationCommand {
    CreateQuotation(CreateQuotation),
    EditLines(EditLines),
    FireEvent(FireEvent),
}

/// Event: QuotationCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationCreated {
    pub quotation_id: DocumentId,
    pub number: String,
    pub customer_id: Option<PartyId>,
    pub settings: CalculationSettings,
    pub revision: u32,
    pub revision_of: Option<DocumentId>,
    pub lines: Vec<LineItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LinesEdited. Carries the resulting lines so replay needs no validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinesEdited {
    pub quotation_id: DocumentId,
    pub command: LineCommand,
    pub lines: Vec<LineItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: QuotationTransitioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationTransitioned {
    pub quotation_id: DocumentId,
    pub entry: HistoryEntry,
    pub patch: Option<QuotationPatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuotationEvent {
    QuotationCreated(QuotationCreated),
    LinesEdited(LinesEdited),
    QuotationTransitioned(QuotationTransitioned),
}

impl Event for QuotationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            QuotationEvent::QuotationCreated(_) => "quotations.quotation.created",
            QuotationEvent::LinesEdited(_) => "quotations.quotation.lines_edited",
            QuotationEvent::QuotationTransitioned(_) => "quotations.quotation.transitioned",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            QuotationEvent::QuotationCreated(e) => e.occurred_at,
            QuotationEvent::LinesEdited(e) => e.occurred_at,
            QuotationEvent::QuotationTransitioned(e) => e.entry.at,
        }
    }
}

impl Aggregate for Quotation {
    type Command = QuotationCommand;
    type Event = QuotationEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            QuotationEvent::QuotationCreated(e) => {
                self.id = e.quotation_id;
                self.number = e.number.clone();
                self.customer_id = e.customer_id;
                self.revision = e.revision;
                self.revision_of = e.revision_of;
                self.settings = e.settings;
                self.lines = e.lines.clone();
                self.header = QuotationHeader::default();
                self.workflow = WorkflowInstance::new(WORKFLOW_NAME, StateId::from(states::DRAFT));
                self.created = true;
            }
            QuotationEvent::LinesEdited(e) => {
                self.lines = e.lines.clone();
            }
            QuotationEvent::QuotationTransitioned(e) => {
                match self.workflow.replay(&e.entry) {
                    Ok(next) => self.workflow = next,
                    Err(err) => {
                        tracing::error!(quotation = %self.id, error = %err, "skipping out-of-order transition");
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
            QuotationCommand::CreateQuotation(cmd) => self.handle_create(cmd),
            QuotationCommand::EditLines(cmd) => self.handle_edit_lines(cmd),
            QuotationCommand::FireEvent(cmd) => self.handle_fire(cmd),
        }
    }
}

impl Quotation {
    fn ensure_created(&self) -> DomainResult<()> {
        if !self.created {
            return Err(DomainError::not_found(format!("quotation {}", self.id)));
        }
        Ok(())
    }

    fn ensure_quotation_id(&self, quotation_id: DocumentId) -> DomainResult<()> {
        if self.id != quotation_id {
            return Err(DomainError::invariant("quotation_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateQuotation) -> DomainResult<Vec<QuotationEvent>> {
        if self.created {
            return Err(DomainError::conflict("quotation already exists"));
        }
        self.ensure_quotation_id(cmd.quotation_id)?;
        if cmd.number.trim().is_empty() {
            return Err(DomainError::validation("quotation number must not be empty"));
        }

        let lines = LineItemsManager::from_items(
            CalculationService::new(cmd.settings)?,
            cmd.lines.iter().cloned(),
        )?;

        Ok(vec![QuotationEvent::QuotationCreated(QuotationCreated {
            quotation_id: cmd.quotation_id,
            number: cmd.number.clone(),
            customer_id: cmd.customer_id,
            settings: cmd.settings,
            revision: 0,
            revision_of: None,
            lines: lines.items().to_vec(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_edit_lines(&self, cmd: &EditLines) -> DomainResult<Vec<QuotationEvent>> {
        self.ensure_created()?;
        self.ensure_quotation_id(cmd.quotation_id)?;

        let state = self.state()?;
        if !state.is_editable {
            return Err(DomainError::invariant(format!(
                "quotation {} cannot be edited in state '{}'",
                self.number, state.id
            )));
        }

        let mut lines = self.line_items()?;
        lines.execute(&cmd.command)?;

        Ok(vec![QuotationEvent::LinesEdited(LinesEdited {
            quotation_id: cmd.quotation_id,
            command: cmd.command.clone(),
            lines: lines.items().to_vec(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_fire(&self, cmd: &FireEvent) -> DomainResult<Vec<QuotationEvent>> {
        self.ensure_created()?;
        self.ensure_quotation_id(cmd.quotation_id)?;

        if cmd.event == events::REVISE {
            return Err(DomainError::invariant(
                "revising creates a new quotation; use Quotation::revise",
            ));
        }

        let out = workflow::engine()?.transition(
            &self.workflow,
            &self.snapshot()?,
            cmd.event.clone(),
            &cmd.payload,
        )?;

        Ok(vec![QuotationEvent::QuotationTransitioned(QuotationTransitioned {
            quotation_id: cmd.quotation_id,
            entry: out.entry,
            patch: out.patch,
        })])
    }
}
