//! Generic guarded state machine.
//!
//! The engine knows nothing about documents. It reads a
//! [`WorkflowDefinition`], evaluates guards against a snapshot and payload,
//! and returns new values. Inputs are never mutated.

use docflow_core::{DomainError, DomainResult};

use crate::definition::{EventName, Snapshot, StateDef, Transition, WorkflowDefinition};
use crate::instance::{EventPayload, HistoryEntry, WorkflowInstance};

/// Result of a successful transition.
#[derive(Debug, Clone)]
pub struct Transitioned<S: Snapshot> {
    pub instance: WorkflowInstance,
    pub snapshot: S,
    /// Patch produced by the side effect, already applied to `snapshot`.
    pub patch: Option<S::Patch>,
    pub entry: HistoryEntry,
}

#[derive(Debug, Clone)]
pub struct WorkflowEngine<S: Snapshot> {
    definition: WorkflowDefinition<S>,
}

impl<S: Snapshot> WorkflowEngine<S> {
    pub fn new(definition: WorkflowDefinition<S>) -> Self {
        Self { definition }
    }

    pub fn definition(&self) -> &WorkflowDefinition<S> {
        &self.definition
    }

    /// A fresh instance in the initial state with empty history.
    pub fn start(&self) -> WorkflowInstance {
        WorkflowInstance::new(self.definition.name(), self.definition.initial().clone())
    }

    /// Metadata of the instance's current state.
    pub fn current_state(&self, instance: &WorkflowInstance) -> DomainResult<&StateDef> {
        if instance.workflow() != self.definition.name() {
            return Err(DomainError::validation(format!(
                "instance belongs to workflow '{}', not '{}'",
                instance.workflow(),
                self.definition.name()
            )));
        }
        self.definition.state(instance.current()).ok_or_else(|| {
            DomainError::invariant(format!(
                "state '{}' is not part of workflow '{}'",
                instance.current(),
                self.definition.name()
            ))
        })
    }

    pub fn transition(
        &self,
        instance: &WorkflowInstance,
        snapshot: &S,
        event: impl Into<EventName>,
        payload: &EventPayload,
    ) -> DomainResult<Transitioned<S>> {
        let event = event.into();
        let chosen = self.select(instance, snapshot, &event, payload)?;

        let patch = chosen.effect.map(|effect| effect(snapshot, payload));
        let mut next_snapshot = snapshot.clone();
        if let Some(patch) = &patch {
            next_snapshot.apply_patch(patch);
        }

        let entry = HistoryEntry {
            from: chosen.from.clone(),
            to: chosen.to.clone(),
            event,
            at: payload.occurred_at,
            actor: payload.actor,
            reason: payload.reason().map(str::to_string),
        };

        tracing::info!(
            workflow = self.definition.name(),
            from = %entry.from,
            to = %entry.to,
            event = %entry.event,
            actor = %entry.actor,
            "workflow transition"
        );

        Ok(Transitioned {
            instance: instance.advanced(entry.clone()),
            snapshot: next_snapshot,
            patch,
            entry,
        })
    }

    /// Check whether `event` would succeed, without producing anything.
    pub fn can_fire(
        &self,
        instance: &WorkflowInstance,
        snapshot: &S,
        event: impl Into<EventName>,
        payload: &EventPayload,
    ) -> DomainResult<()> {
        self.select(instance, snapshot, &event.into(), payload).map(|_| ())
    }

    /// Events that would currently succeed, in declaration order, without duplicates.
    pub fn available_events(
        &self,
        instance: &WorkflowInstance,
        snapshot: &S,
        payload: &EventPayload,
    ) -> Vec<EventName> {
        let mut events: Vec<EventName> = Vec::new();
        for transition in self.definition.outgoing(instance.current()) {
            if events.contains(&transition.event) {
                continue;
            }
            if self.select(instance, snapshot, &transition.event, payload).is_ok() {
                events.push(transition.event.clone());
            }
        }
        events
    }

    fn select(
        &self,
        instance: &WorkflowInstance,
        snapshot: &S,
        event: &EventName,
        payload: &EventPayload,
    ) -> DomainResult<&Transition<S>> {
        let state = self.current_state(instance)?;
        let invalid = || DomainError::invalid_transition(state.id.as_str(), event.as_str());

        if state.is_terminal {
            return Err(invalid());
        }

        let mut reasons: Vec<String> = Vec::new();
        let mut matched = false;
        for candidate in self.definition.candidates(&state.id, event) {
            matched = true;
            match candidate.check(snapshot, payload) {
                Ok(()) => return Ok(candidate),
                Err(reason) => {
                    if !reasons.contains(&reason) {
                        reasons.push(reason);
                    }
                }
            }
        }

        if !matched {
            return Err(invalid());
        }

        let reason = reasons.join("; ");
        tracing::warn!(
            workflow = self.definition.name(),
            state = %state.id,
            event = %event,
            reason = %reason,
            "transition rejected by guard"
        );
        Err(DomainError::guard_rejected(reason))
    }
}
