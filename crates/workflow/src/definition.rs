//! Workflow definitions: states and transitions as data.

use serde::{Deserialize, Serialize};

use docflow_core::{DomainError, DomainResult};

use crate::instance::EventPayload;

macro_rules! impl_name_newtype {
    ($t:ident) => {
        impl $t {
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $t {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $t {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl PartialEq<str> for $t {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $t {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }
    };
}

/// Opaque state tag, e.g. `"draft"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(String);

/// Triggering event name, e.g. `"submit"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventName(String);

impl_name_newtype!(StateId);
impl_name_newtype!(EventName);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDef {
    pub id: StateId,
    pub label: String,
    pub is_terminal: bool,
    /// Whether document lines may be edited while in this state.
    pub is_editable: bool,
}

impl StateDef {
    pub fn new(id: impl Into<StateId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            is_terminal: false,
            is_editable: false,
        }
    }

    pub fn terminal(mut self) -> Self {
        self.is_terminal = true;
        self
    }

    pub fn editable(mut self) -> Self {
        self.is_editable = true;
        self
    }
}

/// Document data a workflow's guards and side effects look at.
///
/// Side effects never mutate the snapshot directly; they return a patch that
/// the engine applies to a copy.
pub trait Snapshot: Clone + core::fmt::Debug {
    type Patch: Clone + core::fmt::Debug + PartialEq;

    fn apply_patch(&mut self, patch: &Self::Patch);
}

/// Accepts the transition or rejects it with a message for the user.
pub type Guard<S> = fn(&S, &EventPayload) -> Result<(), String>;

/// Computes the data change that accompanies a transition.
pub type Effect<S> = fn(&S, &EventPayload) -> <S as Snapshot>::Patch;

#[derive(Clone)]
pub struct Transition<S: Snapshot> {
    pub from: StateId,
    pub event: EventName,
    pub to: StateId,
    pub guard: Option<Guard<S>>,
    pub effect: Option<Effect<S>>,
}

/// Placeholder `from` of a transition added to every non-terminal state.
pub const ANY_STATE: &str = "*";

impl<S: Snapshot> Transition<S> {
    /// Template for [`WorkflowBuilder::from_any_non_terminal`].
    pub fn from_any(event: impl Into<EventName>, to: impl Into<StateId>) -> Self {
        Self::new(ANY_STATE, event, to)
    }

    pub fn new(from: impl Into<StateId>, event: impl Into<EventName>, to: impl Into<StateId>) -> Self {
        Self {
            from: from.into(),
            event: event.into(),
            to: to.into(),
            guard: None,
            effect: None,
        }
    }

    pub fn guarded(mut self, guard: Guard<S>) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn with_effect(mut self, effect: Effect<S>) -> Self {
        self.effect = Some(effect);
        self
    }

    /// Run the guard; a transition without one always passes.
    pub fn check(&self, snapshot: &S, payload: &EventPayload) -> Result<(), String> {
        match self.guard {
            Some(guard) => guard(snapshot, payload),
            None => Ok(()),
        }
    }
}

impl<S: Snapshot> core::fmt::Debug for Transition<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Transition")
            .field("from", &self.from)
            .field("event", &self.event)
            .field("to", &self.to)
            .field("guarded", &self.guard.is_some())
            .field("has_effect", &self.effect.is_some())
            .finish()
    }
}

/// A validated state machine. Only [`WorkflowBuilder::build`] produces one.
#[derive(Debug, Clone)]
pub struct WorkflowDefinition<S: Snapshot> {
    name: String,
    initial: StateId,
    states: Vec<StateDef>,
    transitions: Vec<Transition<S>>,
}

impl<S: Snapshot> WorkflowDefinition<S> {
    pub fn builder(name: impl Into<String>, initial: impl Into<StateId>) -> WorkflowBuilder<S> {
        WorkflowBuilder {
            name: name.into(),
            initial: initial.into(),
            states: Vec::new(),
            transitions: Vec::new(),
            from_any: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initial(&self) -> &StateId {
        &self.initial
    }

    pub fn states(&self) -> &[StateDef] {
        &self.states
    }

    pub fn transitions(&self) -> &[Transition<S>] {
        &self.transitions
    }

    pub fn state(&self, id: &StateId) -> Option<&StateDef> {
        self.states.iter().find(|state| &state.id == id)
    }

    /// Transitions leaving `from`, in declaration order.
    pub fn outgoing<'a>(&'a self, from: &StateId) -> impl Iterator<Item = &'a Transition<S>> + use<'a, S> {
        let from = from.clone();
        self.transitions.iter().filter(move |t| t.from == from)
    }

    /// Transitions matching `(from, event)`, in declaration order.
    pub fn candidates<'a>(
        &'a self,
        from: &StateId,
        event: &EventName,
    ) -> impl Iterator<Item = &'a Transition<S>> + use<'a, S> {
        let event = event.clone();
        self.outgoing(from).filter(move |t| t.event == event)
    }
}

pub struct WorkflowBuilder<S: Snapshot> {
    name: String,
    initial: StateId,
    states: Vec<StateDef>,
    transitions: Vec<Transition<S>>,
    from_any: Vec<Transition<S>>,
}

impl<S: Snapshot> WorkflowBuilder<S> {
    pub fn state(mut self, state: StateDef) -> Self {
        self.states.push(state);
        self
    }

    pub fn transition(mut self, transition: Transition<S>) -> Self {
        self.transitions.push(transition);
        self
    }

    /// Add `transition` from every non-terminal state. Build it with
    /// [`Transition::from_any`].
    ///
    /// These are declared after every explicit transition.
    pub fn from_any_non_terminal(mut self, transition: Transition<S>) -> Self {
        self.from_any.push(transition);
        self
    }

    pub fn build(self) -> DomainResult<WorkflowDefinition<S>> {
        let WorkflowBuilder {
            name,
            initial,
            states,
            mut transitions,
            from_any,
        } = self;

        let err = |msg: String| DomainError::configuration(format!("workflow '{name}': {msg}"));

        if states.is_empty() {
            return Err(err("no states declared".to_string()));
        }
        for (i, state) in states.iter().enumerate() {
            if states[..i].iter().any(|other| other.id == state.id) {
                return Err(err(format!("duplicate state '{}'", state.id)));
            }
        }
        let find = |id: &StateId| states.iter().find(|s| &s.id == id);

        if find(&initial).is_none() {
            return Err(err(format!("initial state '{initial}' is not declared")));
        }

        for template in &from_any {
            if template.from != ANY_STATE {
                return Err(err(format!(
                    "transition '{}' is added from every state but names '{}' as its source",
                    template.event, template.from
                )));
            }
            for state in states.iter().filter(|s| !s.is_terminal) {
                transitions.push(Transition {
                    from: state.id.clone(),
                    ..template.clone()
                });
            }
        }

        for t in &transitions {
            let from = find(&t.from)
                .ok_or_else(|| err(format!("transition '{}' from unknown state '{}'", t.event, t.from)))?;
            if find(&t.to).is_none() {
                return Err(err(format!("transition '{}' to unknown state '{}'", t.event, t.to)));
            }
            if from.is_terminal {
                return Err(err(format!(
                    "terminal state '{}' has outgoing transition '{}'",
                    t.from, t.event
                )));
            }
        }

        for state in states.iter().filter(|s| !s.is_terminal) {
            if !transitions.iter().any(|t| t.from == state.id) {
                return Err(err(format!(
                    "non-terminal state '{}' has no outgoing transition",
                    state.id
                )));
            }
        }

        Ok(WorkflowDefinition {
            name,
            initial,
            states,
            transitions,
        })
    }
}
