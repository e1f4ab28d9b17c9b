//! Generic guarded workflow engine.
//!
//! Definitions are data: a table of states and a table of transitions whose
//! guards and side effects are plain function pointers. One engine runs every
//! document type.

pub mod definition;
pub mod engine;
pub mod instance;

pub use definition::{
    ANY_STATE, Effect, EventName, Guard, Snapshot, StateDef, StateId, Transition, WorkflowBuilder,
    WorkflowDefinition,
};
pub use engine::{Transitioned, WorkflowEngine};
pub use instance::{EventPayload, HistoryEntry, WorkflowInstance};
