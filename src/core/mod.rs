//! Core data model of the engine.
//!
//! This module contains the pieces every machine is made of:
//! - Tagged context values and the task context
//! - Outcomes, transition targets and transition tables
//! - Key remapping between machine scopes
//! - The `State` contract and the closure-backed `FnState`
//! - Preemption handles and execution history
//!
//! Nothing here runs a machine; see [`crate::executor`].

mod context;
mod history;
mod outcome;
mod preemption;
mod remapping;
mod state;
mod transition;
mod value;

pub(crate) use context::Access;
pub use context::{Context, ContextError};
pub use history::{ExecutionHistory, StepRecord};
pub use outcome::Outcome;
pub use preemption::Preemption;
pub use remapping::Remapping;
pub use state::{FnState, Interface, KeySpec, State, StateError};
pub use transition::{Target, TransitionTable};
pub use value::{ObjectHandle, Pose, TaskItem, Value, ValueKind};
