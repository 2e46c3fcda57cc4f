//! Fatal run-time errors.

use crate::core::{ContextError, Outcome, StateError};
use thiserror::Error;

/// Errors that abort a running task.
///
/// `state` fields hold the full state path, outermost machine first.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("State '{state}' requires input '{key}', which is not in the context")]
    MissingInput { state: String, key: String },

    #[error("State '{state}': {source}")]
    Context {
        state: String,
        #[source]
        source: ContextError,
    },

    #[error("State '{state}' returned '{outcome}' without producing output '{key}'")]
    OutputNotProduced {
        state: String,
        key: String,
        outcome: Outcome,
    },

    #[error("State '{state}' returned undeclared outcome '{outcome}'")]
    UndeclaredOutcome { state: String, outcome: Outcome },

    #[error("No transition for outcome '{outcome}' of state '{state}'")]
    MissingTransition { state: String, outcome: Outcome },

    #[error("Unknown state '{state}'")]
    UnknownState { state: String },

    #[error("State '{state}' failed: {source}")]
    State {
        state: String,
        #[source]
        source: StateError,
    },
}

impl ExecutionError {
    /// Path of the state the error was raised for.
    pub fn state(&self) -> &str {
        match self {
            Self::MissingInput { state, .. }
            | Self::Context { state, .. }
            | Self::OutputNotProduced { state, .. }
            | Self::UndeclaredOutcome { state, .. }
            | Self::MissingTransition { state, .. }
            | Self::UnknownState { state }
            | Self::State { state, .. } => state,
        }
    }
}
