//! Assembly errors for state machine builders.

use crate::core::{Outcome, ValueKind};
use thiserror::Error;

/// One well-formedness violation found while assembling a machine.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum AssemblyError {
    #[error("Machine has no states. Add at least one with .state(...)")]
    NoStates,

    #[error("State '{state}' is added more than once")]
    DuplicateState { state: String },

    #[error("Initial state '{state}' is not a state of this machine")]
    UnknownInitialState { state: String },

    #[error("State '{state}' has a transition for '{outcome}', which it does not declare")]
    UndeclaredOutcome { state: String, outcome: Outcome },

    #[error("State '{state}' has more than one transition for '{outcome}'")]
    DuplicateTransition { state: String, outcome: Outcome },

    #[error("Transition '{state}' --{outcome}--> '{target}' leads to neither a state nor a machine outcome")]
    UnknownTarget {
        state: String,
        outcome: Outcome,
        target: String,
    },

    #[error("'{target}' is both a state name and a machine outcome")]
    AmbiguousTarget { target: String },

    #[error("State '{state}' declares outcome '{outcome}' but has no transition for it")]
    MissingTransition { state: String, outcome: Outcome },

    #[error("State '{state}' remaps '{key}', which it does not declare")]
    UnusedRemapping { state: String, key: String },

    #[error("State '{state}' can never be entered")]
    UnreachableState { state: String },

    #[error("Input '{key}' of state '{state}' is neither a machine input nor produced by another state")]
    UnsatisfiedInput { state: String, key: String },

    #[error("Machine output '{key}' is not produced by any state")]
    UnproducedOutput { key: String },

    #[error("Key '{key}' is declared as {first} and as {second}")]
    KindConflict {
        key: String,
        first: ValueKind,
        second: ValueKind,
    },
}

/// Errors returned by [`StateMachineBuilder::build`](super::StateMachineBuilder::build).
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Machine declares no outcomes")]
    NoOutcomes,

    #[error("Machine '{machine}' is ill-formed ({} violation(s)): {}", errors.len(), summary(errors))]
    Invalid {
        machine: String,
        errors: Vec<AssemblyError>,
    },
}

impl BuildError {
    /// Every violation found, in discovery order.
    pub fn errors(&self) -> &[AssemblyError] {
        match self {
            Self::NoOutcomes => &[],
            Self::Invalid { errors, .. } => errors,
        }
    }
}

fn summary(errors: &[AssemblyError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
