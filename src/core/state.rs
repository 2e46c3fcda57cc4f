//! The state contract: declared interface plus a single async execution step.

use super::context::{Context, ContextError};
use super::outcome::Outcome;
use super::preemption::Preemption;
use super::value::ValueKind;
use crate::action::ActionError;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Declaration of one context key a state reads or writes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeySpec {
    pub name: String,
    pub kind: ValueKind,
    /// Optional inputs may be absent at invocation; optional outputs need
    /// not be produced.
    pub optional: bool,
}

impl KeySpec {
    pub fn required(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            optional: true,
        }
    }
}

/// The externally visible contract of a state.
///
/// Outcomes listed as *partial* are outcomes after which required outputs
/// need not be present: failures, timeouts and empty-resource results.
///
/// # Example
///
/// ```rust
/// use taskgraph::core::{Interface, ValueKind};
///
/// let interface = Interface::new(["object_selected"])
///     .partial_outcomes(["no_more_objects", "no_more_cavities"])
///     .input("selected_objects", ValueKind::Objects)
///     .output("cavity_pose", ValueKind::Pose);
///
/// assert!(interface.has_outcome("no_more_cavities"));
/// assert!(interface.is_partial("no_more_objects"));
/// assert!(!interface.is_partial("object_selected"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Interface {
    outcomes: BTreeSet<Outcome>,
    partial: BTreeSet<Outcome>,
    inputs: Vec<KeySpec>,
    outputs: Vec<KeySpec>,
}

impl Interface {
    pub fn new<I, O>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<Outcome>,
    {
        Self {
            outcomes: outcomes.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Add outcomes that may leave required outputs unwritten.
    pub fn partial_outcomes<I, O>(mut self, outcomes: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<Outcome>,
    {
        for outcome in outcomes {
            let outcome = outcome.into();
            self.outcomes.insert(outcome.clone());
            self.partial.insert(outcome);
        }
        self
    }

    pub fn input(self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.input_spec(KeySpec::required(name, kind))
    }

    pub fn optional_input(self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.input_spec(KeySpec::optional(name, kind))
    }

    pub fn output(self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.output_spec(KeySpec::required(name, kind))
    }

    pub fn optional_output(self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.output_spec(KeySpec::optional(name, kind))
    }

    /// Declare `name` as both a required input and a required output.
    pub fn input_output(self, name: impl Into<String>, kind: ValueKind) -> Self {
        let name = name.into();
        self.input(name.clone(), kind).output(name, kind)
    }

    pub fn input_spec(mut self, spec: KeySpec) -> Self {
        self.inputs.retain(|existing| existing.name != spec.name);
        self.inputs.push(spec);
        self
    }

    pub fn output_spec(mut self, spec: KeySpec) -> Self {
        self.outputs.retain(|existing| existing.name != spec.name);
        self.outputs.push(spec);
        self
    }

    pub fn outcomes(&self) -> &BTreeSet<Outcome> {
        &self.outcomes
    }

    pub fn has_outcome(&self, outcome: &str) -> bool {
        self.outcomes.contains(outcome)
    }

    pub fn is_partial(&self, outcome: &str) -> bool {
        self.partial.contains(outcome)
    }

    pub fn inputs(&self) -> &[KeySpec] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[KeySpec] {
        &self.outputs
    }

    pub fn input_key(&self, name: &str) -> Option<&KeySpec> {
        self.inputs.iter().find(|spec| spec.name == name)
    }

    pub fn output_key(&self, name: &str) -> Option<&KeySpec> {
        self.outputs.iter().find(|spec| spec.name == name)
    }
}

/// Fatal errors raised from inside a state.
///
/// Recoverable failures are outcomes, not errors.
#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error("Invalid payload from '{server}': {reason}")]
    InvalidPayload { server: String, reason: String },

    #[error("Execution was preempted")]
    Preempted,

    /// A nested machine run through [`State::execute`] failed.
    #[error(transparent)]
    Execution(Box<crate::executor::ExecutionError>),

    #[error("{0}")]
    Failed(String),
}

/// An executable unit of a state machine.
///
/// The executor guarantees that every required input is present in
/// `context` before `execute` is called, and checks the returned outcome
/// and the produced outputs afterwards.
#[async_trait]
pub trait State: Send + Sync {
    fn interface(&self) -> &Interface;

    async fn execute(
        &self,
        context: &mut Context,
        preemption: &Preemption,
    ) -> Result<Outcome, StateError>;
}

type Step = Arc<dyn Fn(&mut Context) -> Result<Outcome, StateError> + Send + Sync>;

/// Leaf state backed by an in-process closure.
///
/// Used for selection and bookkeeping steps that need no external service.
///
/// # Example
///
/// ```rust
/// use taskgraph::core::{FnState, Interface, Outcome, ValueKind};
///
/// let count = FnState::new(
///     Interface::new(["succeeded"]).input_output("attempts", ValueKind::Integer),
///     |context| {
///         let attempts = *context.integer("attempts")?;
///         context.set("attempts", attempts + 1)?;
///         Ok(Outcome::SUCCEEDED)
///     },
/// );
/// ```
#[derive(Clone)]
pub struct FnState {
    interface: Interface,
    step: Step,
}

impl FnState {
    pub fn new<F>(interface: Interface, step: F) -> Self
    where
        F: Fn(&mut Context) -> Result<Outcome, StateError> + Send + Sync + 'static,
    {
        Self {
            interface,
            step: Arc::new(step),
        }
    }
}

impl fmt::Debug for FnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnState")
            .field("interface", &self.interface)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl State for FnState {
    fn interface(&self) -> &Interface {
        &self.interface
    }

    async fn execute(
        &self,
        context: &mut Context,
        _preemption: &Preemption,
    ) -> Result<Outcome, StateError> {
        (self.step)(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_outcomes_are_declared_outcomes() {
        let interface = Interface::new(["succeeded"]).partial_outcomes(["tf_error"]);
        assert!(interface.has_outcome("tf_error"));
        assert_eq!(interface.outcomes().len(), 2);
    }

    #[test]
    fn redeclaring_a_key_replaces_it() {
        let interface = Interface::new(["succeeded"])
            .input("object_pose", ValueKind::Pose)
            .optional_input("object_pose", ValueKind::Pose);

        assert_eq!(interface.inputs().len(), 1);
        assert!(interface.input_key("object_pose").unwrap().optional);
    }

    #[test]
    fn input_output_declares_both_directions() {
        let interface = Interface::new(["succeeded"]).input_output("task_list", ValueKind::Tasks);
        assert!(interface.input_key("task_list").is_some());
        assert!(interface.output_key("task_list").is_some());
    }

    #[tokio::test]
    async fn fn_state_runs_closure() {
        let state = FnState::new(
            Interface::new(["succeeded"]).output("move_arm_to", ValueKind::Text),
            |context| {
                context.set("move_arm_to", "pre_grasp")?;
                Ok(Outcome::SUCCEEDED)
            },
        );

        let mut context = Context::new();
        let outcome = state.execute(&mut context, &Preemption::new()).await.unwrap();

        assert_eq!(outcome, Outcome::SUCCEEDED);
        assert_eq!(context.text("move_arm_to").unwrap(), "pre_grasp");
    }
}
