//! Builder for constructing state machines.

use super::error::{AssemblyError, BuildError};
use super::validate::{validate, Draft};
use crate::core::{Interface, Outcome, Remapping, State, ValueKind};
use crate::executor::{ChildState, StateMachine, StateNode};
use stillwater::validation::Validation;
use tracing::debug;

/// Label given to machines built without one.
pub const DEFAULT_LABEL: &str = "SM";

/// A named state being added to a machine, with its transitions and
/// remapping.
///
/// Transition targets are names: a sibling state or one of the enclosing
/// machine's outcomes. They are resolved when the machine is built.
#[derive(Debug)]
pub struct StateEntry {
    pub(crate) name: String,
    pub(crate) node: StateNode,
    pub(crate) transitions: Vec<(Outcome, String)>,
    pub(crate) remapping: Remapping,
}

impl StateEntry {
    pub fn leaf<S: State + 'static>(name: impl Into<String>, state: S) -> Self {
        Self::node(name, StateNode::leaf(state))
    }

    /// Add a nested machine as a state.
    pub fn machine(name: impl Into<String>, machine: StateMachine) -> Self {
        Self::node(name, StateNode::Machine(machine))
    }

    pub fn node(name: impl Into<String>, node: StateNode) -> Self {
        Self {
            name: name.into(),
            node,
            transitions: Vec::new(),
            remapping: Remapping::new(),
        }
    }

    /// Route `outcome` to `target`.
    pub fn on(mut self, outcome: impl Into<Outcome>, target: impl Into<String>) -> Self {
        self.transitions.push((outcome.into(), target.into()));
        self
    }

    /// Read and write the child key `child` as `parent` in the enclosing
    /// machine.
    pub fn remap(mut self, child: impl Into<String>, parent: impl Into<String>) -> Self {
        self.remapping = self.remapping.map(child, parent);
        self
    }

    pub fn remap_input(mut self, child: impl Into<String>, parent: impl Into<String>) -> Self {
        self.remapping = self.remapping.map_input(child, parent);
        self
    }

    pub fn remap_output(mut self, child: impl Into<String>, parent: impl Into<String>) -> Self {
        self.remapping = self.remapping.map_output(child, parent);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for constructing state machines with a fluent API.
///
/// `build` validates the whole assembly and reports every violation it
/// finds, so an ill-formed machine is never constructed.
///
/// # Example
///
/// ```rust
/// use taskgraph::builder::{AssemblyError, BuildError, StateEntry, StateMachineBuilder};
/// use taskgraph::core::{FnState, Interface, Outcome};
///
/// let look = FnState::new(Interface::new(["succeeded", "failed"]), |_| Ok(Outcome::SUCCEEDED));
///
/// let err = StateMachineBuilder::new(["succeeded"])
///     .state(StateEntry::leaf("LOOK_AT_WORKSPACE", look).on("succeeded", "succeeded"))
///     .build()
///     .unwrap_err();
///
/// assert!(matches!(
///     err.errors(),
///     [AssemblyError::MissingTransition { .. }]
/// ));
/// ```
#[derive(Debug)]
pub struct StateMachineBuilder {
    label: Option<String>,
    interface: Interface,
    entries: Vec<StateEntry>,
    initial: Option<String>,
    reject_unreachable: bool,
}

impl StateMachineBuilder {
    /// Create a builder for a machine exiting with `outcomes`.
    pub fn new<I, O>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<Outcome>,
    {
        Self {
            label: None,
            interface: Interface::new(outcomes),
            entries: Vec::new(),
            initial: None,
            reject_unreachable: true,
        }
    }

    /// Name used in logs and history paths when this is the outermost machine.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Machine outcomes after which required outputs need not be present.
    pub fn partial_outcomes<I, O>(mut self, outcomes: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<Outcome>,
    {
        self.interface = self.interface.partial_outcomes(outcomes);
        self
    }

    pub fn input(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.interface = self.interface.input(name, kind);
        self
    }

    pub fn optional_input(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.interface = self.interface.optional_input(name, kind);
        self
    }

    pub fn output(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.interface = self.interface.output(name, kind);
        self
    }

    pub fn optional_output(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.interface = self.interface.optional_output(name, kind);
        self
    }

    pub fn input_output(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.interface = self.interface.input_output(name, kind);
        self
    }

    /// Set the initial state. Defaults to the first state added.
    pub fn initial(mut self, state: impl Into<String>) -> Self {
        self.initial = Some(state.into());
        self
    }

    pub fn state(mut self, entry: StateEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Whether states that can never be entered fail the build.
    pub fn reject_unreachable(mut self, reject: bool) -> Self {
        self.reject_unreachable = reject;
        self
    }

    /// Build the state machine.
    /// Returns every assembly violation if the machine is ill-formed.
    pub fn build(self) -> Result<StateMachine, BuildError> {
        if self.interface.outcomes().is_empty() {
            return Err(BuildError::NoOutcomes);
        }

        let label = self.label.unwrap_or_else(|| DEFAULT_LABEL.to_string());
        let initial = self
            .initial
            .or_else(|| self.entries.first().map(|entry| entry.name.clone()));

        let draft = Draft {
            interface: &self.interface,
            entries: &self.entries,
            initial: initial.as_deref(),
            reject_unreachable: self.reject_unreachable,
        };
        let transitions = match validate(&draft) {
            Validation::Success(table) => table,
            Validation::Failure(errors) => {
                return Err(BuildError::Invalid {
                    machine: label,
                    errors: errors.iter().cloned().collect(),
                })
            }
        };
        let Some(initial) = initial else {
            return Err(BuildError::Invalid {
                machine: label,
                errors: vec![AssemblyError::NoStates],
            });
        };

        debug!(
            machine = %label,
            states = self.entries.len(),
            transitions = transitions.len(),
            "machine assembled"
        );

        let children = self
            .entries
            .into_iter()
            .map(|entry| ChildState {
                name: entry.name,
                node: entry.node,
                remapping: entry.remapping,
            })
            .collect();

        Ok(StateMachine::assemble(
            label,
            self.interface,
            children,
            transitions,
            initial,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FnState, Target};

    fn leaf(outcomes: &[&'static str]) -> FnState {
        FnState::new(Interface::new(outcomes.iter().copied()), |_| {
            Ok(Outcome::SUCCEEDED)
        })
    }

    fn errors(result: Result<StateMachine, BuildError>) -> Vec<AssemblyError> {
        result.unwrap_err().errors().to_vec()
    }

    #[test]
    fn builder_requires_outcomes() {
        let result = StateMachineBuilder::new(Vec::<Outcome>::new()).build();
        assert!(matches!(result, Err(BuildError::NoOutcomes)));
    }

    #[test]
    fn builder_requires_states() {
        let errors = errors(StateMachineBuilder::new(["succeeded"]).build());
        assert_eq!(errors, vec![AssemblyError::NoStates]);
    }

    #[test]
    fn initial_defaults_to_first_state() {
        let machine = StateMachineBuilder::new(["succeeded"])
            .state(StateEntry::leaf("A", leaf(&["succeeded"])).on("succeeded", "B"))
            .state(StateEntry::leaf("B", leaf(&["succeeded"])).on("succeeded", "succeeded"))
            .build()
            .unwrap();

        assert_eq!(machine.initial(), "A");
        assert_eq!(machine.label(), DEFAULT_LABEL);
        assert_eq!(
            machine.transitions().resolve("A", "succeeded"),
            Some(&Target::State("B".to_string()))
        );
        assert_eq!(
            machine.transitions().resolve("B", "succeeded"),
            Some(&Target::Outcome(Outcome::SUCCEEDED))
        );
    }

    #[test]
    fn all_violations_are_reported_together() {
        let errors = errors(
            StateMachineBuilder::new(["succeeded"])
                .initial("START")
                .state(
                    StateEntry::leaf("A", leaf(&["succeeded", "failed"]))
                        .on("succeeded", "NOWHERE")
                        .on("timeout", "A"),
                )
                .state(StateEntry::leaf("A", leaf(&["succeeded"])).on("succeeded", "succeeded"))
                .build(),
        );

        assert!(errors.contains(&AssemblyError::UnknownInitialState {
            state: "START".to_string()
        }));
        assert!(errors.contains(&AssemblyError::DuplicateState {
            state: "A".to_string()
        }));
        assert!(errors.contains(&AssemblyError::UnknownTarget {
            state: "A".to_string(),
            outcome: Outcome::SUCCEEDED,
            target: "NOWHERE".to_string(),
        }));
        assert!(errors.contains(&AssemblyError::UndeclaredOutcome {
            state: "A".to_string(),
            outcome: Outcome::TIMEOUT,
        }));
        assert!(errors.contains(&AssemblyError::MissingTransition {
            state: "A".to_string(),
            outcome: Outcome::FAILED,
        }));
    }

    #[test]
    fn duplicate_and_ambiguous_targets_are_rejected() {
        let errors = errors(
            StateMachineBuilder::new(["succeeded", "B"])
                .state(
                    StateEntry::leaf("A", leaf(&["succeeded"]))
                        .on("succeeded", "B")
                        .on("succeeded", "succeeded"),
                )
                .state(StateEntry::leaf("B", leaf(&["succeeded"])).on("succeeded", "succeeded"))
                .reject_unreachable(false)
                .build(),
        );

        assert!(errors.contains(&AssemblyError::AmbiguousTarget {
            target: "B".to_string()
        }));
        assert!(errors.contains(&AssemblyError::DuplicateTransition {
            state: "A".to_string(),
            outcome: Outcome::SUCCEEDED,
        }));
    }

    #[test]
    fn unreachable_states_follow_policy() {
        let build = |reject| {
            StateMachineBuilder::new(["succeeded"])
                .state(StateEntry::leaf("A", leaf(&["succeeded"])).on("succeeded", "succeeded"))
                .state(StateEntry::leaf("ORPHAN", leaf(&["succeeded"])).on("succeeded", "A"))
                .reject_unreachable(reject)
                .build()
        };

        assert_eq!(
            errors(build(true)),
            vec![AssemblyError::UnreachableState {
                state: "ORPHAN".to_string()
            }]
        );
        assert!(build(false).is_ok());
    }

    #[test]
    fn remapping_must_name_declared_keys() {
        let state = FnState::new(
            Interface::new(["succeeded"]).input("object_pose", ValueKind::Pose),
            |_| Ok(Outcome::SUCCEEDED),
        );
        let errors = errors(
            StateMachineBuilder::new(["succeeded"])
                .input("cavity_pose", ValueKind::Pose)
                .state(
                    StateEntry::leaf("TRANSFORM", state)
                        .on("succeeded", "succeeded")
                        .remap_input("object_pose", "cavity_pose")
                        .remap_output("object_pose", "cavity_pose"),
                )
                .build(),
        );

        assert_eq!(
            errors,
            vec![AssemblyError::UnusedRemapping {
                state: "TRANSFORM".to_string(),
                key: "object_pose".to_string(),
            }]
        );
    }

    #[test]
    fn inputs_must_be_satisfiable() {
        let state = FnState::new(
            Interface::new(["succeeded"]).input("task_list", ValueKind::Tasks),
            |_| Ok(Outcome::SUCCEEDED),
        );
        let errors = errors(
            StateMachineBuilder::new(["succeeded"])
                .state(StateEntry::leaf("SELECT", state).on("succeeded", "succeeded"))
                .build(),
        );

        assert_eq!(
            errors,
            vec![AssemblyError::UnsatisfiedInput {
                state: "SELECT".to_string(),
                key: "task_list".to_string(),
            }]
        );
    }

    #[test]
    fn sibling_outputs_satisfy_inputs_under_remapped_names() {
        let find = FnState::new(
            Interface::new(["succeeded"]).output("cavities", ValueKind::Poses),
            |context| {
                context.set("cavities", Vec::<crate::core::Pose>::new())?;
                Ok(Outcome::SUCCEEDED)
            },
        );
        let select = FnState::new(
            Interface::new(["succeeded"]).input("candidates", ValueKind::Poses),
            |_| Ok(Outcome::SUCCEEDED),
        );

        let machine = StateMachineBuilder::new(["succeeded"])
            .state(StateEntry::leaf("FIND", find).on("succeeded", "SELECT"))
            .state(
                StateEntry::leaf("SELECT", select)
                    .on("succeeded", "succeeded")
                    .remap("candidates", "cavities"),
            )
            .build();

        assert!(machine.is_ok());
    }

    #[test]
    fn machine_outputs_must_be_produced() {
        let errors = errors(
            StateMachineBuilder::new(["succeeded"])
                .output("last_grasped_obj", ValueKind::Object)
                .optional_output("move_base_by", ValueKind::Pose)
                .state(StateEntry::leaf("A", leaf(&["succeeded"])).on("succeeded", "succeeded"))
                .build(),
        );

        assert_eq!(
            errors,
            vec![AssemblyError::UnproducedOutput {
                key: "last_grasped_obj".to_string()
            }]
        );
    }

    #[test]
    fn conflicting_kinds_are_reported_once_per_key() {
        let writer = FnState::new(
            Interface::new(["succeeded"]).output("cavity_pose", ValueKind::Poses),
            |_| Ok(Outcome::SUCCEEDED),
        );
        let errors = errors(
            StateMachineBuilder::new(["succeeded"])
                .input("cavity_pose", ValueKind::Pose)
                .output("cavity_pose", ValueKind::Pose)
                .state(StateEntry::leaf("A", writer).on("succeeded", "succeeded"))
                .build(),
        );

        assert_eq!(
            errors,
            vec![AssemblyError::KindConflict {
                key: "cavity_pose".to_string(),
                first: ValueKind::Pose,
                second: ValueKind::Poses,
            }]
        );
    }

    #[test]
    fn build_error_lists_every_violation() {
        let err = StateMachineBuilder::new(["succeeded"])
            .label("PLACE")
            .build()
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("PLACE"));
        assert!(message.contains("no states"));
    }
}
