//! Assembled state machines.

use super::run::{Executor, RunResult};
use crate::builder::StateMachineBuilder;
use crate::core::{
    Context, ContextError, Interface, Outcome, Preemption, Remapping, State, StateError,
    TransitionTable,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;

/// A state inside a machine: either a leaf or a nested machine.
pub enum StateNode {
    Leaf(Box<dyn State>),
    Machine(StateMachine),
}

impl StateNode {
    pub fn leaf<S: State + 'static>(state: S) -> Self {
        Self::Leaf(Box::new(state))
    }

    pub fn interface(&self) -> &Interface {
        match self {
            Self::Leaf(state) => state.interface(),
            Self::Machine(machine) => machine.interface(),
        }
    }

    pub fn is_machine(&self) -> bool {
        matches!(self, Self::Machine(_))
    }
}

impl From<StateMachine> for StateNode {
    fn from(machine: StateMachine) -> Self {
        Self::Machine(machine)
    }
}

impl fmt::Debug for StateNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(state) => f
                .debug_tuple("Leaf")
                .field(state.interface())
                .finish(),
            Self::Machine(machine) => f.debug_tuple("Machine").field(machine).finish(),
        }
    }
}

/// A named child of a machine together with its remapping.
#[derive(Debug)]
pub struct ChildState {
    pub(crate) name: String,
    pub(crate) node: StateNode,
    pub(crate) remapping: Remapping,
}

impl ChildState {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node(&self) -> &StateNode {
        &self.node
    }

    pub fn remapping(&self) -> &Remapping {
        &self.remapping
    }
}

/// A validated composite state.
///
/// Machines are immutable once built and can only be obtained through
/// [`StateMachine::builder`], which rejects ill-formed assemblies.
///
/// # Example
///
/// ```rust
/// use taskgraph::builder::StateEntry;
/// use taskgraph::core::{FnState, Interface, Outcome};
/// use taskgraph::executor::StateMachine;
///
/// let look = FnState::new(Interface::new(["succeeded", "failed"]), |_| Ok(Outcome::SUCCEEDED));
///
/// let machine = StateMachine::builder(["succeeded"])
///     .state(
///         StateEntry::leaf("LOOK_AT_WORKSPACE", look)
///             .on("succeeded", "succeeded")
///             .on("failed", "LOOK_AT_WORKSPACE"),
///     )
///     .build()
///     .unwrap();
///
/// assert_eq!(machine.initial(), "LOOK_AT_WORKSPACE");
/// ```
pub struct StateMachine {
    label: String,
    interface: Interface,
    children: Vec<ChildState>,
    index: HashMap<String, usize>,
    transitions: TransitionTable,
    initial: String,
}

impl StateMachine {
    pub fn builder<I, O>(outcomes: I) -> StateMachineBuilder
    where
        I: IntoIterator<Item = O>,
        O: Into<Outcome>,
    {
        StateMachineBuilder::new(outcomes)
    }

    pub(crate) fn assemble(
        label: String,
        interface: Interface,
        children: Vec<ChildState>,
        transitions: TransitionTable,
        initial: String,
    ) -> Self {
        let index = children
            .iter()
            .enumerate()
            .map(|(position, child)| (child.name.clone(), position))
            .collect();
        Self {
            label,
            interface,
            children,
            index,
            transitions,
            initial,
        }
    }

    /// Name used for this machine in logs and history paths.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn interface(&self) -> &Interface {
        &self.interface
    }

    pub fn initial(&self) -> &str {
        &self.initial
    }

    pub fn child(&self, name: &str) -> Option<&ChildState> {
        self.index.get(name).map(|&position| &self.children[position])
    }

    pub fn children(&self) -> &[ChildState] {
        &self.children
    }

    pub fn transitions(&self) -> &TransitionTable {
        &self.transitions
    }

    pub fn state_names(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(|child| child.name.as_str())
    }
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("label", &self.label)
            .field("initial", &self.initial)
            .field("states", &self.state_names().collect::<Vec<_>>())
            .field("outcomes", self.interface.outcomes())
            .finish()
    }
}

/// Running a machine as a plain state copies its declared inputs into a
/// private context, runs it on a fresh executor and copies its declared
/// outputs back.
#[async_trait]
impl State for StateMachine {
    fn interface(&self) -> &Interface {
        &self.interface
    }

    async fn execute(
        &self,
        context: &mut Context,
        preemption: &Preemption,
    ) -> Result<Outcome, StateError> {
        let mut local = Context::new();
        for spec in self.interface.inputs() {
            match context.get(&spec.name) {
                Ok(value) => local.put(spec.name.clone(), value.clone()),
                Err(ContextError::MissingKey { .. }) if spec.optional => {}
                Err(err) => return Err(err.into()),
            }
        }

        let result = Executor::new(preemption.clone())
            .run(self, &mut local)
            .await
            .map_err(|err| StateError::Execution(Box::new(err)))?;

        match result.result {
            RunResult::Completed(outcome) => {
                for spec in self.interface.outputs() {
                    if let Some(value) = local.peek(&spec.name) {
                        context.set(spec.name.clone(), value.clone())?;
                    }
                }
                Ok(outcome)
            }
            RunResult::Preempted { .. } => Err(StateError::Preempted),
        }
    }
}
