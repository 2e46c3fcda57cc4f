//! The executor loop.
//!
//! Nested machines are driven with an explicit stack of frames instead of
//! recursion, so preemption can unwind every level at once and report the
//! full active path.

use super::error::ExecutionError;
use super::machine::{StateMachine, StateNode};
use crate::core::{
    Access, Context, ContextError, ExecutionHistory, Interface, KeySpec, Outcome, Preemption,
    Remapping, StateError, StepRecord, Target, Value,
};
use chrono::Utc;
use tracing::{debug, info, warn};

/// How a run ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunResult {
    /// The top-level machine exited with one of its outcomes.
    Completed(Outcome),
    /// Preemption was requested; `active` lists the active state path of
    /// every machine on the stack, outermost first.
    Preempted { active: Vec<String> },
}

impl RunResult {
    pub fn outcome(&self) -> Option<&Outcome> {
        match self {
            Self::Completed(outcome) => Some(outcome),
            Self::Preempted { .. } => None,
        }
    }
}

/// A finished run and its history.
#[derive(Clone, Debug)]
pub struct Execution {
    pub result: RunResult,
    pub history: ExecutionHistory,
}

/// Position inside one machine.
struct Cursor<'m> {
    machine: &'m StateMachine,
    path: String,
    active: String,
    attempt: usize,
}

impl<'m> Cursor<'m> {
    fn enter(machine: &'m StateMachine, path: String) -> Self {
        Self {
            machine,
            path,
            active: machine.initial().to_string(),
            attempt: 1,
        }
    }

    fn state_path(&self) -> String {
        format!("{}/{}", self.path, self.active)
    }
}

/// A nested machine on the stack with its private context.
struct Frame<'m> {
    cursor: Cursor<'m>,
    local: Context,
    remapping: &'m Remapping,
}

/// Runs machines to completion, one state at a time.
///
/// # Example
///
/// ```rust
/// use taskgraph::builder::StateEntry;
/// use taskgraph::core::{Context, FnState, Interface, Outcome, Preemption, ValueKind};
/// use taskgraph::executor::{Executor, RunResult, StateMachine};
///
/// # block_on(async {
/// let select = FnState::new(
///     Interface::new(["objects_selected"])
///         .partial_outcomes(["no_more_obj_for_this_workspace"])
///         .input("selected_objects", ValueKind::Objects),
///     |context| {
///         if context.objects("selected_objects")?.is_empty() {
///             Ok(Outcome::from("no_more_obj_for_this_workspace"))
///         } else {
///             Ok(Outcome::from("objects_selected"))
///         }
///     },
/// );
///
/// let machine = StateMachine::builder(["succeeded", "no_object_for_ppt_platform"])
///     .input("selected_objects", ValueKind::Objects)
///     .state(
///         StateEntry::leaf("SELECT_OBJECTS_TO_PLACE", select)
///             .on("objects_selected", "succeeded")
///             .on("no_more_obj_for_this_workspace", "no_object_for_ppt_platform"),
///     )
///     .build()
///     .unwrap();
///
/// let mut context = Context::new().with("selected_objects", Vec::<taskgraph::core::ObjectHandle>::new());
/// let execution = Executor::new(Preemption::new())
///     .run(&machine, &mut context)
///     .await
///     .unwrap();
///
/// assert_eq!(
///     execution.result,
///     RunResult::Completed(Outcome::from("no_object_for_ppt_platform"))
/// );
/// # });
/// # fn block_on<F: std::future::Future>(f: F) {
/// #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f);
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct Executor {
    preemption: Preemption,
}

impl Executor {
    pub fn new(preemption: Preemption) -> Self {
        Self { preemption }
    }

    pub fn preemption(&self) -> &Preemption {
        &self.preemption
    }

    /// Run `machine` against `context` until it exits or is preempted.
    pub async fn run(
        &self,
        machine: &StateMachine,
        context: &mut Context,
    ) -> Result<Execution, ExecutionError> {
        let mut history = ExecutionHistory::new();
        let result = self.run_with_history(machine, context, &mut history).await?;
        Ok(Execution { result, history })
    }

    /// Like [`Executor::run`], recording into a caller-owned history that
    /// survives a fatal error.
    pub async fn run_with_history(
        &self,
        machine: &StateMachine,
        context: &mut Context,
        history: &mut ExecutionHistory,
    ) -> Result<RunResult, ExecutionError> {
        for spec in machine.interface().inputs() {
            fetch_input(spec, &spec.name, context, machine.label())?;
        }
        info!(machine = machine.label(), initial = machine.initial(), "machine started");

        let mut root = Cursor::enter(machine, machine.label().to_string());
        let mut nested: Vec<Frame<'_>> = Vec::new();

        loop {
            if self.preemption.is_requested() {
                return Ok(preempted(&root, &nested));
            }

            let cursor = current(&mut root, &mut nested);
            let owner = cursor.machine;
            let state_path = cursor.state_path();
            let child = owner
                .child(&cursor.active)
                .ok_or_else(|| ExecutionError::UnknownState {
                    state: state_path.clone(),
                })?;

            match &child.node {
                StateNode::Machine(sub) => {
                    let local = copy_in(
                        sub.interface(),
                        &child.remapping,
                        scope(&mut nested, context),
                        &state_path,
                    )?
                    .unrestricted();
                    debug!(machine = %state_path, initial = sub.initial(), "entering sub-machine");
                    nested.push(Frame {
                        cursor: Cursor::enter(sub, state_path),
                        local,
                        remapping: &child.remapping,
                    });
                }
                StateNode::Leaf(state) => {
                    let interface = state.interface();
                    let mut view = copy_in(
                        interface,
                        &child.remapping,
                        scope(&mut nested, context),
                        &state_path,
                    )?;

                    debug!(state = %state_path, "executing state");
                    let outcome = match state.execute(&mut view, &self.preemption).await {
                        Ok(outcome) => outcome,
                        Err(StateError::Preempted) => return Ok(preempted(&root, &nested)),
                        Err(source) => {
                            return Err(ExecutionError::State {
                                state: state_path,
                                source,
                            })
                        }
                    };
                    if !interface.has_outcome(outcome.as_str()) {
                        return Err(ExecutionError::UndeclaredOutcome {
                            state: state_path,
                            outcome,
                        });
                    }

                    copy_out(
                        interface,
                        &child.remapping,
                        &view,
                        scope(&mut nested, context),
                        &outcome,
                        &state_path,
                    )?;

                    if let Some(terminal) = advance(&mut root, &mut nested, context, outcome, history)? {
                        info!(machine = machine.label(), outcome = %terminal, "machine finished");
                        return Ok(RunResult::Completed(terminal));
                    }
                }
            }
        }
    }
}

fn current<'a, 'm>(root: &'a mut Cursor<'m>, nested: &'a mut [Frame<'m>]) -> &'a mut Cursor<'m> {
    match nested.last_mut() {
        Some(frame) => &mut frame.cursor,
        None => root,
    }
}

/// Context of the innermost active machine.
fn scope<'a>(nested: &'a mut [Frame<'_>], root: &'a mut Context) -> &'a mut Context {
    match nested.last_mut() {
        Some(frame) => &mut frame.local,
        None => root,
    }
}

fn preempted(root: &Cursor<'_>, nested: &[Frame<'_>]) -> RunResult {
    let active: Vec<String> = std::iter::once(root)
        .chain(nested.iter().map(|frame| &frame.cursor))
        .map(Cursor::state_path)
        .collect();
    warn!(?active, "execution preempted");
    RunResult::Preempted { active }
}

/// Resolve `outcome` for the active state, unwinding finished sub-machines.
///
/// Returns the top-level outcome once the outermost machine exits.
fn advance<'m>(
    root: &mut Cursor<'m>,
    nested: &mut Vec<Frame<'m>>,
    context: &mut Context,
    mut outcome: Outcome,
    history: &mut ExecutionHistory,
) -> Result<Option<Outcome>, ExecutionError> {
    loop {
        let cursor = current(root, nested);
        let target = cursor
            .machine
            .transitions()
            .resolve(&cursor.active, outcome.as_str())
            .cloned()
            .ok_or_else(|| ExecutionError::MissingTransition {
                state: cursor.state_path(),
                outcome: outcome.clone(),
            })?;

        history.push(StepRecord {
            machine: cursor.path.clone(),
            state: cursor.active.clone(),
            outcome: outcome.clone(),
            target: target.clone(),
            timestamp: Utc::now(),
            attempt: cursor.attempt,
        });

        let terminal = match target {
            Target::State(next) => {
                if next == cursor.active {
                    cursor.attempt += 1;
                    debug!(state = %cursor.state_path(), attempt = cursor.attempt, %outcome, "retrying state");
                } else {
                    debug!(from = %cursor.state_path(), to = %next, %outcome, "transition");
                    cursor.attempt = 1;
                    cursor.active = next;
                }
                return Ok(None);
            }
            Target::Outcome(terminal) => terminal,
        };

        let Some(frame) = nested.pop() else {
            check_outputs(root.machine.interface(), context, &terminal, &root.path)?;
            return Ok(Some(terminal));
        };

        copy_out(
            frame.cursor.machine.interface(),
            frame.remapping,
            &frame.local,
            scope(nested, context),
            &terminal,
            &frame.cursor.path,
        )?;
        info!(machine = %frame.cursor.path, outcome = %terminal, "sub-machine finished");
        outcome = terminal;
    }
}

/// Look up one declared input under `key`, checking presence and kind.
fn fetch_input<'c>(
    spec: &KeySpec,
    key: &str,
    scope: &'c Context,
    state: &str,
) -> Result<Option<&'c Value>, ExecutionError> {
    match scope.get(key) {
        Ok(value) if value.kind() == spec.kind => Ok(Some(value)),
        Ok(value) => Err(ExecutionError::Context {
            state: state.to_string(),
            source: ContextError::TypeMismatch {
                key: key.to_string(),
                expected: spec.kind,
                found: value.kind(),
            },
        }),
        Err(ContextError::MissingKey { .. }) if spec.optional => Ok(None),
        Err(ContextError::MissingKey { .. }) => Err(ExecutionError::MissingInput {
            state: state.to_string(),
            key: key.to_string(),
        }),
        Err(source) => Err(ExecutionError::Context {
            state: state.to_string(),
            source,
        }),
    }
}

/// Build the scoped context a child runs against.
fn copy_in(
    interface: &Interface,
    remapping: &Remapping,
    scope: &Context,
    state: &str,
) -> Result<Context, ExecutionError> {
    let mut view = Context::scoped(Access {
        readable: interface.inputs().iter().map(|spec| spec.name.clone()).collect(),
        writable: interface.outputs().iter().map(|spec| spec.name.clone()).collect(),
    });
    for spec in interface.inputs() {
        let key = remapping.input_key(&spec.name);
        if let Some(value) = fetch_input(spec, key, scope, state)? {
            view.put(spec.name.clone(), value.clone());
        }
    }
    Ok(view)
}

/// Write a child's declared outputs back under their remapped names.
fn copy_out(
    interface: &Interface,
    remapping: &Remapping,
    view: &Context,
    scope: &mut Context,
    outcome: &Outcome,
    state: &str,
) -> Result<(), ExecutionError> {
    for spec in interface.outputs() {
        match view.peek(&spec.name) {
            Some(value) if value.kind() != spec.kind => {
                return Err(ExecutionError::Context {
                    state: state.to_string(),
                    source: ContextError::TypeMismatch {
                        key: spec.name.clone(),
                        expected: spec.kind,
                        found: value.kind(),
                    },
                })
            }
            Some(value) => scope
                .set(remapping.output_key(&spec.name), value.clone())
                .map_err(|source| ExecutionError::Context {
                    state: state.to_string(),
                    source,
                })?,
            None if spec.optional || interface.is_partial(outcome.as_str()) => {}
            None => {
                return Err(ExecutionError::OutputNotProduced {
                    state: state.to_string(),
                    key: spec.name.clone(),
                    outcome: outcome.clone(),
                })
            }
        }
    }
    Ok(())
}

/// Required outputs of the top-level machine after it exits.
fn check_outputs(
    interface: &Interface,
    context: &Context,
    outcome: &Outcome,
    state: &str,
) -> Result<(), ExecutionError> {
    let partial = interface.is_partial(outcome.as_str());
    for spec in interface.outputs() {
        match context.peek(&spec.name) {
            Some(value) if value.kind() != spec.kind => {
                return Err(ExecutionError::Context {
                    state: state.to_string(),
                    source: ContextError::TypeMismatch {
                        key: spec.name.clone(),
                        expected: spec.kind,
                        found: value.kind(),
                    },
                })
            }
            Some(_) => {}
            None if spec.optional || partial => {}
            None => {
                return Err(ExecutionError::OutputNotProduced {
                    state: state.to_string(),
                    key: spec.name.clone(),
                    outcome: outcome.clone(),
                })
            }
        }
    }
    Ok(())
}
