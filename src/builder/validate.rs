//! Build-time well-formedness checks.
//!
//! Every check contributes a `Validation`; all of them are combined so a
//! single `build()` reports every violation at once.

use super::error::AssemblyError;
use super::machine::StateEntry;
use crate::core::{Interface, Outcome, Target, TransitionTable, ValueKind};
use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Check = Validation<(), NonEmptyVec<AssemblyError>>;

/// A machine as described to the builder, before validation.
pub(crate) struct Draft<'a> {
    pub(crate) interface: &'a Interface,
    pub(crate) entries: &'a [StateEntry],
    pub(crate) initial: Option<&'a str>,
    pub(crate) reject_unreachable: bool,
}

/// Validate `draft`, yielding its resolved transition table.
pub(crate) fn validate(draft: &Draft<'_>) -> Validation<TransitionTable, NonEmptyVec<AssemblyError>> {
    let mut checks = Vec::new();
    let mut table = TransitionTable::new();

    check_states(draft, &mut checks);
    check_initial(draft, &mut checks);
    check_transitions(draft, &mut table, &mut checks);
    check_remappings(draft, &mut checks);
    check_data_flow(draft, &mut checks);
    check_kinds(draft, &mut checks);
    if draft.reject_unreachable {
        check_reachability(draft, &table, &mut checks);
    }

    Validation::all_vec(checks).map(|_| table)
}

fn ensure(ok: bool, violation: impl FnOnce() -> AssemblyError) -> Check {
    if ok {
        Validation::success(())
    } else {
        Validation::fail(violation())
    }
}

fn check_states(draft: &Draft<'_>, checks: &mut Vec<Check>) {
    checks.push(ensure(!draft.entries.is_empty(), || AssemblyError::NoStates));

    let mut seen = HashSet::new();
    for entry in draft.entries {
        checks.push(ensure(seen.insert(entry.name.as_str()), || {
            AssemblyError::DuplicateState {
                state: entry.name.clone(),
            }
        }));
    }
}

fn check_initial(draft: &Draft<'_>, checks: &mut Vec<Check>) {
    if let Some(initial) = draft.initial {
        checks.push(ensure(
            draft.entries.iter().any(|entry| entry.name == initial),
            || AssemblyError::UnknownInitialState {
                state: initial.to_string(),
            },
        ));
    }
}

fn check_transitions(draft: &Draft<'_>, table: &mut TransitionTable, checks: &mut Vec<Check>) {
    let states: HashSet<&str> = draft.entries.iter().map(|entry| entry.name.as_str()).collect();

    for entry in draft.entries {
        let declared = entry.node.interface();
        let mut routed = BTreeSet::new();

        for (outcome, target) in &entry.transitions {
            if !declared.has_outcome(outcome.as_str()) {
                checks.push(Validation::fail(AssemblyError::UndeclaredOutcome {
                    state: entry.name.clone(),
                    outcome: outcome.clone(),
                }));
                continue;
            }
            if !routed.insert(outcome) {
                checks.push(Validation::fail(AssemblyError::DuplicateTransition {
                    state: entry.name.clone(),
                    outcome: outcome.clone(),
                }));
                continue;
            }
            match resolve_target(&entry.name, outcome, target, &states, draft.interface) {
                Ok(resolved) => {
                    table.insert(entry.name.clone(), outcome.clone(), resolved);
                }
                Err(violation) => checks.push(Validation::fail(violation)),
            }
        }

        for outcome in declared.outcomes() {
            checks.push(ensure(routed.contains(outcome), || {
                AssemblyError::MissingTransition {
                    state: entry.name.clone(),
                    outcome: outcome.clone(),
                }
            }));
        }
    }
}

fn resolve_target(
    state: &str,
    outcome: &Outcome,
    target: &str,
    states: &HashSet<&str>,
    machine: &Interface,
) -> Result<Target, AssemblyError> {
    match (states.contains(target), machine.has_outcome(target)) {
        (true, true) => Err(AssemblyError::AmbiguousTarget {
            target: target.to_string(),
        }),
        (true, false) => Ok(Target::State(target.to_string())),
        (false, true) => Ok(Target::Outcome(Outcome::from(target.to_string()))),
        (false, false) => Err(AssemblyError::UnknownTarget {
            state: state.to_string(),
            outcome: outcome.clone(),
            target: target.to_string(),
        }),
    }
}

fn check_remappings(draft: &Draft<'_>, checks: &mut Vec<Check>) {
    for entry in draft.entries {
        let declared = entry.node.interface();
        let unused = entry
            .remapping
            .mapped_inputs()
            .filter(|key| declared.input_key(key).is_none())
            .chain(
                entry
                    .remapping
                    .mapped_outputs()
                    .filter(|key| declared.output_key(key).is_none()),
            );
        for key in unused {
            checks.push(Validation::fail(AssemblyError::UnusedRemapping {
                state: entry.name.clone(),
                key: key.to_string(),
            }));
        }
    }
}

/// Every required input must come from the machine's inputs or from another
/// state's output; every required machine output must be produced by a state
/// or passed through from a machine input.
fn check_data_flow(draft: &Draft<'_>, checks: &mut Vec<Check>) {
    let produced: Vec<(&str, &str)> = draft
        .entries
        .iter()
        .flat_map(|entry| {
            entry
                .node
                .interface()
                .outputs()
                .iter()
                .map(move |spec| (entry.name.as_str(), entry.remapping.output_key(&spec.name)))
        })
        .collect();

    for entry in draft.entries {
        let required = entry.node.interface().inputs().iter().filter(|spec| !spec.optional);
        for spec in required {
            let key = entry.remapping.input_key(&spec.name);
            let satisfied = draft.interface.input_key(key).is_some()
                || produced
                    .iter()
                    .any(|&(producer, output)| output == key && producer != entry.name);
            checks.push(ensure(satisfied, || AssemblyError::UnsatisfiedInput {
                state: entry.name.clone(),
                key: key.to_string(),
            }));
        }
    }

    for spec in draft.interface.outputs().iter().filter(|spec| !spec.optional) {
        let satisfied = draft.interface.input_key(&spec.name).is_some()
            || produced.iter().any(|&(_, output)| output == spec.name);
        checks.push(ensure(satisfied, || AssemblyError::UnproducedOutput {
            key: spec.name.clone(),
        }));
    }
}

/// One machine-level key must carry one value kind everywhere it is declared.
fn check_kinds(draft: &Draft<'_>, checks: &mut Vec<Check>) {
    let machine = draft
        .interface
        .inputs()
        .iter()
        .chain(draft.interface.outputs())
        .map(|spec| (spec.name.as_str(), spec.kind));
    let children = draft.entries.iter().flat_map(|entry| {
        let declared = entry.node.interface();
        declared
            .inputs()
            .iter()
            .map(move |spec| (entry.remapping.input_key(&spec.name), spec.kind))
            .chain(
                declared
                    .outputs()
                    .iter()
                    .map(move |spec| (entry.remapping.output_key(&spec.name), spec.kind)),
            )
    });

    let mut kinds: BTreeMap<&str, ValueKind> = BTreeMap::new();
    let mut conflicting = BTreeSet::new();
    for (key, kind) in machine.chain(children) {
        match kinds.get(key) {
            Some(&first) if first != kind && conflicting.insert(key) => {
                checks.push(Validation::fail(AssemblyError::KindConflict {
                    key: key.to_string(),
                    first,
                    second: kind,
                }));
            }
            Some(_) => {}
            None => {
                kinds.insert(key, kind);
            }
        }
    }
}

fn check_reachability(draft: &Draft<'_>, table: &TransitionTable, checks: &mut Vec<Check>) {
    let Some(initial) = draft.initial else {
        return;
    };
    if !draft.entries.iter().any(|entry| entry.name == initial) {
        return;
    }

    let mut reached = HashSet::from([initial]);
    let mut frontier = VecDeque::from([initial]);
    while let Some(state) = frontier.pop_front() {
        for (_, target) in table.from_state(state) {
            if let Target::State(next) = target {
                if reached.insert(next.as_str()) {
                    frontier.push_back(next.as_str());
                }
            }
        }
    }

    for entry in draft.entries {
        checks.push(ensure(reached.contains(entry.name.as_str()), || {
            AssemblyError::UnreachableState {
                state: entry.name.clone(),
            }
        }));
    }
}
