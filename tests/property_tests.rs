//! Property-based tests for assembly and execution.
//!
//! These tests use proptest to verify properties hold across
//! many randomly generated machines and inputs.

use proptest::prelude::*;
use taskgraph::builder::{AssemblyError, StateEntry};
use taskgraph::core::{Context, FnState, Interface, Outcome, Pose, ValueKind};
use taskgraph::executor::{ExecutionError, Executor, RunResult, StateMachine};

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

fn outcome_name(index: usize) -> String {
    format!("outcome_{index}")
}

fn state_name(index: usize) -> String {
    format!("STATE_{index}")
}

/// Per state: routing of each declared outcome, as an index into the states
/// or `states.len()` for the machine outcome.
fn arbitrary_routing() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..6usize).prop_flat_map(|states| {
        prop::collection::vec(prop::collection::vec(0..=states, 1..4), states)
    })
}

fn assemble(routing: &[Vec<usize>], skip: Option<(usize, usize)>) -> Result<StateMachine, taskgraph::builder::BuildError> {
    let mut builder = StateMachine::builder(["done"]).reject_unreachable(false);
    for (state, targets) in routing.iter().enumerate() {
        let outcomes: Vec<Outcome> = (0..targets.len()).map(|i| Outcome::from(outcome_name(i))).collect();
        let mut entry = StateEntry::leaf(
            state_name(state),
            FnState::new(Interface::new(outcomes), |_| Ok(Outcome::from("outcome_0"))),
        );
        for (index, &target) in targets.iter().enumerate() {
            if skip == Some((state, index)) {
                continue;
            }
            let target = if target == routing.len() {
                "done".to_string()
            } else {
                state_name(target)
            };
            entry = entry.on(outcome_name(index), target);
        }
        builder = builder.state(entry);
    }
    builder.build()
}

proptest! {
    #[test]
    fn fully_routed_machines_assemble(routing in arbitrary_routing()) {
        let machine = assemble(&routing, None);
        prop_assert!(machine.is_ok());

        let machine = machine.unwrap();
        let declared: usize = routing.iter().map(Vec::len).sum();
        prop_assert_eq!(machine.transitions().len(), declared);
    }

    #[test]
    fn unrouted_outcome_is_rejected(
        routing in arbitrary_routing(),
        pick in any::<prop::sample::Index>(),
    ) {
        let state = pick.index(routing.len());
        let outcome = pick.index(routing[state].len());

        let err = assemble(&routing, Some((state, outcome))).unwrap_err();
        let expected = AssemblyError::MissingTransition {
            state: state_name(state),
            outcome: Outcome::from(outcome_name(outcome)),
        };
        prop_assert!(err.errors().contains(&expected));
    }

    #[test]
    fn retry_runs_state_failures_plus_one_times(failures in 0..25i64) {
        let retry = FnState::new(
            Interface::new(["succeeded", "failed"]).input_output("attempts", ValueKind::Integer),
            move |context| {
                let attempts = *context.integer("attempts")? + 1;
                context.set("attempts", attempts)?;
                if attempts <= failures {
                    Ok(Outcome::FAILED)
                } else {
                    Ok(Outcome::SUCCEEDED)
                }
            },
        );
        let machine = StateMachine::builder(["succeeded"])
            .input_output("attempts", ValueKind::Integer)
            .state(
                StateEntry::leaf("MOVE_BASE_RELATIVE", retry)
                    .on("succeeded", "succeeded")
                    .on("failed", "MOVE_BASE_RELATIVE"),
            )
            .build()
            .unwrap();

        let mut context = Context::new().with("attempts", 0_i64);
        let execution = block_on(Executor::default().run(&machine, &mut context)).unwrap();

        prop_assert_eq!(execution.result, RunResult::Completed(Outcome::SUCCEEDED));
        prop_assert_eq!(*context.integer("attempts").unwrap(), failures + 1);
        prop_assert_eq!(execution.history.executions_of("MOVE_BASE_RELATIVE") as i64, failures + 1);
        prop_assert_eq!(execution.history.last().unwrap().attempt as i64, failures + 1);
        let retries = execution.history.steps().iter().filter(|step| step.is_retry()).count();
        prop_assert_eq!(retries as i64, failures);
    }

    #[test]
    fn undeclared_outcome_is_fatal(label in "[a-z_]{1,12}") {
        prop_assume!(label != "succeeded");
        let returned = label.clone();
        let rogue = FnState::new(Interface::new(["succeeded"]), move |_| {
            Ok(Outcome::from(returned.clone()))
        });
        let machine = StateMachine::builder(["succeeded"])
            .state(StateEntry::leaf("ROGUE", rogue).on("succeeded", "succeeded"))
            .build()
            .unwrap();

        let err = block_on(Executor::default().run(&machine, &mut Context::new())).unwrap_err();
        let is_undeclared = matches!(
            err,
            ExecutionError::UndeclaredOutcome { ref outcome, .. } if outcome.as_str() == label
        );
        prop_assert!(is_undeclared);
    }

    #[test]
    fn remapped_output_only_touches_mapped_key(
        child in "[a-z]{1,8}",
        parent in "[A-Z]{1,8}",
        x in -10.0f64..10.0,
    ) {
        let key = child.clone();
        let writer = FnState::new(
            Interface::new(["succeeded"]).output(child.clone(), ValueKind::Pose),
            move |context| {
                context.set(key.clone(), Pose::new("/base_link").at([x, 0.0, 0.0]))?;
                Ok(Outcome::SUCCEEDED)
            },
        );
        let machine = StateMachine::builder(["succeeded"])
            .input(child.clone(), ValueKind::Text)
            .output(parent.clone(), ValueKind::Pose)
            .state(
                StateEntry::leaf("WRITE", writer)
                    .on("succeeded", "succeeded")
                    .remap_output(child.clone(), parent.clone()),
            )
            .build()
            .unwrap();

        let mut context = Context::new().with(child.clone(), "untouched");
        block_on(Executor::default().run(&machine, &mut context)).unwrap();

        prop_assert_eq!(context.pose(&parent).unwrap().position[0], x);
        prop_assert_eq!(context.text(&child).unwrap(), "untouched");
    }
}
