//! Task-level runs: statuses, deadlines, preemption and diagnostics.

use std::sync::Arc;
use std::time::Duration;
use taskgraph::action::{ActionClient, ActionError, ActionState, Goal, GoalId, GoalResult};
use taskgraph::builder::StateEntry;
use taskgraph::checkpoint::Snapshot;
use taskgraph::config::EngineConfig;
use taskgraph::core::{Context, FnState, Interface, Outcome, Preemption, State, StateError, ValueKind};
use taskgraph::executor::StateMachine;
use taskgraph::task::{TaskRequest, TaskRunner, TaskStatus};
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Leaf that waits until preempted, signalling once it has started.
struct WaitForever {
    interface: Interface,
    started: Arc<Notify>,
}

#[async_trait::async_trait]
impl State for WaitForever {
    fn interface(&self) -> &Interface {
        &self.interface
    }

    async fn execute(&self, _context: &mut Context, preemption: &Preemption) -> Result<Outcome, StateError> {
        self.started.notify_one();
        preemption.requested().await;
        Err(StateError::Preempted)
    }
}

/// Action server that never accepts a goal.
struct Unreachable;

#[async_trait::async_trait]
impl ActionClient for Unreachable {
    async fn send_goal(&self, _goal: Goal) -> Result<GoalId, ActionError> {
        std::future::pending().await
    }

    async fn wait_for_result(&self, goal: &GoalId) -> Result<GoalResult, ActionError> {
        Err(ActionError::UnknownGoal { goal: *goal })
    }

    async fn cancel_goal(&self, goal: &GoalId) -> Result<(), ActionError> {
        Err(ActionError::UnknownGoal { goal: *goal })
    }
}

fn returning(outcome: &'static str) -> StateMachine {
    StateMachine::builder(["succeeded", "no_object_for_ppt_platform"])
        .input("location", ValueKind::Text)
        .state(
            StateEntry::leaf(
                "SELECT_OBJECTS_TO_PLACE",
                FnState::new(
                    Interface::new(["succeeded", "no_object_for_ppt_platform"])
                        .input("location", ValueKind::Text),
                    move |_| Ok(Outcome::from(outcome)),
                ),
            )
            .on("succeeded", "succeeded")
            .on("no_object_for_ppt_platform", "no_object_for_ppt_platform"),
        )
        .build()
        .unwrap()
}

fn waiting(started: Arc<Notify>) -> StateMachine {
    StateMachine::builder(["succeeded"])
        .state(
            StateEntry::leaf(
                "MOVE_ARM",
                WaitForever {
                    interface: Interface::new(["succeeded"]),
                    started,
                },
            )
            .on("succeeded", "succeeded"),
        )
        .build()
        .unwrap()
}

fn request() -> TaskRequest {
    TaskRequest::new().parameter("location", "pp01")
}

#[tokio::test]
async fn success_outcome_reports_succeeded() {
    init_tracing();
    let runner = TaskRunner::new(returning("succeeded"));

    let result = runner.run(request(), Context::new(), &Preemption::new()).await;

    assert_eq!(result.status, TaskStatus::Succeeded);
    assert_eq!(result.outcome, Some(Outcome::SUCCEEDED));
    assert_eq!(result.snapshot.id, result.id);
    assert_eq!(result.snapshot.history.get_path(), vec!["SELECT_OBJECTS_TO_PLACE"]);
    assert_eq!(result.snapshot.context.text("location").unwrap(), "PP01");
}

#[tokio::test]
async fn other_outcome_reports_aborted() {
    init_tracing();
    let runner = TaskRunner::new(returning("no_object_for_ppt_platform"));

    let result = runner.run(request(), Context::new(), &Preemption::new()).await;

    assert_eq!(result.status, TaskStatus::Aborted);
    assert_eq!(result.outcome, Some(Outcome::from("no_object_for_ppt_platform")));
    assert!(result.snapshot.error.is_none());
}

#[tokio::test]
async fn configured_success_outcomes_are_honoured() {
    init_tracing();
    let config = EngineConfig::from_toml_str(
        r#"
        [task]
        success_outcomes = ["succeeded", "no_object_for_ppt_platform"]
        "#,
    )
    .unwrap();
    let runner = TaskRunner::configured(returning("no_object_for_ppt_platform"), &config.task);

    let result = runner.run(request(), Context::new(), &Preemption::new()).await;

    assert_eq!(result.status, TaskStatus::Succeeded);
}

#[tokio::test]
async fn fatal_error_reports_aborted_with_diagnostics() {
    init_tracing();
    let runner = TaskRunner::new(returning("succeeded"));

    let result = runner.run(TaskRequest::new(), Context::new(), &Preemption::new()).await;

    assert_eq!(result.status, TaskStatus::Aborted);
    assert_eq!(result.outcome, None);
    let error = result.snapshot.error.as_deref().unwrap();
    assert!(error.contains("location"));
    assert!(result.snapshot.history.is_empty());
}

#[tokio::test]
async fn deadline_expiry_reports_unfinished() {
    init_tracing();
    let runner = TaskRunner::new(waiting(Arc::new(Notify::new()))).deadline(Duration::from_millis(20));
    let caller = Preemption::new();

    let result = runner.run(TaskRequest::new(), Context::new(), &caller).await;

    assert_eq!(result.status, TaskStatus::Unfinished);
    assert_eq!(result.snapshot.active, vec!["SM/MOVE_ARM".to_string()]);
    assert!(!caller.is_requested());
}

#[tokio::test]
async fn deadline_unwinds_goal_that_is_never_accepted() {
    init_tracing();
    let look = ActionState::builder("arm_controller", Arc::new(Unreachable))
        .timeout(Duration::from_secs(60))
        .build();
    let machine = StateMachine::builder(["succeeded"])
        .label("PLACE_IN_HOLES")
        .state(
            StateEntry::leaf("LOOK_AT_WORKSPACE", look)
                .on("succeeded", "succeeded")
                .on("failed", "LOOK_AT_WORKSPACE")
                .on("timeout", "LOOK_AT_WORKSPACE"),
        )
        .build()
        .unwrap();
    let runner = TaskRunner::new(machine).deadline(Duration::from_millis(50));

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        runner.run(TaskRequest::new(), Context::new(), &Preemption::new()),
    )
    .await
    .expect("task must end once its deadline expires");

    assert_eq!(result.status, TaskStatus::Unfinished);
    assert_eq!(
        result.snapshot.active,
        vec!["PLACE_IN_HOLES/LOOK_AT_WORKSPACE".to_string()]
    );
    assert!(result.snapshot.history.is_empty());
}

#[tokio::test]
async fn external_preemption_reports_preempted() {
    init_tracing();
    let started = Arc::new(Notify::new());
    let runner = TaskRunner::new(waiting(started.clone())).deadline(Duration::from_secs(30));
    let caller = Preemption::new();

    let run = runner.run(TaskRequest::new(), Context::new(), &caller);
    let stop = async {
        started.notified().await;
        caller.request();
    };
    let (result, ()) = tokio::join!(run, stop);

    assert_eq!(result.status, TaskStatus::Preempted);
    assert_eq!(result.outcome, None);
    assert_eq!(result.snapshot.active, vec!["SM/MOVE_ARM".to_string()]);
}

#[tokio::test]
async fn snapshot_of_finished_task_survives_serialization() {
    init_tracing();
    let runner = TaskRunner::new(returning("succeeded"));

    let result = runner.run(request(), Context::new(), &Preemption::new()).await;
    let restored = Snapshot::from_json(&result.snapshot.to_json().unwrap()).unwrap();

    assert_eq!(restored, result.snapshot);
    assert_eq!(restored.outcome, Some(Outcome::SUCCEEDED));
}
