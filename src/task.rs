//! Task entry: request parameters in, terminal status and diagnostics out.

use crate::checkpoint::Snapshot;
use crate::config::TaskSection;
use crate::core::{Context, ExecutionHistory, Outcome, Preemption};
use crate::executor::{Executor, RunResult, StateMachine};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

/// One request parameter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A high-level command with its parameters.
///
/// # Example
///
/// ```rust
/// use taskgraph::core::Context;
/// use taskgraph::task::TaskRequest;
///
/// let context = TaskRequest::new()
///     .parameter("location", "ws01")
///     .apply(Context::new());
///
/// assert_eq!(context.text("location").unwrap(), "WS01");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub parameters: Vec<KeyValue>,
}

impl TaskRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push(KeyValue::new(key, value));
        self
    }

    /// Write every parameter into `context` as upper-cased text under its
    /// lower-cased key.
    pub fn apply(self, mut context: Context) -> Context {
        for KeyValue { key, value } in self.parameters {
            context = context.with(key.to_lowercase(), value.to_uppercase());
        }
        context
    }
}

/// Terminal status of a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// The machine exited with a success outcome.
    Succeeded,
    /// The machine exited with any other outcome, or a fatal error occurred.
    Aborted,
    /// The caller cancelled the task.
    Preempted,
    /// The task deadline expired before the machine exited.
    Unfinished,
}

/// What a finished task reports back.
#[derive(Clone, Debug, PartialEq)]
pub struct TaskResult {
    pub id: Uuid,
    pub status: TaskStatus,
    pub outcome: Option<Outcome>,
    pub snapshot: Snapshot,
}

/// Runs one machine per request.
#[derive(Debug)]
pub struct TaskRunner {
    machine: StateMachine,
    deadline: Option<Duration>,
    success: Vec<Outcome>,
}

impl TaskRunner {
    pub fn new(machine: StateMachine) -> Self {
        Self {
            machine,
            deadline: None,
            success: vec![Outcome::SUCCEEDED],
        }
    }

    /// Take deadline and success outcomes from a `[task]` config section.
    pub fn configured(machine: StateMachine, config: &TaskSection) -> Self {
        Self {
            machine,
            deadline: config.deadline(),
            success: config.success_outcomes(),
        }
    }

    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn success_outcomes<I, O>(mut self, outcomes: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<Outcome>,
    {
        self.success = outcomes.into_iter().map(Into::into).collect();
        self
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    /// Run the machine for `request` on top of `context`.
    ///
    /// Never fails: fatal errors are reported as [`TaskStatus::Aborted`]
    /// with the error recorded in the snapshot.
    pub async fn run(
        &self,
        request: TaskRequest,
        context: Context,
        preemption: &Preemption,
    ) -> TaskResult {
        let id = Uuid::new_v4();
        let span = tracing::info_span!("task", %id, machine = self.machine.label());
        self.run_task(id, request.apply(context), preemption)
            .instrument(span)
            .await
    }

    async fn run_task(&self, id: Uuid, mut context: Context, preemption: &Preemption) -> TaskResult {
        let preemption = preemption.child();
        let executor = Executor::new(preemption.clone());
        let mut history = ExecutionHistory::new();
        let mut expired = false;

        info!(deadline = ?self.deadline, "task started");
        let result = {
            let run = executor.run_with_history(&self.machine, &mut context, &mut history);
            tokio::pin!(run);
            match self.deadline {
                Some(deadline) => tokio::select! {
                    result = &mut run => result,
                    _ = tokio::time::sleep(deadline) => {
                        warn!(?deadline, "task deadline expired");
                        expired = true;
                        preemption.request();
                        run.await
                    }
                },
                None => run.await,
            }
        };

        let snapshot = Snapshot::new(id, context, history);
        let (status, outcome, snapshot) = match result {
            Ok(RunResult::Completed(outcome)) => {
                let status = if self.success.contains(&outcome) {
                    TaskStatus::Succeeded
                } else {
                    TaskStatus::Aborted
                };
                (status, Some(outcome.clone()), snapshot.with_outcome(outcome))
            }
            Ok(RunResult::Preempted { active }) => {
                let status = if expired {
                    TaskStatus::Unfinished
                } else {
                    TaskStatus::Preempted
                };
                (status, None, snapshot.with_active(active))
            }
            Err(err) => {
                warn!(state = err.state(), error = %err, "task aborted");
                (TaskStatus::Aborted, None, snapshot.with_error(err))
            }
        };

        info!(?status, outcome = ?outcome, steps = snapshot.history.len(), "task finished");
        TaskResult {
            id,
            status,
            outcome,
            snapshot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_become_upper_cased_text() {
        let context = TaskRequest::new()
            .parameter("location", "pp01")
            .parameter("object", "M20_100")
            .apply(Context::new().with("task_list", Vec::<crate::core::TaskItem>::new()));

        assert_eq!(context.text("location").unwrap(), "PP01");
        assert_eq!(context.text("object").unwrap(), "M20_100");
        assert!(context.has("task_list"));
    }

    #[test]
    fn parameter_keys_are_lower_cased() {
        let context = TaskRequest::new()
            .parameter("Location", "ws03")
            .apply(Context::new());

        assert_eq!(context.text("location").unwrap(), "WS03");
        assert!(!context.has("Location"));
    }

    #[test]
    fn configured_runner_takes_task_section() {
        let machine = crate::executor::StateMachine::builder(["succeeded"])
            .state(
                crate::builder::StateEntry::leaf(
                    "NOOP",
                    crate::core::FnState::new(crate::core::Interface::new(["succeeded"]), |_| {
                        Ok(Outcome::SUCCEEDED)
                    }),
                )
                .on("succeeded", "succeeded"),
            )
            .build()
            .unwrap();
        let section = TaskSection {
            deadline_secs: Some(2.5),
            success_outcomes: vec!["succeeded".to_string(), "no_object_for_ppt_platform".to_string()],
        };

        let runner = TaskRunner::configured(machine, &section);
        assert_eq!(runner.deadline, Some(Duration::from_millis(2500)));
        assert_eq!(runner.success.len(), 2);
    }
}
