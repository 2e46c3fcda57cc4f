//! Leaf state delegating to an external action server.

use super::client::{ActionClient, ActionError, Goal, GoalId, GoalResult, GoalStatus};
use crate::core::{Context, Interface, KeySpec, Outcome, Preemption, State, StateError, ValueKind};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Deadline applied when a builder does not set one.
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(30);

type GoalFn = Arc<dyn Fn(&Context) -> Result<serde_json::Value, StateError> + Send + Sync>;
type ResultFn =
    Arc<dyn Fn(&serde_json::Value, &mut Context) -> Result<Outcome, StateError> + Send + Sync>;

/// How the goal exchange of one execution ended.
enum Exchange {
    Finished(Result<GoalResult, ActionError>),
    Elapsed,
    Preempted,
}

/// Leaf state that sends one goal and waits for its terminal result.
///
/// - server succeeded: the result handler runs, writes outputs and picks
///   the outcome (`succeeded` by default)
/// - server aborted or preempted the goal: the failure outcome (`failed`
///   by default)
/// - deadline elapsed: the goal is cancelled, outcome `timeout`
/// - task preempted: the goal is cancelled, [`StateError::Preempted`]
/// - transport failure while waiting: the goal is cancelled and the error
///   is returned
///
/// The deadline and preemption cover sending as well as waiting, so a
/// server that never accepts the goal cannot stall the task.
///
/// # Example
///
/// ```rust
/// use taskgraph::action::{ActionClient, ActionState};
/// use serde_json::json;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// fn move_arm(client: Arc<dyn ActionClient>) -> ActionState {
///     ActionState::builder("arm_controller", client)
///         .timeout(Duration::from_secs(15))
///         .goal(|_| Ok(json!({ "target": "pre_grasp" })))
///         .build()
/// }
/// ```
pub struct ActionState {
    interface: Interface,
    server: String,
    client: Arc<dyn ActionClient>,
    timeout: Duration,
    goal: GoalFn,
    on_success: ResultFn,
    failure: Outcome,
}

impl ActionState {
    pub fn builder(server: impl Into<String>, client: Arc<dyn ActionClient>) -> ActionStateBuilder {
        ActionStateBuilder::new(server, client)
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Cancel `goal` if the server accepted one. A goal still being sent
    /// has no id yet and is simply dropped.
    async fn cancel(&self, goal: Option<&GoalId>, reason: &str) {
        let Some(goal) = goal else {
            debug!(server = %self.server, reason, "no accepted goal to cancel");
            return;
        };
        match self.client.cancel_goal(goal).await {
            Ok(()) => debug!(server = %self.server, %goal, reason, "goal cancelled"),
            Err(err) => warn!(server = %self.server, %goal, reason, error = %err, "cancel request failed"),
        }
    }
}

impl fmt::Debug for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionState")
            .field("server", &self.server)
            .field("timeout", &self.timeout)
            .field("failure", &self.failure)
            .field("interface", &self.interface)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl State for ActionState {
    fn interface(&self) -> &Interface {
        &self.interface
    }

    async fn execute(
        &self,
        context: &mut Context,
        preemption: &Preemption,
    ) -> Result<Outcome, StateError> {
        let payload = (self.goal)(context)?;
        if preemption.is_requested() {
            return Err(StateError::Preempted);
        }

        // Set once the server accepted the goal; only accepted goals are cancelled.
        let mut accepted = None;
        let exchange = {
            let send_and_wait = async {
                let goal = self
                    .client
                    .send_goal(Goal::new(self.server.clone(), payload))
                    .await?;
                debug!(server = %self.server, %goal, timeout = ?self.timeout, "goal sent");
                accepted = Some(goal);
                self.client.wait_for_result(&goal).await
            };
            tokio::select! {
                biased;
                _ = preemption.requested() => Exchange::Preempted,
                waited = tokio::time::timeout(self.timeout, send_and_wait) => match waited {
                    Ok(result) => Exchange::Finished(result),
                    Err(_elapsed) => Exchange::Elapsed,
                },
            }
        };

        let result = match exchange {
            Exchange::Finished(Ok(result)) => result,
            Exchange::Finished(Err(err)) => {
                self.cancel(accepted.as_ref(), "transport error").await;
                return Err(err.into());
            }
            Exchange::Preempted => {
                self.cancel(accepted.as_ref(), "preempted").await;
                return Err(StateError::Preempted);
            }
            Exchange::Elapsed => {
                warn!(server = %self.server, timeout = ?self.timeout, accepted = accepted.is_some(), "goal timed out");
                self.cancel(accepted.as_ref(), "timeout").await;
                return Ok(Outcome::TIMEOUT);
            }
        };

        match result.status {
            GoalStatus::Succeeded => (self.on_success)(&result.payload, context),
            GoalStatus::Aborted | GoalStatus::Preempted => {
                info!(server = %self.server, goal = ?accepted, status = ?result.status, "goal did not succeed");
                Ok(self.failure.clone())
            }
        }
    }
}

/// Builder for [`ActionState`].
pub struct ActionStateBuilder {
    server: String,
    client: Arc<dyn ActionClient>,
    timeout: Duration,
    outcomes: Vec<Outcome>,
    partial: Vec<Outcome>,
    failure: Outcome,
    inputs: Vec<KeySpec>,
    outputs: Vec<KeySpec>,
    goal: Option<GoalFn>,
    on_success: Option<ResultFn>,
}

impl ActionStateBuilder {
    pub fn new(server: impl Into<String>, client: Arc<dyn ActionClient>) -> Self {
        Self {
            server: server.into(),
            client,
            timeout: DEFAULT_ACTION_TIMEOUT,
            outcomes: Vec::new(),
            partial: Vec::new(),
            failure: Outcome::FAILED,
            inputs: Vec::new(),
            outputs: Vec::new(),
            goal: None,
            on_success: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn input(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.inputs.push(KeySpec::required(name, kind));
        self
    }

    pub fn optional_input(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.inputs.push(KeySpec::optional(name, kind));
        self
    }

    pub fn output(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.outputs.push(KeySpec::required(name, kind));
        self
    }

    /// Additional outcomes the result handler may return.
    pub fn outcome(mut self, outcome: impl Into<Outcome>) -> Self {
        self.outcomes.push(outcome.into());
        self
    }

    /// Additional partial outcomes the result handler may return.
    pub fn partial_outcome(mut self, outcome: impl Into<Outcome>) -> Self {
        self.partial.push(outcome.into());
        self
    }

    /// Outcome reported when the server aborts or preempts the goal.
    pub fn failure_outcome(mut self, outcome: impl Into<Outcome>) -> Self {
        self.failure = outcome.into();
        self
    }

    /// Build the goal payload from the context. Defaults to `null`.
    pub fn goal<F>(mut self, goal: F) -> Self
    where
        F: Fn(&Context) -> Result<serde_json::Value, StateError> + Send + Sync + 'static,
    {
        self.goal = Some(Arc::new(goal));
        self
    }

    /// Handle a successful result. Defaults to returning `succeeded`.
    pub fn on_success<F>(mut self, handler: F) -> Self
    where
        F: Fn(&serde_json::Value, &mut Context) -> Result<Outcome, StateError>
            + Send
            + Sync
            + 'static,
    {
        self.on_success = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> ActionState {
        let mut interface = Interface::new(std::iter::once(Outcome::SUCCEEDED).chain(self.outcomes))
            .partial_outcomes([self.failure.clone(), Outcome::TIMEOUT])
            .partial_outcomes(self.partial);
        for spec in self.inputs {
            interface = interface.input_spec(spec);
        }
        for spec in self.outputs {
            interface = interface.output_spec(spec);
        }

        ActionState {
            interface,
            server: self.server,
            client: self.client,
            timeout: self.timeout,
            goal: self
                .goal
                .unwrap_or_else(|| Arc::new(|_| Ok(serde_json::Value::Null))),
            on_success: self
                .on_success
                .unwrap_or_else(|| Arc::new(|_, _| Ok(Outcome::SUCCEEDED))),
            failure: self.failure,
        }
    }
}

/// Deserialize `field` of a result payload.
pub fn payload_field<T: DeserializeOwned>(
    server: &str,
    payload: &serde_json::Value,
    field: &str,
) -> Result<T, StateError> {
    let value = payload
        .get(field)
        .ok_or_else(|| StateError::InvalidPayload {
            server: server.to_string(),
            reason: format!("missing field '{field}'"),
        })?;
    serde_json::from_value(value.clone()).map_err(|err| StateError::InvalidPayload {
        server: server.to_string(),
        reason: format!("field '{field}': {err}"),
    })
}
