//! Execution history of a task.
//!
//! Every resolved transition is recorded, including self-transitions, so a
//! finished or aborted task can be inspected step by step.

use super::outcome::Outcome;
use super::transition::Target;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Record of one resolved transition.
///
/// # Example
///
/// ```rust
/// use taskgraph::core::{Outcome, StepRecord, Target};
/// use chrono::Utc;
///
/// let step = StepRecord {
///     machine: "PLACE_IN_HOLES".to_string(),
///     state: "MOVE_BASE_RELATIVE".to_string(),
///     outcome: Outcome::TIMEOUT,
///     target: Target::State("MOVE_BASE_RELATIVE".to_string()),
///     timestamp: Utc::now(),
///     attempt: 2,
/// };
/// assert!(step.is_retry());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Path of the machine owning the state, outermost first, `/` separated.
    pub machine: String,
    /// The state that produced the outcome.
    pub state: String,
    pub outcome: Outcome,
    pub target: Target,
    /// When the transition was resolved
    pub timestamp: DateTime<Utc>,
    /// Consecutive executions of `state`, 1 on first entry
    pub attempt: usize,
}

impl StepRecord {
    /// True when the transition re-enters the same state.
    pub fn is_retry(&self) -> bool {
        matches!(&self.target, Target::State(next) if *next == self.state)
    }
}

/// Ordered history of resolved transitions.
///
/// # Example
///
/// ```rust
/// use taskgraph::core::{ExecutionHistory, Outcome, StepRecord, Target};
/// use chrono::Utc;
///
/// let mut history = ExecutionHistory::new();
/// history.push(StepRecord {
///     machine: "root".to_string(),
///     state: "LOOK_AT_WORKSPACE".to_string(),
///     outcome: Outcome::SUCCEEDED,
///     target: Target::State("FIND_CAVITIES".to_string()),
///     timestamp: Utc::now(),
///     attempt: 1,
/// });
///
/// assert_eq!(history.get_path(), ["LOOK_AT_WORKSPACE"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionHistory {
    steps: Vec<StepRecord>,
}

impl ExecutionHistory {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn push(&mut self, step: StepRecord) {
        self.steps.push(step);
    }

    /// Names of executed states in order, one entry per execution.
    pub fn get_path(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.state.as_str()).collect()
    }

    /// Number of times `state` produced an outcome.
    pub fn executions_of(&self, state: &str) -> usize {
        self.steps.iter().filter(|step| step.state == state).count()
    }

    /// Elapsed time between the first and last recorded transition.
    ///
    /// Returns `None` if nothing has been recorded.
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(first), Some(last)) = (self.steps.first(), self.steps.last()) {
            let duration = last.timestamp.signed_duration_since(first.timestamp);
            duration.to_std().ok()
        } else {
            None
        }
    }

    pub fn last(&self) -> Option<&StepRecord> {
        self.steps.last()
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
