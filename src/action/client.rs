//! Goal/result protocol spoken with external action servers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// A goal addressed to a named action server.
///
/// The payload schema belongs to the server; the engine only forwards it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub server: String,
    pub payload: serde_json::Value,
}

impl Goal {
    pub fn new(server: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            server: server.into(),
            payload,
        }
    }
}

/// Identifier of an outstanding goal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GoalId(Uuid);

impl GoalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GoalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GoalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal status reported by an action server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalStatus {
    Succeeded,
    Aborted,
    /// The server preempted the goal on its own.
    Preempted,
}

/// Terminal notification for a goal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GoalResult {
    pub status: GoalStatus,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl GoalResult {
    pub fn succeeded(payload: serde_json::Value) -> Self {
        Self {
            status: GoalStatus::Succeeded,
            payload,
        }
    }

    pub fn aborted() -> Self {
        Self {
            status: GoalStatus::Aborted,
            payload: serde_json::Value::Null,
        }
    }
}

/// Transport-level failures talking to an action server.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ActionError {
    #[error("Action server '{server}' is not available")]
    ServerUnavailable { server: String },

    #[error("Goal rejected by '{server}': {reason}")]
    Rejected { server: String, reason: String },

    #[error("Unknown goal {goal}")]
    UnknownGoal { goal: GoalId },

    #[error("Transport failure: {0}")]
    Transport(String),
}

/// Client side of the action protocol.
///
/// One client may front several servers; goals are routed by
/// [`Goal::server`].
#[async_trait]
pub trait ActionClient: Send + Sync {
    /// Submit a goal. Returns once the server accepted it.
    async fn send_goal(&self, goal: Goal) -> Result<GoalId, ActionError>;

    /// Wait for the terminal result of an accepted goal.
    async fn wait_for_result(&self, goal: &GoalId) -> Result<GoalResult, ActionError>;

    /// Ask the server to cancel an outstanding goal. Best effort.
    async fn cancel_goal(&self, goal: &GoalId) -> Result<(), ActionError>;
}
