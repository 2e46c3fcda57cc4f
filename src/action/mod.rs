//! Delegation of leaf work to external action servers.
//!
//! Perception, manipulation and navigation primitives are long-running
//! operations owned by other processes. They are reached through the
//! [`ActionClient`] trait: send a goal, wait for a terminal result, cancel
//! on timeout or preemption. [`ActionState`] wraps that exchange as a leaf
//! state.

mod client;
mod state;

pub use client::{ActionClient, ActionError, Goal, GoalId, GoalResult, GoalStatus};
pub use state::{payload_field, ActionState, ActionStateBuilder, DEFAULT_ACTION_TIMEOUT};
