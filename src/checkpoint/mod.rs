//! Diagnostic snapshots of a task.
//!
//! A snapshot captures what a task looked like when it ended: its context,
//! the full transition history, the active state path if it was preempted
//! and the error if it aborted. Snapshots are for inspection only; a task
//! is never resumed from one.

use crate::core::{Context, ExecutionHistory, Outcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod error;

pub use error::SnapshotError;

/// Version identifier for snapshot format
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable record of a finished task.
///
/// # Example
///
/// ```rust
/// use taskgraph::checkpoint::Snapshot;
/// use taskgraph::core::{Context, ExecutionHistory, Pose};
/// use uuid::Uuid;
///
/// let context = Context::new().with("cavity_pose", Pose::new("/base_link"));
/// let snapshot = Snapshot::new(Uuid::new_v4(), context, ExecutionHistory::new());
///
/// let json = snapshot.to_json().unwrap();
/// let restored = Snapshot::from_json(&json).unwrap();
/// assert_eq!(restored, snapshot);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot format version
    pub version: u32,

    /// Task identifier
    pub id: Uuid,

    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,

    /// Top-level context at the end of the task
    pub context: Context,

    /// Every resolved transition, in order
    pub history: ExecutionHistory,

    /// Top-level outcome, if the machine exited
    pub outcome: Option<Outcome>,

    /// Active state path of every machine on the stack, if preempted
    pub active: Vec<String>,

    /// Rendered fatal error, if the task aborted on one
    pub error: Option<String>,
}

impl Snapshot {
    pub fn new(id: Uuid, context: Context, history: ExecutionHistory) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            id,
            timestamp: Utc::now(),
            context,
            history,
            outcome: None,
            active: Vec::new(),
            error: None,
        }
    }

    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn with_active(mut self, active: Vec<String>) -> Self {
        self.active = active;
        self
    }

    pub fn with_error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(json)?;
        snapshot.check_version()
    }

    /// Compact binary encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let snapshot: Self = bincode::deserialize(bytes)?;
        snapshot.check_version()
    }

    fn check_version(self) -> Result<Self, SnapshotError> {
        if self.version == SNAPSHOT_VERSION {
            Ok(self)
        } else {
            Err(SnapshotError::UnsupportedVersion {
                found: self.version,
                supported: SNAPSHOT_VERSION,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ObjectHandle, Pose, StepRecord, TaskItem, Target};

    fn sample() -> Snapshot {
        let context = Context::new()
            .with("task_list", vec![TaskItem::new("M20_100", "PLATFORM_LEFT", "PP01")])
            .with(
                "rear_platform_occupied_poses",
                vec![Pose::named("platform_left", "/base_link").at([0.1, 0.2, 0.3])],
            )
            .with("last_grasped_obj", ObjectHandle::new("M20_100"));
        let mut history = ExecutionHistory::new();
        history.push(StepRecord {
            machine: "PLACE_IN_HOLES".to_string(),
            state: "MOVE_BASE_RELATIVE".to_string(),
            outcome: Outcome::TIMEOUT,
            target: Target::State("MOVE_BASE_RELATIVE".to_string()),
            timestamp: Utc::now(),
            attempt: 1,
        });

        Snapshot::new(Uuid::new_v4(), context, history)
            .with_active(vec!["PLACE_IN_HOLES/MOVE_BASE_RELATIVE".to_string()])
    }

    #[test]
    fn json_round_trip_preserves_snapshot() {
        let snapshot = sample();
        let restored = Snapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn binary_round_trip_preserves_snapshot() {
        let snapshot = sample().with_outcome(Outcome::FAILED).with_error("boom");
        let restored = Snapshot::from_bytes(&snapshot.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn unknown_version_is_rejected() {
        let mut snapshot = sample();
        snapshot.version = SNAPSHOT_VERSION + 1;

        let err = Snapshot::from_json(&snapshot.to_json().unwrap()).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::UnsupportedVersion { found, .. } if found == SNAPSHOT_VERSION + 1
        ));
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(matches!(
            Snapshot::from_json("{not json"),
            Err(SnapshotError::Json(_))
        ));
        assert!(matches!(
            Snapshot::from_bytes(&[1, 2, 3]),
            Err(SnapshotError::Binary(_))
        ));
    }
}
