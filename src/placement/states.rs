//! Action-backed leaves of the place-in-holes task.
//!
//! Goal and result payloads exchanged with each server:
//!
//! | server                | goal                                              | result              |
//! |-----------------------|---------------------------------------------------|---------------------|
//! | `planning_scene`      | `{"element", "action"}`                           |                     |
//! | `workspace_adjuster`  | `{"distance"}`                                    |                     |
//! | `arm_controller`      | `{"target"}` or `{"pose"}`                        |                     |
//! | `gripper_controller`  | `{"command"}`                                     |                     |
//! | `cavity_finder`       | `{"frame_id", "objects"}`                         | `{"cavities": [Pose]}` |
//! | `pose_transformer`    | `{"pose", "frame_id"}`                            | `{"pose": Pose}`    |
//! | `base_shift`          | `{"pose", "reference_frame", "camera_frame"}`     | `{"shift": Pose}`   |
//! | `base_relative_mover` | `{"shift"}`                                       |                     |

use super::keys::*;
use super::PlacementConfig;
use crate::action::{payload_field, ActionClient, ActionState, ActionStateBuilder};
use crate::core::{Outcome, Pose, ValueKind};
use serde_json::json;
use std::sync::Arc;

pub const PLANNING_SCENE: &str = "planning_scene";
pub const WORKSPACE_ADJUSTER: &str = "workspace_adjuster";
pub const ARM_CONTROLLER: &str = "arm_controller";
pub const GRIPPER_CONTROLLER: &str = "gripper_controller";
pub const CAVITY_FINDER: &str = "cavity_finder";
pub const POSE_TRANSFORMER: &str = "pose_transformer";
pub const BASE_SHIFT: &str = "base_shift";
pub const BASE_RELATIVE_MOVER: &str = "base_relative_mover";

/// Builds the action leaves against one client and configuration.
pub(crate) struct Leaves<'a> {
    client: Arc<dyn ActionClient>,
    config: &'a PlacementConfig,
}

impl<'a> Leaves<'a> {
    pub(crate) fn new(client: Arc<dyn ActionClient>, config: &'a PlacementConfig) -> Self {
        Self { client, config }
    }

    fn action(&self, server: &str) -> ActionStateBuilder {
        ActionState::builder(server, Arc::clone(&self.client))
            .timeout(self.config.engine.actions.timeout_for(server))
    }

    pub(crate) fn update_planning_scene(&self, element: &str, action: &str) -> ActionState {
        let goal = json!({ "element": element, "action": action });
        self.action(PLANNING_SCENE)
            .goal(move |_| Ok(goal.clone()))
            .build()
    }

    pub(crate) fn adjust_to_workspace(&self) -> ActionState {
        let distance = self.config.workspace_distance;
        self.action(WORKSPACE_ADJUSTER)
            .goal(move |_| Ok(json!({ "distance": distance })))
            .build()
    }

    /// Move the arm to a named configuration.
    pub(crate) fn move_arm(&self, target: &str) -> ActionState {
        let goal = json!({ "target": target });
        self.action(ARM_CONTROLLER)
            .goal(move |_| Ok(goal.clone()))
            .build()
    }

    /// Move the arm to the pose held under `key`.
    pub(crate) fn move_arm_to_pose(&self, key: &'static str) -> ActionState {
        self.action(ARM_CONTROLLER)
            .input(key, ValueKind::Pose)
            .goal(move |context| Ok(json!({ "pose": context.pose(key)? })))
            .build()
    }

    pub(crate) fn control_gripper(&self, command: &str) -> ActionState {
        let goal = json!({ "command": command });
        self.action(GRIPPER_CONTROLLER)
            .goal(move |_| Ok(goal.clone()))
            .build()
    }

    /// Detect cavities for the selected objects. Fewer cavities than objects
    /// yields `not_all_cavities_found`.
    pub(crate) fn find_cavities(&self) -> ActionState {
        let frame_id = self.config.cavity_frame.clone();
        self.action(CAVITY_FINDER)
            .input(SELECTED_OBJECTS, ValueKind::Objects)
            .output(CAVITIES, ValueKind::Poses)
            .partial_outcome(NOT_ALL_CAVITIES_FOUND)
            .goal(move |context| {
                let objects: Vec<&str> = context
                    .objects(SELECTED_OBJECTS)?
                    .iter()
                    .map(|object| object.name.as_str())
                    .collect();
                Ok(json!({ "frame_id": frame_id, "objects": objects }))
            })
            .on_success(|payload, context| {
                let cavities: Vec<Pose> = payload_field(CAVITY_FINDER, payload, "cavities")?;
                let wanted = context.objects(SELECTED_OBJECTS)?.len();
                let found = cavities.len();
                context.set(CAVITIES, cavities)?;
                if found < wanted {
                    Ok(Outcome::from(NOT_ALL_CAVITIES_FOUND))
                } else {
                    Ok(Outcome::SUCCEEDED)
                }
            })
            .build()
    }

    /// Re-express `object_pose` in the reference frame.
    pub(crate) fn transform_pose(&self) -> ActionState {
        let frame_id = self.config.reference_frame.clone();
        self.action(POSE_TRANSFORMER)
            .input(OBJECT_POSE, ValueKind::Pose)
            .output(OBJECT_POSE, ValueKind::Pose)
            .failure_outcome(TF_ERROR)
            .goal(move |context| {
                Ok(json!({ "pose": context.pose(OBJECT_POSE)?, "frame_id": frame_id }))
            })
            .on_success(|payload, context| {
                let pose: Pose = payload_field(POSE_TRANSFORMER, payload, "pose")?;
                context.set(OBJECT_POSE, pose)?;
                Ok(Outcome::SUCCEEDED)
            })
            .build()
    }

    /// Base displacement that brings `object_pose` in front of the camera.
    pub(crate) fn compute_base_shift(&self) -> ActionState {
        let reference_frame = self.config.reference_frame.clone();
        let camera_frame = self.config.camera_frame.clone();
        self.action(BASE_SHIFT)
            .input(OBJECT_POSE, ValueKind::Pose)
            .output(MOVE_BASE_BY, ValueKind::Pose)
            .failure_outcome(TF_ERROR)
            .goal(move |context| {
                Ok(json!({
                    "pose": context.pose(OBJECT_POSE)?,
                    "reference_frame": reference_frame,
                    "camera_frame": camera_frame,
                }))
            })
            .on_success(|payload, context| {
                let shift: Pose = payload_field(BASE_SHIFT, payload, "shift")?;
                context.set(MOVE_BASE_BY, shift)?;
                Ok(Outcome::SUCCEEDED)
            })
            .build()
    }

    pub(crate) fn move_base_relative(&self) -> ActionState {
        self.action(BASE_RELATIVE_MOVER)
            .input(MOVE_BASE_BY, ValueKind::Pose)
            .goal(|context| Ok(json!({ "shift": context.pose(MOVE_BASE_BY)? })))
            .build()
    }
}
