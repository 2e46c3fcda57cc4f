//! The place-in-holes task.
//!
//! Objects carried on the rear platform are placed into the cavities of a
//! precision-placement workspace:
//!
//! 1. prepare the planning scene and line the base up with the workspace
//! 2. select the platform objects meant for this workspace
//! 3. look at the workspace and detect its cavities
//! 4. for each object with a matching cavity: bring the cavity pose into the
//!    base frame, shift the base in front of it, grasp the object from its
//!    platform slot (a nested machine), move over the cavity and release
//!
//! Recoverable failures of arm, gripper and base motions retry the same
//! state. Running out of objects or cavities ends the task with
//! `succeeded`; having nothing for this workspace ends it with
//! `no_object_for_ppt_platform`.

mod grasp;
pub mod keys;
mod select;
mod states;

pub use grasp::find_platform_slot;
pub use select::{match_cavity, objects_for_workspace, select_object_to_place, select_objects_to_place};
pub use states::{
    ARM_CONTROLLER, BASE_RELATIVE_MOVER, BASE_SHIFT, CAVITY_FINDER, GRIPPER_CONTROLLER,
    PLANNING_SCENE, POSE_TRANSFORMER, WORKSPACE_ADJUSTER,
};

use crate::action::ActionClient;
use crate::builder::{BuildError, StateEntry};
use crate::config::EngineConfig;
use crate::core::{Outcome, State, ValueKind};
use crate::executor::StateMachine;
use keys::*;
use serde::{Deserialize, Serialize};
use states::Leaves;
use std::sync::Arc;

/// Label of the place-in-holes machine.
pub const PLACE_IN_HOLES: &str = "PLACE_IN_HOLES";

/// Parameters of the place-in-holes machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    pub engine: EngineConfig,
    /// Distance kept to the workspace edge when adjusting, in meters.
    pub workspace_distance: f64,
    /// Frame cavities are reported in.
    pub cavity_frame: String,
    /// Frame arm and base targets are expressed in.
    pub reference_frame: String,
    pub camera_frame: String,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            workspace_distance: 0.4,
            cavity_frame: "/odom".to_string(),
            reference_frame: "/base_link".to_string(),
            camera_frame: "/tower_cam3d_rgb_optical_frame".to_string(),
        }
    }
}

impl PlacementConfig {
    pub fn with_engine(engine: EngineConfig) -> Self {
        Self {
            engine,
            ..Self::default()
        }
    }
}

/// A state whose `failed` and `timeout` outcomes re-enter it.
fn retrying<S: State + 'static>(name: &str, state: S) -> StateEntry {
    StateEntry::leaf(name, state)
        .on(Outcome::FAILED, name)
        .on(Outcome::TIMEOUT, name)
}

/// Assemble the place-in-holes machine.
///
/// Inputs: `task_list`, `rear_platform_occupied_poses`, `selected_objects`
/// and optionally `rear_platform_free_poses` and `location` (the current
/// workspace). The platform lists are updated as objects are grasped.
pub fn place_in_holes(
    client: Arc<dyn ActionClient>,
    config: &PlacementConfig,
) -> Result<StateMachine, BuildError> {
    let leaves = Leaves::new(client, config);
    let reject_unreachable = config.engine.assembly.reject_unreachable;
    let grasp = grasp::grasp_from_platform(&leaves, reject_unreachable)?;

    StateMachine::builder([Outcome::SUCCEEDED])
        .label(PLACE_IN_HOLES)
        .partial_outcomes([Outcome::FAILED, Outcome::from(NO_OBJECT_FOR_PPT_PLATFORM)])
        .input(TASK_LIST, ValueKind::Tasks)
        .input_output(REAR_PLATFORM_OCCUPIED_POSES, ValueKind::Poses)
        .input_output(SELECTED_OBJECTS, ValueKind::Objects)
        .optional_input(REAR_PLATFORM_FREE_POSES, ValueKind::Poses)
        .optional_input(LOCATION, ValueKind::Text)
        .optional_output(REAR_PLATFORM_FREE_POSES, ValueKind::Poses)
        .optional_output(LAST_GRASPED_OBJ, ValueKind::Object)
        .optional_output(CAVITY_POSE, ValueKind::Pose)
        .optional_output(MOVE_BASE_BY, ValueKind::Pose)
        .reject_unreachable(reject_unreachable)
        .state(
            retrying(
                "ADD_WALLS_TO_PLANNING_SCENE",
                leaves.update_planning_scene("walls", "add"),
            )
            .on(Outcome::SUCCEEDED, "ADJUST_POSE_WRT_WORKSPACE_AT_SOURCE"),
        )
        .state(
            retrying("ADJUST_POSE_WRT_WORKSPACE_AT_SOURCE", leaves.adjust_to_workspace())
                .on(Outcome::SUCCEEDED, "SELECT_OBJECTS_TO_PLACE"),
        )
        .state(
            StateEntry::leaf("SELECT_OBJECTS_TO_PLACE", select_objects_to_place())
                .on(OBJECTS_SELECTED, "LOOK_AT_WORKSPACE")
                .on(NO_MORE_OBJ_FOR_THIS_WORKSPACE, NO_OBJECT_FOR_PPT_PLATFORM),
        )
        .state(
            retrying("LOOK_AT_WORKSPACE", leaves.move_arm("out_of_view"))
                .on(Outcome::SUCCEEDED, "FIND_CAVITIES"),
        )
        .state(
            StateEntry::leaf("FIND_CAVITIES", leaves.find_cavities())
                .on(Outcome::SUCCEEDED, "SELECT_OBJECT_TO_PLACE")
                .on(NOT_ALL_CAVITIES_FOUND, "failed")
                .on(Outcome::TIMEOUT, "failed")
                .on(Outcome::FAILED, "failed"),
        )
        .state(
            StateEntry::leaf("SELECT_OBJECT_TO_PLACE", select_object_to_place())
                .on(OBJECT_SELECTED, "TRANSFORM_POSE_INTO_REFERENCE_FRAME")
                .on(NO_MORE_OBJECTS, "succeeded")
                .on(NO_MORE_CAVITIES, "succeeded"),
        )
        .state(
            StateEntry::leaf("TRANSFORM_POSE_INTO_REFERENCE_FRAME", leaves.transform_pose())
                .on(Outcome::SUCCEEDED, "MOVE_ARM_TO_PREGRASP")
                .on(TF_ERROR, "failed")
                .on(Outcome::TIMEOUT, "failed")
                .remap(OBJECT_POSE, CAVITY_POSE),
        )
        .state(
            retrying("MOVE_ARM_TO_PREGRASP", leaves.move_arm("pre_grasp"))
                .on(Outcome::SUCCEEDED, "COMPUTE_BASE_SHIFT_TO_OBJECT"),
        )
        .state(
            StateEntry::leaf("COMPUTE_BASE_SHIFT_TO_OBJECT", leaves.compute_base_shift())
                .on(Outcome::SUCCEEDED, "MOVE_BASE_RELATIVE")
                .on(TF_ERROR, "COMPUTE_BASE_SHIFT_TO_OBJECT")
                .on(Outcome::TIMEOUT, "COMPUTE_BASE_SHIFT_TO_OBJECT")
                .remap_input(OBJECT_POSE, CAVITY_POSE),
        )
        .state(
            retrying("MOVE_BASE_RELATIVE", leaves.move_base_relative())
                .on(Outcome::SUCCEEDED, "GRASP_OBJECT_FOR_HOLE_FROM_PLTF"),
        )
        .state(
            StateEntry::machine("GRASP_OBJECT_FOR_HOLE_FROM_PLTF", grasp)
                .on(OBJECT_GRASPED, "MOVE_TO_INTERMEDIATE_POSE")
                .on(NO_MORE_OBJ_FOR_THIS_WORKSPACE, NO_OBJECT_FOR_PPT_PLATFORM)
                .remap_input(OBJECT, OBJECT_TO_PLACE),
        )
        .state(
            retrying("MOVE_TO_INTERMEDIATE_POSE", leaves.move_arm("platform_intermediate"))
                .on(Outcome::SUCCEEDED, "MOVE_TO_PLACE_POSE"),
        )
        .state(
            retrying("MOVE_TO_PLACE_POSE", leaves.move_arm("pre_grasp"))
                .on(Outcome::SUCCEEDED, "MOVE_GRIPPER"),
        )
        .state(
            retrying("MOVE_GRIPPER", leaves.control_gripper("open"))
                .on(Outcome::SUCCEEDED, "MOVE_ARM_TO_INTERMEDIATE_2"),
        )
        .state(
            retrying("MOVE_ARM_TO_INTERMEDIATE_2", leaves.move_arm("platform_intermediate"))
                .on(Outcome::SUCCEEDED, "SELECT_OBJECT_TO_PLACE"),
        )
        .build()
}
