//! `GRASP_OBJECT_FOR_HOLE_FROM_PLTF`: pick the object to place from its
//! rear-platform slot.

use super::keys::*;
use super::states::Leaves;
use crate::builder::{BuildError, StateEntry};
use crate::core::{
    Context, ContextError, FnState, Interface, ObjectHandle, Outcome, Pose, StateError, ValueKind,
};
use crate::executor::StateMachine;

/// Slot of `object` among the occupied platform poses.
pub fn find_platform_slot<'p>(object: &ObjectHandle, occupied: &'p [Pose]) -> Option<&'p Pose> {
    let slot = object.pose.as_ref()?.name.as_deref()?;
    occupied.iter().find(|pose| pose.is_named(slot))
}

fn optional_poses(context: &Context, key: &str) -> Result<Vec<Pose>, StateError> {
    match context.poses(key) {
        Ok(poses) => Ok(poses.clone()),
        Err(ContextError::MissingKey { .. }) => Ok(Vec::new()),
        Err(err) => Err(err.into()),
    }
}

fn find_slot() -> FnState {
    FnState::new(
        Interface::new([SLOT_FOUND])
            .partial_outcomes([NO_MORE_OBJ_FOR_THIS_WORKSPACE])
            .input(OBJECT, ValueKind::Object)
            .input(REAR_PLATFORM_OCCUPIED_POSES, ValueKind::Poses)
            .output(PLATFORM_POSE, ValueKind::Pose),
        |context| {
            let slot = find_platform_slot(
                context.object(OBJECT)?,
                context.poses(REAR_PLATFORM_OCCUPIED_POSES)?,
            )
            .cloned();
            match slot {
                Some(slot) => {
                    context.set(PLATFORM_POSE, slot)?;
                    Ok(Outcome::from(SLOT_FOUND))
                }
                None => Ok(Outcome::from(NO_MORE_OBJ_FOR_THIS_WORKSPACE)),
            }
        },
    )
}

/// Move the emptied slot from the occupied to the free list and remember
/// the grasped object.
fn update_platform() -> FnState {
    FnState::new(
        Interface::new([Outcome::SUCCEEDED])
            .input(OBJECT, ValueKind::Object)
            .input(PLATFORM_POSE, ValueKind::Pose)
            .input_output(REAR_PLATFORM_OCCUPIED_POSES, ValueKind::Poses)
            .optional_input(REAR_PLATFORM_FREE_POSES, ValueKind::Poses)
            .output(REAR_PLATFORM_FREE_POSES, ValueKind::Poses)
            .output(LAST_GRASPED_OBJ, ValueKind::Object),
        |context| {
            let object = context.object(OBJECT)?.clone();
            let slot = context.pose(PLATFORM_POSE)?.clone();
            let mut occupied = context.poses(REAR_PLATFORM_OCCUPIED_POSES)?.clone();
            let mut free = optional_poses(context, REAR_PLATFORM_FREE_POSES)?;

            occupied.retain(|pose| pose != &slot);
            free.push(slot);

            context.set(REAR_PLATFORM_OCCUPIED_POSES, occupied)?;
            context.set(REAR_PLATFORM_FREE_POSES, free)?;
            context.set(LAST_GRASPED_OBJ, object)?;
            Ok(Outcome::SUCCEEDED)
        },
    )
}

pub(crate) fn grasp_from_platform(leaves: &Leaves<'_>, reject_unreachable: bool) -> Result<StateMachine, BuildError> {
    StateMachine::builder([OBJECT_GRASPED])
        .label("GRASP_OBJECT_FOR_HOLE_FROM_PLTF")
        .partial_outcomes([NO_MORE_OBJ_FOR_THIS_WORKSPACE])
        .input(OBJECT, ValueKind::Object)
        .input_output(REAR_PLATFORM_OCCUPIED_POSES, ValueKind::Poses)
        .optional_input(REAR_PLATFORM_FREE_POSES, ValueKind::Poses)
        .output(REAR_PLATFORM_FREE_POSES, ValueKind::Poses)
        .output(LAST_GRASPED_OBJ, ValueKind::Object)
        .reject_unreachable(reject_unreachable)
        .state(
            StateEntry::leaf("FIND_PLATFORM_SLOT", find_slot())
                .on(SLOT_FOUND, "MOVE_ARM_TO_PLATFORM")
                .on(NO_MORE_OBJ_FOR_THIS_WORKSPACE, NO_MORE_OBJ_FOR_THIS_WORKSPACE),
        )
        .state(
            StateEntry::leaf("MOVE_ARM_TO_PLATFORM", leaves.move_arm_to_pose(PLATFORM_POSE))
                .on(Outcome::SUCCEEDED, "CLOSE_GRIPPER")
                .on(Outcome::FAILED, "MOVE_ARM_TO_PLATFORM")
                .on(Outcome::TIMEOUT, "MOVE_ARM_TO_PLATFORM"),
        )
        .state(
            StateEntry::leaf("CLOSE_GRIPPER", leaves.control_gripper("close"))
                .on(Outcome::SUCCEEDED, "UPDATE_PLATFORM")
                .on(Outcome::FAILED, "MOVE_ARM_TO_PLATFORM")
                .on(Outcome::TIMEOUT, "CLOSE_GRIPPER"),
        )
        .state(
            StateEntry::leaf("UPDATE_PLATFORM", update_platform())
                .on(Outcome::SUCCEEDED, OBJECT_GRASPED),
        )
        .build()
}
