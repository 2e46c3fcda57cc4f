//! Selection of the next objects and cavities to work on.
//!
//! Both selectors end in distinct empty-resource outcomes instead of a
//! generic failure, so the enclosing machine can route each on its own.

use super::keys::*;
use crate::core::{
    Context, ContextError, FnState, Interface, ObjectHandle, Outcome, Pose, StateError, TaskItem,
    ValueKind,
};

/// Objects on the rear platform whose task targets `workspace`.
///
/// Each platform slot is matched at most once. Without a workspace every
/// task is eligible.
pub fn objects_for_workspace(
    tasks: &[TaskItem],
    platform: &[Pose],
    workspace: Option<&str>,
) -> Vec<ObjectHandle> {
    let mut used = vec![false; platform.len()];
    let mut selected = Vec::new();

    let eligible = tasks
        .iter()
        .filter(|task| workspace.map_or(true, |ws| task.destination.eq_ignore_ascii_case(ws)));
    for task in eligible {
        let slot = platform
            .iter()
            .enumerate()
            .find(|(index, pose)| !used[*index] && pose.is_named(&task.location));
        if let Some((index, pose)) = slot {
            used[index] = true;
            selected.push(ObjectHandle::new(task.object.clone()).with_pose(pose.clone()));
        }
    }
    selected
}

/// First object with a cavity carrying its name, as `(object, cavity)`
/// indices.
pub fn match_cavity(objects: &[ObjectHandle], cavities: &[Pose]) -> Option<(usize, usize)> {
    objects.iter().enumerate().find_map(|(object, handle)| {
        cavities
            .iter()
            .position(|cavity| cavity.is_named(&handle.name))
            .map(|cavity| (object, cavity))
    })
}

fn optional_text(context: &Context, key: &str) -> Result<Option<String>, StateError> {
    match context.text(key) {
        Ok(text) => Ok(Some(text.clone())),
        Err(ContextError::MissingKey { .. }) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// `SELECT_OBJECTS_TO_PLACE`: pick the platform objects meant for the
/// current workspace.
pub fn select_objects_to_place() -> FnState {
    FnState::new(
        Interface::new([OBJECTS_SELECTED])
            .partial_outcomes([NO_MORE_OBJ_FOR_THIS_WORKSPACE])
            .input(TASK_LIST, ValueKind::Tasks)
            .input(REAR_PLATFORM_OCCUPIED_POSES, ValueKind::Poses)
            .optional_input(LOCATION, ValueKind::Text)
            .output(SELECTED_OBJECTS, ValueKind::Objects),
        |context| {
            let workspace = optional_text(context, LOCATION)?;
            let selected = objects_for_workspace(
                context.tasks(TASK_LIST)?,
                context.poses(REAR_PLATFORM_OCCUPIED_POSES)?,
                workspace.as_deref(),
            );
            if selected.is_empty() {
                return Ok(Outcome::from(NO_MORE_OBJ_FOR_THIS_WORKSPACE));
            }

            context.set(SELECTED_OBJECTS, selected)?;
            Ok(Outcome::from(OBJECTS_SELECTED))
        },
    )
}

/// `SELECT_OBJECT_TO_PLACE`: take the next selected object that has a
/// matching cavity, consuming both.
pub fn select_object_to_place() -> FnState {
    FnState::new(
        Interface::new([OBJECT_SELECTED])
            .partial_outcomes([NO_MORE_OBJECTS, NO_MORE_CAVITIES])
            .input_output(SELECTED_OBJECTS, ValueKind::Objects)
            .input_output(CAVITIES, ValueKind::Poses)
            .output(CAVITY_POSE, ValueKind::Pose)
            .output(OBJECT_TO_PLACE, ValueKind::Object),
        |context| {
            let mut objects = context.objects(SELECTED_OBJECTS)?.clone();
            if objects.is_empty() {
                return Ok(Outcome::from(NO_MORE_OBJECTS));
            }
            let mut cavities = context.poses(CAVITIES)?.clone();
            let Some((object, cavity)) = match_cavity(&objects, &cavities) else {
                return Ok(Outcome::from(NO_MORE_CAVITIES));
            };

            let object = objects.remove(object);
            let cavity = cavities.remove(cavity);
            context.set(SELECTED_OBJECTS, objects)?;
            context.set(CAVITIES, cavities)?;
            context.set(CAVITY_POSE, cavity)?;
            context.set(OBJECT_TO_PLACE, object)?;
            Ok(Outcome::from(OBJECT_SELECTED))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Preemption, State};

    fn platform() -> Vec<Pose> {
        vec![
            Pose::named("platform_left", "/base_link"),
            Pose::named("platform_middle", "/base_link"),
        ]
    }

    #[test]
    fn objects_are_matched_to_platform_slots_for_workspace() {
        let tasks = vec![
            TaskItem::new("M20_100", "PLATFORM_LEFT", "PP01"),
            TaskItem::new("F20_20_B", "PLATFORM_MIDDLE", "WS03"),
            TaskItem::new("R20", "PLATFORM_RIGHT", "PP01"),
        ];

        let selected = objects_for_workspace(&tasks, &platform(), Some("pp01"));

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "M20_100");
        assert!(selected[0].pose.as_ref().unwrap().is_named("platform_left"));
        assert_eq!(objects_for_workspace(&tasks, &platform(), None).len(), 2);
    }

    #[test]
    fn platform_slot_is_used_once() {
        let tasks = vec![
            TaskItem::new("M20_100", "platform_left", "PP01"),
            TaskItem::new("M20", "platform_left", "PP01"),
        ];
        assert_eq!(objects_for_workspace(&tasks, &platform(), None).len(), 1);
    }

    #[test]
    fn cavity_matching_skips_objects_without_cavity() {
        let objects = vec![ObjectHandle::new("R20"), ObjectHandle::new("M20_100")];
        let cavities = vec![Pose::named("F20_20_B", "/odom"), Pose::named("M20_100", "/odom")];

        assert_eq!(match_cavity(&objects, &cavities), Some((1, 1)));
        assert_eq!(match_cavity(&objects, &[]), None);
    }

    #[tokio::test]
    async fn selecting_objects_with_empty_task_list_exhausts_workspace() {
        let state = select_objects_to_place();
        let mut context = Context::new()
            .with(TASK_LIST, Vec::<TaskItem>::new())
            .with(REAR_PLATFORM_OCCUPIED_POSES, platform());

        let outcome = state.execute(&mut context, &Preemption::new()).await.unwrap();
        assert_eq!(outcome, NO_MORE_OBJ_FOR_THIS_WORKSPACE);
    }

    #[tokio::test]
    async fn selecting_object_consumes_object_and_cavity() {
        let state = select_object_to_place();
        let mut context = Context::new()
            .with(SELECTED_OBJECTS, vec![ObjectHandle::new("M20_100")])
            .with(CAVITIES, vec![Pose::named("M20_100", "/odom")]);

        let outcome = state.execute(&mut context, &Preemption::new()).await.unwrap();

        assert_eq!(outcome, OBJECT_SELECTED);
        assert!(context.objects(SELECTED_OBJECTS).unwrap().is_empty());
        assert!(context.poses(CAVITIES).unwrap().is_empty());
        assert!(context.pose(CAVITY_POSE).unwrap().is_named("M20_100"));
        assert_eq!(context.object(OBJECT_TO_PLACE).unwrap().name, "M20_100");
    }

    #[tokio::test]
    async fn empty_resources_have_distinct_outcomes() {
        let state = select_object_to_place();

        let mut no_objects = Context::new()
            .with(SELECTED_OBJECTS, Vec::<ObjectHandle>::new())
            .with(CAVITIES, vec![Pose::named("M20_100", "/odom")]);
        let mut no_cavities = Context::new()
            .with(SELECTED_OBJECTS, vec![ObjectHandle::new("M20_100")])
            .with(CAVITIES, Vec::<Pose>::new());

        let preemption = Preemption::new();
        assert_eq!(
            state.execute(&mut no_objects, &preemption).await.unwrap(),
            NO_MORE_OBJECTS
        );
        assert_eq!(
            state.execute(&mut no_cavities, &preemption).await.unwrap(),
            NO_MORE_CAVITIES
        );
    }
}
