//! Context keys and outcome labels of the place-in-holes task.

pub const TASK_LIST: &str = "task_list";
pub const LOCATION: &str = "location";
pub const SELECTED_OBJECTS: &str = "selected_objects";
pub const REAR_PLATFORM_OCCUPIED_POSES: &str = "rear_platform_occupied_poses";
pub const REAR_PLATFORM_FREE_POSES: &str = "rear_platform_free_poses";
pub const CAVITIES: &str = "cavities";
pub const CAVITY_POSE: &str = "cavity_pose";
pub const OBJECT_POSE: &str = "object_pose";
pub const OBJECT_TO_PLACE: &str = "object_to_place";
pub const OBJECT: &str = "object";
pub const PLATFORM_POSE: &str = "platform_pose";
pub const MOVE_BASE_BY: &str = "move_base_by";
pub const LAST_GRASPED_OBJ: &str = "last_grasped_obj";

pub const NO_OBJECT_FOR_PPT_PLATFORM: &str = "no_object_for_ppt_platform";
pub const OBJECTS_SELECTED: &str = "objects_selected";
pub const NO_MORE_OBJ_FOR_THIS_WORKSPACE: &str = "no_more_obj_for_this_workspace";
pub const OBJECT_SELECTED: &str = "object_selected";
pub const NO_MORE_OBJECTS: &str = "no_more_objects";
pub const NO_MORE_CAVITIES: &str = "no_more_cavities";
pub const NOT_ALL_CAVITIES_FOUND: &str = "not_all_cavities_found";
pub const TF_ERROR: &str = "tf_error";
pub const SLOT_FOUND: &str = "slot_found";
pub const OBJECT_GRASPED: &str = "object_grasped";
