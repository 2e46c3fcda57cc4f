//! Tagged values stored in a task context.
//!
//! Context entries are a closed sum type rather than dynamically typed
//! objects, so a state's declared key kinds can be checked when a machine is
//! assembled and again when a value crosses a state boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A pose in a named reference frame.
///
/// `name` is set for poses that identify a fixed location, such as a slot on
/// the robot's rear platform or a detected cavity.
///
/// # Example
///
/// ```rust
/// use taskgraph::core::Pose;
///
/// let slot = Pose::named("platform_left", "/base_link").at([0.1, -0.2, 0.05]);
/// assert_eq!(slot.name.as_deref(), Some("platform_left"));
/// assert_eq!(slot.frame_id, "/base_link");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    #[serde(default)]
    pub name: Option<String>,
    pub frame_id: String,
    pub position: [f64; 3],
    /// Quaternion as `[x, y, z, w]`.
    pub orientation: [f64; 4],
}

impl Pose {
    /// Identity pose in `frame_id`.
    pub fn new(frame_id: impl Into<String>) -> Self {
        Self {
            name: None,
            frame_id: frame_id.into(),
            position: [0.0; 3],
            orientation: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Identity pose carrying a location name.
    pub fn named(name: impl Into<String>, frame_id: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::new(frame_id)
        }
    }

    pub fn at(mut self, position: [f64; 3]) -> Self {
        self.position = position;
        self
    }

    pub fn oriented(mut self, orientation: [f64; 4]) -> Self {
        self.orientation = orientation;
        self
    }

    /// True if this pose carries `name`, ignoring ASCII case.
    pub fn is_named(&self, name: &str) -> bool {
        self.name
            .as_deref()
            .is_some_and(|own| own.eq_ignore_ascii_case(name))
    }
}

/// Handle to a physical object known to the task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectHandle {
    pub name: String,
    /// Where the object currently rests, if known.
    #[serde(default)]
    pub pose: Option<Pose>,
}

impl ObjectHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pose: None,
        }
    }

    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = Some(pose);
        self
    }
}

/// One entry of the task list: move `object` from `location` to `destination`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskItem {
    pub object: String,
    pub location: String,
    pub destination: String,
}

impl TaskItem {
    pub fn new(
        object: impl Into<String>,
        location: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            object: object.into(),
            location: location.into(),
            destination: destination.into(),
        }
    }
}

/// A value held in a [`Context`](super::Context).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    Pose(Pose),
    Poses(Vec<Pose>),
    Object(ObjectHandle),
    Objects(Vec<ObjectHandle>),
    Tasks(Vec<TaskItem>),
}

/// The variant tag of a [`Value`], used in key declarations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValueKind {
    Bool,
    Integer,
    Number,
    Text,
    Pose,
    Poses,
    Object,
    Objects,
    Tasks,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Integer(_) => ValueKind::Integer,
            Self::Number(_) => ValueKind::Number,
            Self::Text(_) => ValueKind::Text,
            Self::Pose(_) => ValueKind::Pose,
            Self::Poses(_) => ValueKind::Poses,
            Self::Object(_) => ValueKind::Object,
            Self::Objects(_) => ValueKind::Objects,
            Self::Tasks(_) => ValueKind::Tasks,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Text => "text",
            Self::Pose => "pose",
            Self::Poses => "pose list",
            Self::Object => "object",
            Self::Objects => "object list",
            Self::Tasks => "task list",
        };
        f.write_str(name)
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i64 => Integer,
    f64 => Number,
    String => Text,
    Pose => Pose,
    Vec<Pose> => Poses,
    ObjectHandle => Object,
    Vec<ObjectHandle> => Objects,
    Vec<TaskItem> => Tasks,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}
