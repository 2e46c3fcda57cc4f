//! Task context shared by the states of a running machine.

use super::value::{ObjectHandle, Pose, TaskItem, Value, ValueKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Errors raised by context access.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ContextError {
    #[error("Key '{key}' is not present in the context")]
    MissingKey { key: String },

    #[error("Key '{key}' holds a {found}, expected a {expected}")]
    TypeMismatch {
        key: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("Key '{key}' was read but is not a declared input")]
    UndeclaredRead { key: String },

    #[error("Key '{key}' was written but is not a declared output")]
    UndeclaredWrite { key: String },
}

/// Keys a scoped context may read and write.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Access {
    pub(crate) readable: BTreeSet<String>,
    pub(crate) writable: BTreeSet<String>,
}

/// Key/value store holding task parameters and intermediate results.
///
/// A context created with [`Context::new`] is unrestricted. The executor
/// hands each leaf state a *scoped* context that only admits the keys the
/// state declared: reads of other keys fail with
/// [`ContextError::UndeclaredRead`], writes with
/// [`ContextError::UndeclaredWrite`].
///
/// # Example
///
/// ```rust
/// use taskgraph::core::{Context, ContextError, Pose};
///
/// let mut context = Context::new();
/// context.set("cavity_pose", Pose::new("/odom")).unwrap();
///
/// assert!(context.has("cavity_pose"));
/// assert_eq!(context.pose("cavity_pose").unwrap().frame_id, "/odom");
/// assert!(matches!(
///     context.get("object_pose"),
///     Err(ContextError::MissingKey { .. })
/// ));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    values: HashMap<String, Value>,
    #[serde(skip)]
    access: Option<Access>,
}

macro_rules! typed_getter {
    ($($(#[$meta:meta])* $fn:ident => $variant:ident: $ty:ty),* $(,)?) => {
        $(
            $(#[$meta])*
            pub fn $fn(&self, key: &str) -> Result<&$ty, ContextError> {
                match self.get(key)? {
                    Value::$variant(inner) => Ok(inner),
                    other => Err(ContextError::TypeMismatch {
                        key: key.to_string(),
                        expected: ValueKind::$variant,
                        found: other.kind(),
                    }),
                }
            }
        )*
    };
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert for unrestricted contexts.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub(crate) fn scoped(access: Access) -> Self {
        Self {
            values: HashMap::new(),
            access: Some(access),
        }
    }

    /// Drop access restrictions, keeping the values.
    pub(crate) fn unrestricted(mut self) -> Self {
        self.access = None;
        self
    }

    pub fn is_scoped(&self) -> bool {
        self.access.is_some()
    }

    /// Read a value.
    pub fn get(&self, key: &str) -> Result<&Value, ContextError> {
        if let Some(access) = &self.access {
            if !access.readable.contains(key) && !access.writable.contains(key) {
                return Err(ContextError::UndeclaredRead {
                    key: key.to_string(),
                });
            }
        }
        self.values.get(key).ok_or_else(|| ContextError::MissingKey {
            key: key.to_string(),
        })
    }

    /// Write a value, replacing any previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<(), ContextError> {
        let key = key.into();
        if let Some(access) = &self.access {
            if !access.writable.contains(&key) {
                return Err(ContextError::UndeclaredWrite { key });
            }
        }
        self.values.insert(key, value.into());
        Ok(())
    }

    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Result<Option<Value>, ContextError> {
        if let Some(access) = &self.access {
            if !access.writable.contains(key) {
                return Err(ContextError::UndeclaredWrite {
                    key: key.to_string(),
                });
            }
        }
        Ok(self.values.remove(key))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw lookup used by the executor when moving values across scopes.
    pub(crate) fn peek(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Raw insert used by the executor when moving values across scopes.
    pub(crate) fn put(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    typed_getter! {
        boolean => Bool: bool,
        integer => Integer: i64,
        number => Number: f64,
        text => Text: String,
        pose => Pose: Pose,
        poses => Poses: Vec<Pose>,
        object => Object: ObjectHandle,
        objects => Objects: Vec<ObjectHandle>,
        tasks => Tasks: Vec<TaskItem>,
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
            access: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scoped(readable: &[&str], writable: &[&str]) -> Context {
        Context::scoped(Access {
            readable: readable.iter().map(|k| k.to_string()).collect(),
            writable: writable.iter().map(|k| k.to_string()).collect(),
        })
    }

    #[test]
    fn get_missing_key_fails() {
        let context = Context::new();
        assert_eq!(
            context.get("object_pose"),
            Err(ContextError::MissingKey {
                key: "object_pose".to_string()
            })
        );
    }

    #[test]
    fn set_overwrites() {
        let mut context = Context::new().with("move_arm_to", "pre_grasp");
        context.set("move_arm_to", "out_of_view").unwrap();
        assert_eq!(context.text("move_arm_to").unwrap(), "out_of_view");
        assert_eq!(context.len(), 1);
    }

    #[test]
    fn typed_getter_reports_mismatch() {
        let context = Context::new().with("cavity_pose", "not a pose");
        assert_eq!(
            context.pose("cavity_pose"),
            Err(ContextError::TypeMismatch {
                key: "cavity_pose".to_string(),
                expected: ValueKind::Pose,
                found: ValueKind::Text,
            })
        );
    }

    #[test]
    fn scoped_context_rejects_undeclared_read() {
        let mut context = scoped(&["selected_objects"], &[]);
        context.put("selected_objects", Value::Objects(vec![]));
        context.put("task_list", Value::Tasks(vec![]));

        assert!(context.objects("selected_objects").is_ok());
        assert!(matches!(
            context.get("task_list"),
            Err(ContextError::UndeclaredRead { .. })
        ));
    }

    #[test]
    fn scoped_context_rejects_undeclared_write() {
        let mut context = scoped(&["selected_objects"], &["cavity_pose"]);

        assert!(context.set("cavity_pose", Pose::new("/odom")).is_ok());
        assert!(matches!(
            context.set("selected_objects", Value::Objects(vec![])),
            Err(ContextError::UndeclaredWrite { .. })
        ));
        assert!(matches!(
            context.remove("selected_objects"),
            Err(ContextError::UndeclaredWrite { .. })
        ));
    }

    #[test]
    fn outputs_are_readable_after_write() {
        let mut context = scoped(&[], &["move_base_by"]);
        context.set("move_base_by", Pose::new("/base_link")).unwrap();
        assert!(context.pose("move_base_by").is_ok());
    }

    #[test]
    fn unrestricted_drops_access() {
        let context = scoped(&[], &[]).unrestricted();
        assert!(!context.is_scoped());
    }

    #[test]
    fn context_serializes_without_access() {
        let mut context = scoped(&[], &["count"]);
        context.set("count", 2_i64).unwrap();

        let json = serde_json::to_string(&context).unwrap();
        let restored: Context = serde_json::from_str(&json).unwrap();

        assert!(!restored.is_scoped());
        assert_eq!(restored.integer("count").unwrap(), &2);
    }

    #[test]
    fn collects_from_pairs() {
        let context: Context = [("location", Value::from("PP01"))].into_iter().collect();
        assert_eq!(context.text("location").unwrap(), "PP01");
    }
}
