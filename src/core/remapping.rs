//! Key remapping between an enclosing machine and a child state.

use std::collections::BTreeMap;

/// Translation of a child's key names into the enclosing machine's names.
///
/// Input and output directions are independent. Keys without an entry pass
/// through under the same name.
///
/// # Example
///
/// ```rust
/// use taskgraph::core::Remapping;
///
/// let remapping = Remapping::new().map("object_pose", "cavity_pose");
///
/// assert_eq!(remapping.input_key("object_pose"), "cavity_pose");
/// assert_eq!(remapping.output_key("object_pose"), "cavity_pose");
/// assert_eq!(remapping.input_key("task_list"), "task_list");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Remapping {
    inputs: BTreeMap<String, String>,
    outputs: BTreeMap<String, String>,
}

impl Remapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `child` to `parent` for both reading and writing.
    pub fn map(self, child: impl Into<String>, parent: impl Into<String>) -> Self {
        let child = child.into();
        let parent = parent.into();
        self.map_input(child.clone(), parent.clone())
            .map_output(child, parent)
    }

    pub fn map_input(mut self, child: impl Into<String>, parent: impl Into<String>) -> Self {
        self.inputs.insert(child.into(), parent.into());
        self
    }

    pub fn map_output(mut self, child: impl Into<String>, parent: impl Into<String>) -> Self {
        self.outputs.insert(child.into(), parent.into());
        self
    }

    /// Enclosing-machine name the child reads `key` from.
    pub fn input_key<'a>(&'a self, key: &'a str) -> &'a str {
        self.inputs.get(key).map(String::as_str).unwrap_or(key)
    }

    /// Enclosing-machine name the child's `key` is written back to.
    pub fn output_key<'a>(&'a self, key: &'a str) -> &'a str {
        self.outputs.get(key).map(String::as_str).unwrap_or(key)
    }

    /// Child keys with an explicit input entry.
    pub fn mapped_inputs(&self) -> impl Iterator<Item = &str> {
        self.inputs.keys().map(String::as_str)
    }

    /// Child keys with an explicit output entry.
    pub fn mapped_outputs(&self) -> impl Iterator<Item = &str> {
        self.outputs.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }
}
