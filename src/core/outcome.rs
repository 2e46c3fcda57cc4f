//! Outcome labels used to route between states.

use serde::{Deserialize, Serialize};
use std::borrow::{Borrow, Cow};
use std::fmt;

/// A named result of a state execution.
///
/// Outcomes carry no data; they only select the next transition.
///
/// # Example
///
/// ```rust
/// use taskgraph::core::Outcome;
///
/// let outcome = Outcome::from("no_more_cavities");
/// assert_eq!(outcome.as_str(), "no_more_cavities");
/// assert_ne!(outcome, Outcome::SUCCEEDED);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outcome(Cow<'static, str>);

impl Outcome {
    pub const SUCCEEDED: Outcome = Outcome(Cow::Borrowed("succeeded"));
    pub const FAILED: Outcome = Outcome(Cow::Borrowed("failed"));
    pub const TIMEOUT: Outcome = Outcome(Cow::Borrowed("timeout"));

    pub fn new(label: impl Into<Cow<'static, str>>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Outcome {
    fn from(label: &'static str) -> Self {
        Self(Cow::Borrowed(label))
    }
}

impl From<String> for Outcome {
    fn from(label: String) -> Self {
        Self(Cow::Owned(label))
    }
}

impl Borrow<str> for Outcome {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Outcome {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Outcome {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
