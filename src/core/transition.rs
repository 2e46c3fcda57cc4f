//! Transition targets and per-machine transition tables.

use super::outcome::Outcome;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Where an outcome leads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    /// Activate another state of the same machine.
    State(String),
    /// Leave the machine with one of its declared outcomes.
    Outcome(Outcome),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State(name) => write!(f, "state '{name}'"),
            Self::Outcome(outcome) => write!(f, "outcome '{outcome}'"),
        }
    }
}

/// Mapping of `(state, outcome)` to a [`Target`].
///
/// Tables are produced by the machine builder, which guarantees one entry
/// for every outcome each state can return.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransitionTable {
    entries: HashMap<String, BTreeMap<Outcome, Target>>,
}

impl TransitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, returning the target it replaced.
    pub fn insert(
        &mut self,
        state: impl Into<String>,
        outcome: Outcome,
        target: Target,
    ) -> Option<Target> {
        self.entries
            .entry(state.into())
            .or_default()
            .insert(outcome, target)
    }

    pub fn resolve(&self, state: &str, outcome: &str) -> Option<&Target> {
        self.entries.get(state)?.get(outcome)
    }

    /// All entries leaving `state`.
    pub fn from_state(&self, state: &str) -> impl Iterator<Item = (&Outcome, &Target)> {
        self.entries.get(state).into_iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
