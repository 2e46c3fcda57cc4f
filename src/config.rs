//! Engine configuration loaded from TOML.
//!
//! ```toml
//! [actions]
//! default_timeout_secs = 30.0
//!
//! [actions.per_server]
//! base_relative_mover = 60.0
//!
//! [task]
//! deadline_secs = 600.0
//! success_outcomes = ["succeeded"]
//!
//! [assembly]
//! reject_unreachable = true
//! ```
//!
//! Every section and field is optional; missing values take the defaults
//! shown above (no task deadline by default).

use crate::action::DEFAULT_ACTION_TIMEOUT;
use crate::core::Outcome;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

/// Configuration root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub actions: ActionsSection,
    pub task: TaskSection,
    pub assembly: AssemblySection,
}

/// `[actions]`: deadlines for action-server goals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionsSection {
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: f64,
    /// Server name to timeout in seconds.
    #[serde(default)]
    pub per_server: BTreeMap<String, f64>,
}

impl Default for ActionsSection {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_timeout_secs(),
            per_server: BTreeMap::new(),
        }
    }
}

fn default_timeout_secs() -> f64 {
    DEFAULT_ACTION_TIMEOUT.as_secs_f64()
}

impl ActionsSection {
    /// Goal deadline for `server`.
    pub fn timeout_for(&self, server: &str) -> Duration {
        let secs = self
            .per_server
            .get(server)
            .copied()
            .unwrap_or(self.default_timeout_secs);
        Duration::try_from_secs_f64(secs).unwrap_or(DEFAULT_ACTION_TIMEOUT)
    }
}

/// `[task]`: task-level deadline and status mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSection {
    /// Wall-clock limit for one task; none by default.
    #[serde(default)]
    pub deadline_secs: Option<f64>,
    /// Top-level outcomes reported as a successful task.
    #[serde(default = "default_success_outcomes")]
    pub success_outcomes: Vec<String>,
}

impl Default for TaskSection {
    fn default() -> Self {
        Self {
            deadline_secs: None,
            success_outcomes: default_success_outcomes(),
        }
    }
}

fn default_success_outcomes() -> Vec<String> {
    vec![Outcome::SUCCEEDED.to_string()]
}

impl TaskSection {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    pub fn success_outcomes(&self) -> Vec<Outcome> {
        self.success_outcomes
            .iter()
            .cloned()
            .map(Outcome::from)
            .collect()
    }
}

/// `[assembly]`: build-time policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssemblySection {
    #[serde(default = "default_reject_unreachable")]
    pub reject_unreachable: bool,
}

impl Default for AssemblySection {
    fn default() -> Self {
        Self {
            reject_unreachable: default_reject_unreachable(),
        }
    }
}

fn default_reject_unreachable() -> bool {
    true
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.check()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    fn check(&self) -> Result<(), ConfigError> {
        check_secs("actions.default_timeout_secs", self.actions.default_timeout_secs)?;
        for (server, secs) in &self.actions.per_server {
            check_secs(&format!("actions.per_server.{server}"), *secs)?;
        }
        if let Some(secs) = self.task.deadline_secs {
            check_secs("task.deadline_secs", secs)?;
        }
        if self.task.success_outcomes.is_empty() {
            return Err(ConfigError::Invalid {
                field: "task.success_outcomes".to_string(),
                reason: "at least one outcome is required".to_string(),
            });
        }
        Ok(())
    }
}

fn check_secs(field: &str, secs: f64) -> Result<(), ConfigError> {
    if secs.is_finite() && secs > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field: field.to_string(),
            reason: format!("expected a positive number of seconds, got {secs}"),
        })
    }
}
