//! Snapshot error types.

use thiserror::Error;

/// Errors raised while encoding or decoding a [`Snapshot`](super::Snapshot).
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// JSON encoding or decoding failed
    #[error("Snapshot JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    /// bincode encoding or decoding failed
    #[error("Snapshot binary encoding failed: {0}")]
    Binary(#[from] bincode::Error),

    /// The snapshot was written by another format version.
    #[error("Snapshot format version {found} is not supported (expected {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}
