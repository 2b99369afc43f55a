//! Chunk execution status.
//!
//! The status enumeration is owned by whichever process currently executes
//! a chunk; it is written to the chunk's status file and read back here.
//! The runtime layer only observes these values, it never invents
//! transitions of its own.

use serde::{Deserialize, Serialize};

/// Execution status of a chunk, as persisted in its status file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChunkStatus {
    /// No status file yet, or the chunk has never been touched.
    #[default]
    None,
    /// Inputs are satisfied, the chunk can be scheduled.
    Ready,
    /// Handed to an external scheduler, not yet started.
    Submitted,
    /// Currently executing (locally or on another host).
    Running,
    Success,
    Error,
    /// Execution was cancelled before completion.
    Stopped,
}

impl ChunkStatus {
    /// Upper-case name as stored in status files.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkStatus::None => "NONE",
            ChunkStatus::Ready => "READY",
            ChunkStatus::Submitted => "SUBMITTED",
            ChunkStatus::Running => "RUNNING",
            ChunkStatus::Success => "SUCCESS",
            ChunkStatus::Error => "ERROR",
            ChunkStatus::Stopped => "STOPPED",
        }
    }

    /// Parse from a status-file value, defaulting to `None` for unknown
    /// or missing values.
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "READY" => ChunkStatus::Ready,
            "SUBMITTED" => ChunkStatus::Submitted,
            "RUNNING" => ChunkStatus::Running,
            "SUCCESS" => ChunkStatus::Success,
            "ERROR" => ChunkStatus::Error,
            "STOPPED" => ChunkStatus::Stopped,
            _ => ChunkStatus::None,
        }
    }

    /// Whether this status means the chunk is owned by some scheduler,
    /// i.e. work is in flight somewhere.
    pub fn is_active(&self) -> bool {
        matches!(self, ChunkStatus::Submitted | ChunkStatus::Running)
    }
}

impl std::fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
