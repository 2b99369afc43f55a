//! Shared identifier and severity types.

use serde::{Deserialize, Serialize};

/// Identity of one schedulable computation unit (a slice of a node's work).
///
/// Chunk ids are assigned by the graph collaborator; the runtime only uses
/// them as lookup keys (monitor records, event payloads).
pub type ChunkId = String;

/// Identity of a pipeline node.
pub type NodeId = String;

/// Severity of a per-chunk log line.
///
/// Rendered lower-case in log files, e.g. `[12:01:35.218][warning] ...`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Lower-case name used in the log line prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        }
    }

    /// Parse from a (case-insensitive) name, defaulting to `Info` for
    /// unknown values.
    pub fn from_str(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "warning" => LogLevel::Warning,
            "error" => LogLevel::Error,
            "critical" => LogLevel::Critical,
            _ => LogLevel::Info,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
