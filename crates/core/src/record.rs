//! Persisted statistics record (schema version 2.0).
//!
//! One [`Statistics`] record exists per executing chunk. It is created
//! when execution starts, mutated only by the chunk's own sampling task,
//! and persisted after every tick plus once more after the final tick.
//!
//! On-disk layout:
//!
//! ```json
//! {
//!   "fileVersion": 2.0,
//!   "computer": { "nbCores": 8, ..., "curves": { "ramUsage": [..] } },
//!   "process": { "duration": 12.5, "curves": {..}, "openFiles": {} },
//!   "times": [1723400000.1, ...],
//!   "interval": 10.0
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::curves::CurveSet;
use crate::error::CoreError;

/// Current schema version of the statistics file.
pub const STATS_FILE_VERSION: f64 = 2.0;

/// Default interval between sampling ticks, in seconds.
pub const DEFAULT_SAMPLING_INTERVAL_SECS: f64 = 10.0;

/// Host-wide statistics: one-time facts plus per-tick curves.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComputerRecord {
    /// Logical core count, captured on the first tick.
    pub nb_cores: usize,
    /// CPU frequency in MHz, captured on the first tick.
    pub cpu_freq: f64,
    /// Total RAM in GiB, captured on the first tick.
    pub ram_total: f64,
    /// GPU name as reported by the metrics tool, when available.
    pub gpu_name: String,
    /// Total GPU memory in MiB, when available.
    pub gpu_memory_total: f64,
    pub curves: CurveSet,
}

/// Per-process statistics for the executing chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProcessRecord {
    /// Cumulative execution duration in seconds, set when sampling stops.
    pub duration: f64,
    pub curves: CurveSet,
    /// Kept for schema compatibility; open-file collection is disabled.
    pub open_files: BTreeMap<String, Vec<String>>,
}

/// The full statistics record for one chunk execution.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub file_version: f64,
    pub computer: ComputerRecord,
    pub process: ProcessRecord,
    /// One UNIX timestamp (seconds) per sampling tick.
    pub times: Vec<f64>,
    /// Sampling interval in seconds.
    pub interval: f64,
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLING_INTERVAL_SECS)
    }
}

impl Statistics {
    pub fn new(interval_secs: f64) -> Self {
        Self {
            file_version: STATS_FILE_VERSION,
            computer: ComputerRecord::default(),
            process: ProcessRecord::default(),
            times: Vec::new(),
            interval: interval_secs,
        }
    }

    /// Number of sampling ticks recorded so far.
    pub fn tick_count(&self) -> usize {
        self.times.len()
    }

    /// Persist the record as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load a record best-effort.
    ///
    /// A `fileVersion` mismatch is logged, not fatal. Each sub-section
    /// (`computer`, `process`, `times`, `interval`) deserializes
    /// independently: a broken section falls back to its default and is
    /// logged at debug severity without blocking the others.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let raw = fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        Ok(Self::from_value(&value))
    }

    /// Best-effort decode from an already-parsed JSON value.
    pub fn from_value(value: &serde_json::Value) -> Self {
        let version = value
            .get("fileVersion")
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(0.0);
        if version != STATS_FILE_VERSION {
            tracing::debug!(
                file_version = version,
                current_version = STATS_FILE_VERSION,
                "statistics file version mismatch, loading best-effort"
            );
        }

        let mut stats = Statistics::new(DEFAULT_SAMPLING_INTERVAL_SECS);
        stats.file_version = version;

        match value.get("computer") {
            Some(section) => match serde_json::from_value(section.clone()) {
                Ok(computer) => stats.computer = computer,
                Err(e) => {
                    tracing::debug!(error = %e, "failed to load statistics: computer section")
                }
            },
            None => tracing::debug!("statistics file has no computer section"),
        }

        match value.get("process") {
            Some(section) => match serde_json::from_value(section.clone()) {
                Ok(process) => stats.process = process,
                Err(e) => {
                    tracing::debug!(error = %e, "failed to load statistics: process section")
                }
            },
            None => tracing::debug!("statistics file has no process section"),
        }

        if let Some(section) = value.get("times") {
            match serde_json::from_value(section.clone()) {
                Ok(times) => stats.times = times,
                Err(e) => tracing::debug!(error = %e, "failed to load statistics: times section"),
            }
        }

        if let Some(interval) = value.get("interval").and_then(serde_json::Value::as_f64) {
            stats.interval = interval;
        }

        stats
    }
}
