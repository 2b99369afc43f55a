//! Gridflow runtime: status reconciliation and compute orchestration.
//!
//! - [`StatusMonitor`] — keeps the in-memory view of a set of chunks'
//!   statuses consistent with their on-disk status files by polling
//!   modification times, tolerating out-of-process and out-of-host
//!   mutation (shared or network filesystems included).
//! - [`ComputeOrchestrator`] — composes the monitor with a single-flight
//!   local execution task and an external-submission path, and derives
//!   the aggregate "is anything computing" state.
//! - [`RuntimeConfig`] — environment-driven runtime settings.

pub mod config;
pub mod monitor;
pub mod orchestrator;

pub use config::RuntimeConfig;
pub use monitor::{file_mod_time, StatusMonitor, MOD_TIME_NONE};
pub use orchestrator::ComputeOrchestrator;
