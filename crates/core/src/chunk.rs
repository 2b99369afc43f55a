//! The chunk collaborator interface.
//!
//! A chunk is one schedulable unit of work with a persisted status file
//! and a durable statistics record. Chunks are owned by the graph
//! collaborator; the runtime layer only holds non-owning references to
//! them (the monitor keeps `Weak` handles, see `gridflow-runtime`).

use std::path::PathBuf;

use tokio::sync::broadcast;

use crate::error::CoreError;
use crate::record::Statistics;
use crate::status::ChunkStatus;
use crate::types::{ChunkId, LogLevel};

/// One schedulable unit of work, as consumed by the runtime layer.
///
/// The status file named by [`status_file`](Chunk::status_file) is the
/// single source of truth for the chunk's status. It is written
/// atomically by whichever process currently owns the chunk; the runtime
/// only ever reads it.
pub trait Chunk: Send + Sync {
    /// Stable identity, used as a lookup key by the monitor.
    fn id(&self) -> ChunkId;

    /// Path of the status file. May live on a shared or network
    /// filesystem and be mutated by a different host.
    fn status_file(&self) -> PathBuf;

    /// Path of the chunk's execution log file.
    fn log_file(&self) -> PathBuf;

    /// Path of the chunk's statistics record.
    fn statistics_file(&self) -> PathBuf;

    /// Current cached status.
    fn status(&self) -> ChunkStatus;

    /// Minimum severity for the chunk's log file, when configured.
    fn verbosity(&self) -> Option<LogLevel> {
        None
    }

    /// Subscribe to status changes announced by the chunk itself.
    ///
    /// This is the low-latency path for local work; out-of-process
    /// mutation is only ever discovered by polling the status file.
    fn subscribe_status(&self) -> broadcast::Receiver<ChunkStatus>;

    /// Re-read the cached status from the status file.
    ///
    /// This is a cache refresh, not a state transition: implementations
    /// must not re-emit the status event from here, otherwise the monitor
    /// would notify twice for a single on-disk change.
    fn refresh_status_from_storage(&self);

    /// Persist the chunk's statistics record.
    ///
    /// Called by the sampling task after every tick. The default writes
    /// the record to [`statistics_file`](Chunk::statistics_file).
    fn persist_statistics(&self, statistics: &Statistics) -> Result<(), CoreError> {
        statistics.save(&self.statistics_file())
    }
}
