//! Polling-based chunk status reconciliation.
//!
//! Status files may be mutated by another process or another machine
//! (external submission, shared filesystems, manual edits), so
//! filesystem change notification cannot be relied upon. The monitor
//! instead polls each monitored chunk's status-file modification time
//! and compares it against a cached value; any mismatch — including a
//! file appearing or disappearing — is a status change.
//!
//! For local work the monitor also subscribes to each chunk's own status
//! event, refreshing the cached modification time immediately so the
//! next poll tick is a no-op for that chunk and no duplicate
//! notification is produced.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, UNIX_EPOCH};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use gridflow_core::{Chunk, ChunkId, ChunkStatus};
use gridflow_events::{EventBus, StatusEvent};

/// Default interval between status-file polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Sentinel modification time for a file that does not exist.
pub const MOD_TIME_NONE: i64 = -1;

/// Modification time of `path` in nanoseconds since the epoch, or
/// [`MOD_TIME_NONE`] if the file does not exist or cannot be stat-ed.
pub fn file_mod_time(path: &Path) -> i64 {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(MOD_TIME_NONE)
}

/// Cached state for one monitored chunk.
///
/// The chunk reference is non-owning: chunk lifetime belongs to the
/// graph, and a record whose chunk is gone is simply skipped.
struct MonitorRecord {
    id: ChunkId,
    chunk: Weak<dyn Chunk>,
    status_file: PathBuf,
    last_mod_time: i64,
}

#[derive(Default)]
struct MonitorState {
    records: Vec<MonitorRecord>,
    listeners: Vec<JoinHandle<()>>,
}

/// Watches a set of chunks' status files and publishes [`StatusEvent`]s.
pub struct StatusMonitor {
    state: Mutex<MonitorState>,
    bus: EventBus<StatusEvent>,
    poll_interval: Duration,
}

impl Default for StatusMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl StatusMonitor {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            state: Mutex::new(MonitorState::default()),
            bus: EventBus::default(),
            poll_interval,
        }
    }

    /// Subscribe to status change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.bus.subscribe()
    }

    /// Atomically replace the monitored set.
    ///
    /// All prior records and subscriptions are dropped, each new chunk is
    /// recorded and subscribed, then a single "unknown changed"
    /// notification is published so observers force a full refresh.
    pub fn set_chunks(self: &Arc<Self>, chunks: &[Arc<dyn Chunk>]) {
        self.clear();
        {
            let mut state = self.state();
            for chunk in chunks {
                let status_file = chunk.status_file();
                state.records.push(MonitorRecord {
                    id: chunk.id(),
                    chunk: Arc::downgrade(chunk),
                    last_mod_time: file_mod_time(&status_file),
                    status_file,
                });
                state.listeners.push(self.spawn_listener(chunk));
            }
        }
        self.bus.publish(StatusEvent::all_invalidated());
    }

    /// Drop all records and unsubscribe from every chunk.
    pub fn clear(&self) {
        let mut state = self.state();
        for listener in state.listeners.drain(..) {
            listener.abort();
        }
        state.records.clear();
    }

    /// Number of chunks currently monitored.
    pub fn monitored_count(&self) -> usize {
        self.state().records.len()
    }

    /// Compare every record against the status file on disk.
    ///
    /// On a mismatch the record is updated, the chunk's cache-refresh
    /// hook is invoked, and one [`StatusEvent`] is published. Running
    /// this twice with no underlying change publishes nothing.
    pub fn check_all(&self) {
        let mut state = self.state();
        for record in &mut state.records {
            let mod_time = file_mod_time(&record.status_file);
            if mod_time == record.last_mod_time {
                continue;
            }
            record.last_mod_time = mod_time;

            let Some(chunk) = record.chunk.upgrade() else {
                continue;
            };
            chunk.refresh_status_from_storage();
            let status = chunk.status();
            tracing::debug!(chunk = %record.id, status = %status, "chunk status changed on disk");
            self.bus.publish(StatusEvent::changed(record.id.clone(), status));
        }
    }

    /// Drive [`check_all`](StatusMonitor::check_all) at the configured
    /// poll interval. Each tick costs O(monitored chunks) file stats; on
    /// a slow network filesystem that only delays reconciliation, it is
    /// never used for correctness-critical synchronization.
    pub fn spawn_polling(self: &Arc<Self>) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(monitor.poll_interval);
            // The first interval tick completes immediately; skip it so
            // polling starts one full interval after spawn.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                monitor.check_all();
            }
        })
    }

    /// Push path: a chunk announced its own status change (local work).
    ///
    /// Refreshes the stored modification time so the next poll tick sees
    /// no mismatch, then republishes the change.
    fn on_chunk_status_changed(&self, id: &ChunkId, status: ChunkStatus) {
        let mut state = self.state();
        if let Some(record) = state.records.iter_mut().find(|r| &r.id == id) {
            record.last_mod_time = file_mod_time(&record.status_file);
            self.bus.publish(StatusEvent::changed(id.clone(), status));
        }
    }

    fn spawn_listener(self: &Arc<Self>, chunk: &Arc<dyn Chunk>) -> JoinHandle<()> {
        let mut rx = chunk.subscribe_status();
        let monitor = Arc::clone(self);
        let id = chunk.id();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(status) => monitor.on_chunk_status_changed(&id, status),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn state(&self) -> MutexGuard<'_, MonitorState> {
        // A panic while holding this lock leaves no torn state worth
        // preserving; recover from poisoning instead of propagating it.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
