//! In-memory `Chunk` / `Graph` / `Submitter` implementations for
//! runtime integration tests.

// Each integration test binary compiles its own copy of this module and
// uses a different subset of it.
#![allow(dead_code)]

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};

use gridflow_core::{Chunk, ChunkId, ChunkStatus, CoreError, Graph, NodeId, Submitter};

// ---------------------------------------------------------------------------
// TestChunk
// ---------------------------------------------------------------------------

/// A chunk whose status file lives in a scratch directory.
pub struct TestChunk {
    id: ChunkId,
    dir: PathBuf,
    status: Mutex<ChunkStatus>,
    status_tx: broadcast::Sender<ChunkStatus>,
    refresh_count: AtomicUsize,
}

impl TestChunk {
    pub fn new(dir: PathBuf, id: &str) -> Arc<Self> {
        let (status_tx, _) = broadcast::channel(64);
        Arc::new(Self {
            id: id.to_owned(),
            dir,
            status: Mutex::new(ChunkStatus::None),
            status_tx,
            refresh_count: AtomicUsize::new(0),
        })
    }

    /// Simulate an *external* writer: mutate the status file on disk
    /// without announcing anything. Only polling can discover this.
    pub fn write_status_externally(&self, status: ChunkStatus) {
        fs::write(self.status_file(), status.as_str()).expect("write status file");
    }

    /// Simulate a *local* transition: persist, cache, and announce.
    pub fn set_status_locally(&self, status: ChunkStatus) {
        self.write_status_externally(status);
        *self.status.lock().unwrap() = status;
        let _ = self.status_tx.send(status);
    }

    pub fn remove_status_file(&self) {
        let _ = fs::remove_file(self.status_file());
    }

    pub fn refresh_count(&self) -> usize {
        self.refresh_count.load(Ordering::SeqCst)
    }
}

impl Chunk for TestChunk {
    fn id(&self) -> ChunkId {
        self.id.clone()
    }

    fn status_file(&self) -> PathBuf {
        self.dir.join(format!("{}.status", self.id))
    }

    fn log_file(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.id))
    }

    fn statistics_file(&self) -> PathBuf {
        self.dir.join(format!("{}.statistics.json", self.id))
    }

    fn status(&self) -> ChunkStatus {
        *self.status.lock().unwrap()
    }

    fn subscribe_status(&self) -> broadcast::Receiver<ChunkStatus> {
        self.status_tx.subscribe()
    }

    fn refresh_status_from_storage(&self) {
        self.refresh_count.fetch_add(1, Ordering::SeqCst);
        let status = fs::read_to_string(self.status_file())
            .map(|raw| ChunkStatus::from_str(&raw))
            .unwrap_or(ChunkStatus::None);
        *self.status.lock().unwrap() = status;
        // Cache refresh only: no event is re-emitted from here.
    }
}

// ---------------------------------------------------------------------------
// TestGraph
// ---------------------------------------------------------------------------

/// A graph whose `execute` blocks until released, stopped, or failed.
pub struct TestGraph {
    dir: PathBuf,
    nodes: Mutex<Vec<NodeId>>,
    edges: Mutex<HashSet<(NodeId, NodeId)>>,
    chunks: Mutex<Vec<Arc<TestChunk>>>,
    structure_tx: broadcast::Sender<()>,
    stop_tx: watch::Sender<bool>,
    release_tx: watch::Sender<bool>,
    fail_execution: AtomicBool,
    executions: AtomicUsize,
    saves: AtomicUsize,
}

impl TestGraph {
    pub fn new(dir: PathBuf) -> Arc<Self> {
        let (structure_tx, _) = broadcast::channel(64);
        let (stop_tx, _) = watch::channel(false);
        let (release_tx, _) = watch::channel(false);
        Arc::new(Self {
            dir,
            nodes: Mutex::new(Vec::new()),
            edges: Mutex::new(HashSet::new()),
            chunks: Mutex::new(Vec::new()),
            structure_tx,
            stop_tx,
            release_tx,
            fail_execution: AtomicBool::new(false),
            executions: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
        })
    }

    pub fn add_chunk(&self, chunk: Arc<TestChunk>) {
        self.nodes.lock().unwrap().push(chunk.id());
        self.chunks.lock().unwrap().push(chunk);
        let _ = self.structure_tx.send(());
    }

    /// Let a blocked `execute` finish.
    pub fn release_execution(&self) {
        let _ = self.release_tx.send(true);
    }

    /// Make the next `execute` return an error once released.
    pub fn fail_next_execution(&self) {
        self.fail_execution.store(true, Ordering::SeqCst);
    }

    pub fn execution_count(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Graph for TestGraph {
    fn finish_ordered_nodes(&self, target: Option<&NodeId>) -> Vec<NodeId> {
        let nodes = self.nodes.lock().unwrap().clone();
        match target {
            Some(target) => nodes.into_iter().filter(|n| n == target).collect(),
            None => nodes,
        }
    }

    fn chunks_for(&self, nodes: &[NodeId]) -> Vec<Arc<dyn Chunk>> {
        self.chunks
            .lock()
            .unwrap()
            .iter()
            .filter(|chunk| nodes.contains(&chunk.id()))
            .map(|chunk| chunk.clone() as Arc<dyn Chunk>)
            .collect()
    }

    fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.lock().unwrap().contains(id)
    }

    fn add_node(&self, id: NodeId) -> bool {
        let mut nodes = self.nodes.lock().unwrap();
        if nodes.contains(&id) {
            return false;
        }
        nodes.push(id);
        let _ = self.structure_tx.send(());
        true
    }

    fn remove_node(&self, id: &NodeId) -> bool {
        let mut nodes = self.nodes.lock().unwrap();
        let before = nodes.len();
        nodes.retain(|n| n != id);
        let removed = nodes.len() != before;
        if removed {
            let _ = self.structure_tx.send(());
        }
        removed
    }

    fn add_edge(&self, from: &NodeId, to: &NodeId) -> bool {
        let added = self
            .edges
            .lock()
            .unwrap()
            .insert((from.clone(), to.clone()));
        if added {
            let _ = self.structure_tx.send(());
        }
        added
    }

    fn remove_edge(&self, from: &NodeId, to: &NodeId) -> bool {
        let removed = self
            .edges
            .lock()
            .unwrap()
            .remove(&(from.clone(), to.clone()));
        if removed {
            let _ = self.structure_tx.send(());
        }
        removed
    }

    fn load(&self, _path: &std::path::Path) -> Result<(), CoreError> {
        Ok(())
    }

    fn save(&self, _path: Option<&std::path::Path>) -> Result<(), CoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        fs::write(self.dir.join("graph.saved"), "ok")?;
        Ok(())
    }

    fn subscribe_structure(&self) -> broadcast::Receiver<()> {
        self.structure_tx.subscribe()
    }

    async fn execute(&self, _targets: Option<Vec<NodeId>>) -> Result<(), CoreError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let mut stop_rx = self.stop_tx.subscribe();
        let mut release_rx = self.release_tx.subscribe();

        tokio::select! {
            _ = stop_rx.changed() => Ok(()),
            _ = release_rx.changed() => {
                if self.fail_execution.swap(false, Ordering::SeqCst) {
                    Err(CoreError::Execution("injected failure".into()))
                } else {
                    Ok(())
                }
            }
        }
    }

    fn request_stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

// ---------------------------------------------------------------------------
// TestSubmitter
// ---------------------------------------------------------------------------

/// Records, per submission, the graph save count observed at call time.
pub struct TestSubmitter {
    graph: Arc<TestGraph>,
    pub calls: Mutex<Vec<usize>>,
    pub fail: AtomicBool,
}

impl TestSubmitter {
    pub fn observing(graph: Arc<TestGraph>) -> Arc<Self> {
        Arc::new(Self {
            graph,
            calls: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        })
    }
}

impl Submitter for TestSubmitter {
    fn submit(&self, _graph: &dyn Graph, _targets: Option<&[NodeId]>) -> Result<(), CoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CoreError::Submission("scheduler unavailable".into()));
        }
        self.calls.lock().unwrap().push(self.graph.save_count());
        Ok(())
    }
}

/// Poll `condition` until it holds or the timeout expires.
pub async fn wait_until(condition: impl Fn() -> bool) -> bool {
    for _ in 0..250 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
