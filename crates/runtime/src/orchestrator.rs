//! Compute orchestration: local execution, external submission,
//! cancellation, and the aggregate computing state.
//!
//! One orchestrator owns at most one local execution task at a time
//! (single-flight) plus a [`StatusMonitor`] scoped to the current
//! dependency-ordered chunk list. External computation is only ever
//! observed through the monitor: a chunk Running or Submitted while no
//! local task is alive means someone else is computing this graph.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use gridflow_core::{Chunk, ChunkStatus, CoreError, Graph, NodeId, Submitter};
use gridflow_events::{ComputeStateEvent, EventBus, StatusEvent};

use crate::config::RuntimeConfig;
use crate::monitor::StatusMonitor;

#[derive(Default)]
struct OrchestratorState {
    local_task: Option<JoinHandle<()>>,
    /// Any monitored chunk is Running.
    running: bool,
    /// Any monitored chunk is Submitted.
    submitted: bool,
    /// Dependency-ordered chunks currently scoped for monitoring.
    chunks: Vec<Arc<dyn Chunk>>,
    background: Vec<JoinHandle<()>>,
}

/// Orchestrates graph computation over a collaborator [`Graph`].
pub struct ComputeOrchestrator {
    graph: Arc<dyn Graph>,
    monitor: Arc<StatusMonitor>,
    submitter: Option<Arc<dyn Submitter>>,
    bus: EventBus<ComputeStateEvent>,
    /// True from just before the local task spawns until its cleanup.
    local_active: AtomicBool,
    state: Mutex<OrchestratorState>,
}

impl ComputeOrchestrator {
    pub fn new(
        graph: Arc<dyn Graph>,
        config: &RuntimeConfig,
        submitter: Option<Arc<dyn Submitter>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            graph,
            monitor: Arc::new(StatusMonitor::new(config.poll_interval)),
            submitter,
            bus: EventBus::default(),
            local_active: AtomicBool::new(false),
            state: Mutex::new(OrchestratorState::default()),
        })
    }

    /// Begin monitoring and reacting: spawns the status poll loop, the
    /// aggregate-state listener, and the graph-structure listener, then
    /// scopes the monitor to the current chunk list.
    pub fn start(self: &Arc<Self>) {
        let mut handles = vec![self.monitor.spawn_polling()];

        {
            let this = Arc::clone(self);
            let mut rx = self.monitor.subscribe();
            handles.push(tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(StatusEvent { .. }) => this.refresh_compute_state(),
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }));
        }

        {
            let this = Arc::clone(self);
            let mut rx = self.graph.subscribe_structure();
            handles.push(tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(()) => this.update_chunks(),
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }));
        }

        self.state().background.extend(handles);
        self.update_chunks();
    }

    /// Stop background monitoring. Does not touch a running local
    /// execution task; use [`stop_execution`](Self::stop_execution).
    pub fn shutdown(&self) {
        for handle in self.state().background.drain(..) {
            handle.abort();
        }
        self.monitor.clear();
    }

    /// Subscribe to aggregate computing-state notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ComputeStateEvent> {
        self.bus.subscribe()
    }

    pub fn monitor(&self) -> &Arc<StatusMonitor> {
        &self.monitor
    }

    // -----------------------------------------------------------------
    // Aggregate state
    // -----------------------------------------------------------------

    /// Whether this orchestrator's own execution task is alive.
    pub fn computing_locally(&self) -> bool {
        self.local_active.load(Ordering::SeqCst)
    }

    /// Whether the graph is being computed elsewhere: some monitored
    /// chunk is Running or Submitted while no local task is alive.
    pub fn computing_externally(&self) -> bool {
        let state = self.state();
        (state.running || state.submitted) && !self.computing_locally()
    }

    /// Whether the graph is being computed at all.
    pub fn computing(&self) -> bool {
        self.computing_locally() || self.computing_externally()
    }

    /// Recompute the aggregate flags from monitored chunk statuses.
    ///
    /// Called on every monitor notification; publishes a
    /// [`ComputeStateEvent`] only when the flags actually changed.
    pub fn refresh_compute_state(&self) {
        let mut state = self.state();
        let running = state
            .chunks
            .iter()
            .any(|chunk| chunk.status() == ChunkStatus::Running);
        let submitted = state
            .chunks
            .iter()
            .any(|chunk| chunk.status() == ChunkStatus::Submitted);

        if state.running != running || state.submitted != submitted {
            state.running = running;
            state.submitted = submitted;
            let event = self.snapshot(&state);
            drop(state);
            self.bus.publish(event);
        }
    }

    // -----------------------------------------------------------------
    // Chunk list scoping
    // -----------------------------------------------------------------

    /// Recompute the dependency-ordered chunk list from the graph.
    ///
    /// When the recomputed list is identical in identity and order to
    /// the current one, the monitor keeps its existing subscriptions
    /// (no churn). Otherwise the monitored set is replaced.
    pub fn update_chunks(&self) {
        let nodes = self.graph.finish_ordered_nodes(None);
        let chunks = self.graph.chunks_for(&nodes);

        let mut state = self.state();
        let unchanged = state.chunks.len() == chunks.len()
            && state
                .chunks
                .iter()
                .zip(&chunks)
                .all(|(current, new)| Arc::ptr_eq(current, new));
        if unchanged {
            return;
        }
        state.chunks = chunks.clone();
        drop(state);

        self.monitor.set_chunks(&chunks);
    }

    /// The chunks currently scoped for monitoring, in dependency order.
    pub fn ordered_chunks(&self) -> Vec<Arc<dyn Chunk>> {
        self.state().chunks.clone()
    }

    // -----------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------

    /// Execute the dependency closure of `target` (or the whole graph)
    /// on a background task.
    ///
    /// No-op while anything is computing, locally or externally: at most
    /// one local execution task exists per orchestrator. Returns whether
    /// a task was spawned. A state-change notification fires when the
    /// task starts and — on a guaranteed-cleanup path — when it
    /// finishes, success, error and panic alike.
    pub fn execute(self: &Arc<Self>, target: Option<&NodeId>) -> bool {
        let mut state = self.state();
        if self.computing_locally() || state.running || state.submitted {
            tracing::debug!("already computing, ignoring execute request");
            return false;
        }

        let targets = target.map(|node| vec![node.clone()]);
        self.local_active.store(true, Ordering::SeqCst);

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            this.publish_state();

            // Run the collaborator procedure in its own task so that
            // even a panic lands here as a JoinError instead of skipping
            // the cleanup below.
            let graph = Arc::clone(&this.graph);
            let inner = tokio::spawn(async move { graph.execute(targets).await });
            match inner.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "error during graph execution"),
                Err(e) => tracing::error!(error = %e, "graph execution task failed"),
            }

            this.local_active.store(false, Ordering::SeqCst);
            this.publish_state();
        });
        state.local_task = Some(handle);
        true
    }

    /// Signal cancellation to the running procedure and block until the
    /// execution task has fully exited. No-op unless computing locally,
    /// so no state mutation can race past this call's return.
    ///
    /// The state-change notification comes from the task's own cleanup
    /// path; awaiting the task here guarantees it has been published by
    /// the time this returns, without emitting the same snapshot twice.
    pub async fn stop_execution(&self) {
        if !self.computing_locally() {
            return;
        }
        self.graph.request_stop();
        let handle = self.state().local_task.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Hand the graph to the configured external submitter.
    ///
    /// The graph is saved first — a durable precondition for the
    /// hand-off. Submission failures propagate directly to the caller;
    /// no background task isolates this path.
    pub fn submit(&self, target: Option<&NodeId>) -> Result<(), CoreError> {
        self.graph.save(None)?;
        let submitter = self
            .submitter
            .as_ref()
            .ok_or_else(|| CoreError::Submission("no submitter configured".into()))?;
        let targets = target.map(|node| vec![node.clone()]);
        submitter.submit(self.graph.as_ref(), targets.as_deref())
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    fn snapshot(&self, state: &OrchestratorState) -> ComputeStateEvent {
        let locally = self.computing_locally();
        ComputeStateEvent {
            computing_locally: locally,
            computing_externally: (state.running || state.submitted) && !locally,
        }
    }

    fn publish_state(&self) {
        let state = self.state();
        let event = self.snapshot(&state);
        drop(state);
        self.bus.publish(event);
    }

    fn state(&self) -> MutexGuard<'_, OrchestratorState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
