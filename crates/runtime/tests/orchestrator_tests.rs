//! Integration tests for the compute orchestrator: single-flight local
//! execution, cooperative cancellation, external submission, and the
//! aggregate computing state.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use tempfile::tempdir;
use tokio::sync::broadcast;

use gridflow_core::{ChunkStatus, CoreError, Graph};
use gridflow_events::ComputeStateEvent;
use gridflow_runtime::{ComputeOrchestrator, RuntimeConfig};

use common::{wait_until, TestChunk, TestGraph, TestSubmitter};

fn drain(rx: &mut broadcast::Receiver<ComputeStateEvent>) -> Vec<ComputeStateEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(flavor = "multi_thread")]
async fn execute_is_single_flight() {
    let dir = tempdir().expect("tempdir");
    let graph = TestGraph::new(dir.path().to_path_buf());
    let orchestrator =
        ComputeOrchestrator::new(Arc::clone(&graph) as Arc<dyn Graph>, &RuntimeConfig::default(), None);

    assert!(orchestrator.execute(None));
    assert!(wait_until(|| orchestrator.computing_locally()).await);
    assert!(wait_until(|| graph.execution_count() == 1).await);

    // A second request while the first is in flight spawns nothing.
    assert!(!orchestrator.execute(None));
    assert_eq!(graph.execution_count(), 1);

    graph.release_execution();
    assert!(wait_until(|| !orchestrator.computing_locally()).await);
    assert_eq!(graph.execution_count(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn completion_event_fires_even_on_execution_error() {
    let dir = tempdir().expect("tempdir");
    let graph = TestGraph::new(dir.path().to_path_buf());
    let orchestrator =
        ComputeOrchestrator::new(Arc::clone(&graph) as Arc<dyn Graph>, &RuntimeConfig::default(), None);
    let mut rx = orchestrator.subscribe();

    graph.fail_next_execution();
    assert!(orchestrator.execute(None));
    assert!(wait_until(|| graph.execution_count() == 1).await);
    graph.release_execution();
    assert!(wait_until(|| !orchestrator.computing_locally()).await);

    // Give the task a beat to publish its final event.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let events = drain(&mut rx);
    assert!(events.first().is_some_and(|e| e.computing_locally));
    assert!(events.last().is_some_and(|e| !e.computing()));
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_execution_cancels_running_task() {
    let dir = tempdir().expect("tempdir");
    let graph = TestGraph::new(dir.path().to_path_buf());
    let orchestrator =
        ComputeOrchestrator::new(Arc::clone(&graph) as Arc<dyn Graph>, &RuntimeConfig::default(), None);

    assert!(orchestrator.execute(None));
    assert!(wait_until(|| graph.execution_count() == 1).await);

    // Never released: only the stop signal can end this execution.
    orchestrator.stop_execution().await;
    assert!(!orchestrator.computing_locally());
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_publishes_exactly_one_idle_snapshot() {
    let dir = tempdir().expect("tempdir");
    let graph = TestGraph::new(dir.path().to_path_buf());
    let orchestrator =
        ComputeOrchestrator::new(Arc::clone(&graph) as Arc<dyn Graph>, &RuntimeConfig::default(), None);
    let mut rx = orchestrator.subscribe();

    assert!(orchestrator.execute(None));
    assert!(wait_until(|| graph.execution_count() == 1).await);
    orchestrator.stop_execution().await;

    // One event for the start, one from the task's cleanup — a stop must
    // not repeat the idle snapshot subscribers already received.
    let events = drain(&mut rx);
    assert_eq!(events.len(), 2, "got {events:?}");
    assert!(events[0].computing_locally);
    assert!(!events[1].computing());
}

#[tokio::test]
async fn stop_execution_is_noop_while_idle() {
    let dir = tempdir().expect("tempdir");
    let graph = TestGraph::new(dir.path().to_path_buf());
    let orchestrator =
        ComputeOrchestrator::new(graph as Arc<dyn Graph>, &RuntimeConfig::default(), None);
    let mut rx = orchestrator.subscribe();

    orchestrator.stop_execution().await;

    assert!(!orchestrator.computing());
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn submit_saves_graph_before_handing_off() {
    let dir = tempdir().expect("tempdir");
    let graph = TestGraph::new(dir.path().to_path_buf());
    let submitter = TestSubmitter::observing(Arc::clone(&graph));
    let orchestrator = ComputeOrchestrator::new(
        Arc::clone(&graph) as Arc<dyn Graph>,
        &RuntimeConfig::default(),
        Some(Arc::clone(&submitter) as Arc<dyn gridflow_core::Submitter>),
    );

    orchestrator.submit(None).expect("submission should succeed");

    // The submitter observed exactly one save already on disk.
    assert_eq!(*submitter.calls.lock().unwrap(), vec![1]);
    assert!(dir.path().join("graph.saved").exists());
}

#[tokio::test]
async fn submit_without_submitter_is_an_error() {
    let dir = tempdir().expect("tempdir");
    let graph = TestGraph::new(dir.path().to_path_buf());
    let orchestrator = ComputeOrchestrator::new(
        Arc::clone(&graph) as Arc<dyn Graph>,
        &RuntimeConfig::default(),
        None,
    );

    assert_matches!(orchestrator.submit(None), Err(CoreError::Submission(_)));
    // The save precedes the submitter lookup.
    assert_eq!(graph.save_count(), 1);
}

#[tokio::test]
async fn submit_propagates_submitter_failure() {
    let dir = tempdir().expect("tempdir");
    let graph = TestGraph::new(dir.path().to_path_buf());
    let submitter = TestSubmitter::observing(Arc::clone(&graph));
    submitter.fail.store(true, std::sync::atomic::Ordering::SeqCst);
    let orchestrator = ComputeOrchestrator::new(
        graph as Arc<dyn Graph>,
        &RuntimeConfig::default(),
        Some(submitter as Arc<dyn gridflow_core::Submitter>),
    );

    assert_matches!(orchestrator.submit(None), Err(CoreError::Submission(_)));
}

#[tokio::test]
async fn external_computation_blocks_local_execution() {
    let dir = tempdir().expect("tempdir");
    let graph = TestGraph::new(dir.path().to_path_buf());
    let chunk = TestChunk::new(dir.path().to_path_buf(), "Match.0");
    chunk.set_status_locally(ChunkStatus::Submitted);
    graph.add_chunk(Arc::clone(&chunk));

    let orchestrator =
        ComputeOrchestrator::new(Arc::clone(&graph) as Arc<dyn Graph>, &RuntimeConfig::default(), None);
    orchestrator.update_chunks();
    orchestrator.refresh_compute_state();

    assert!(orchestrator.computing_externally());
    assert!(!orchestrator.execute(None));
    assert_eq!(graph.execution_count(), 0);
}

#[tokio::test]
async fn refresh_compute_state_publishes_only_on_change() {
    let dir = tempdir().expect("tempdir");
    let graph = TestGraph::new(dir.path().to_path_buf());
    let chunk = TestChunk::new(dir.path().to_path_buf(), "Depth.2");
    graph.add_chunk(Arc::clone(&chunk));

    let orchestrator =
        ComputeOrchestrator::new(Arc::clone(&graph) as Arc<dyn Graph>, &RuntimeConfig::default(), None);
    orchestrator.update_chunks();
    let mut rx = orchestrator.subscribe();

    chunk.set_status_locally(ChunkStatus::Running);
    orchestrator.refresh_compute_state();
    orchestrator.refresh_compute_state();

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert!(events[0].computing_externally);
}

#[tokio::test]
async fn update_chunks_keeps_monitor_when_list_is_identical() {
    let dir = tempdir().expect("tempdir");
    let graph = TestGraph::new(dir.path().to_path_buf());
    graph.add_chunk(TestChunk::new(dir.path().to_path_buf(), "Sfm.0"));

    let orchestrator =
        ComputeOrchestrator::new(Arc::clone(&graph) as Arc<dyn Graph>, &RuntimeConfig::default(), None);
    let mut rx = orchestrator.monitor().subscribe();

    orchestrator.update_chunks();
    assert!(rx.try_recv().is_ok(), "new list should invalidate");

    // Same chunks in the same order: no monitor churn.
    orchestrator.update_chunks();
    assert!(rx.try_recv().is_err());

    graph.add_chunk(TestChunk::new(dir.path().to_path_buf(), "Mesh.0"));
    orchestrator.update_chunks();
    assert!(rx.try_recv().is_ok(), "a grown list should invalidate");
    assert_eq!(orchestrator.monitor().monitored_count(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn started_orchestrator_reacts_to_external_status_writes() {
    let dir = tempdir().expect("tempdir");
    let graph = TestGraph::new(dir.path().to_path_buf());
    let chunk = TestChunk::new(dir.path().to_path_buf(), "Texture.0");
    chunk.write_status_externally(ChunkStatus::Ready);
    graph.add_chunk(Arc::clone(&chunk));

    let config = RuntimeConfig {
        poll_interval: Duration::from_millis(20),
        ..RuntimeConfig::default()
    };
    let orchestrator = ComputeOrchestrator::new(Arc::clone(&graph) as Arc<dyn Graph>, &config, None);
    orchestrator.start();
    assert!(!orchestrator.computing());

    // Another process flips the chunk to Running on disk; the poll loop
    // must pick it up and flow it into the aggregate state.
    tokio::time::sleep(Duration::from_millis(50)).await;
    chunk.write_status_externally(ChunkStatus::Running);
    assert!(wait_until(|| orchestrator.computing_externally()).await);

    orchestrator.shutdown();
    assert_eq!(orchestrator.monitor().monitored_count(), 0);
}
