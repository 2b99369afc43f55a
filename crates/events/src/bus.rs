//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub used by the status monitor
//! and the compute orchestrator. It is designed to be shared via
//! `Arc` (or embedded in a shared component) across the runtime.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use gridflow_core::{ChunkId, ChunkStatus};

// ---------------------------------------------------------------------------
// Event payloads
// ---------------------------------------------------------------------------

/// A chunk status change observed by the monitor.
///
/// `chunk = None` is the "unknown changed" notification emitted when the
/// monitored set is replaced: observers should force a full refresh
/// rather than update a single chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub chunk: Option<ChunkId>,
    pub status: Option<ChunkStatus>,
}

impl StatusEvent {
    /// A change of one specific chunk.
    pub fn changed(chunk: ChunkId, status: ChunkStatus) -> Self {
        Self {
            chunk: Some(chunk),
            status: Some(status),
        }
    }

    /// The whole monitored set may have changed; refresh everything.
    pub fn all_invalidated() -> Self {
        Self {
            chunk: None,
            status: None,
        }
    }
}

/// Snapshot of the orchestrator's aggregate computing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeStateEvent {
    /// The orchestrator's own execution task is alive.
    pub computing_locally: bool,
    /// Some monitored chunk is Running or Submitted elsewhere.
    pub computing_externally: bool,
}

impl ComputeStateEvent {
    /// Whether anything is computing at all.
    pub fn computing(&self) -> bool {
        self.computing_locally || self.computing_externally
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published event.
pub struct EventBus<E> {
    sender: broadcast::Sender<E>,
}

impl<E: Clone + Send + 'static> EventBus<E> {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are
    /// dropped and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: E) {
        // Ignore the SendError — it only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

impl<E: Clone + Send + 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(StatusEvent::changed("Match.0".into(), ChunkStatus::Running));

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.chunk.as_deref(), Some("Match.0"));
        assert_eq!(received.status, Some(ChunkStatus::Running));
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(StatusEvent::all_invalidated());

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");

        assert!(e1.chunk.is_none());
        assert_eq!(e1, e2);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        // No subscribers — this must not panic.
        bus.publish(ComputeStateEvent {
            computing_locally: true,
            computing_externally: false,
        });
    }

    #[test]
    fn compute_state_aggregates() {
        let idle = ComputeStateEvent {
            computing_locally: false,
            computing_externally: false,
        };
        assert!(!idle.computing());

        let external = ComputeStateEvent {
            computing_locally: false,
            computing_externally: true,
        };
        assert!(external.computing());
    }
}
