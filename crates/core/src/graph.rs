//! Graph and submitter collaborator interfaces.
//!
//! The pipeline graph (nodes, edges, dependency resolution, persistence)
//! lives outside this workspace. The runtime layer consumes it through
//! [`Graph`]: a finish-ordered traversal, chunk extraction, idempotent
//! structural mutation, load/save, a structural-change event, and the
//! execution procedure itself.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::chunk::Chunk;
use crate::error::CoreError;
use crate::types::NodeId;

/// The pipeline graph collaborator.
#[async_trait]
pub trait Graph: Send + Sync {
    /// Nodes in finish order (dependencies before dependents), restricted
    /// to the dependency closure of `target` when given.
    fn finish_ordered_nodes(&self, target: Option<&NodeId>) -> Vec<NodeId>;

    /// The chunks of the given nodes, in node order.
    fn chunks_for(&self, nodes: &[NodeId]) -> Vec<Arc<dyn Chunk>>;

    fn contains_node(&self, id: &NodeId) -> bool;

    /// Add a node. Returns `false` if it already existed (idempotent).
    fn add_node(&self, id: NodeId) -> bool;

    /// Remove a node. Returns `false` if it was absent (idempotent).
    fn remove_node(&self, id: &NodeId) -> bool;

    /// Add an edge `from -> to`. Returns `false` if it already existed.
    fn add_edge(&self, from: &NodeId, to: &NodeId) -> bool;

    /// Remove an edge. Returns `false` if it was absent.
    fn remove_edge(&self, from: &NodeId, to: &NodeId) -> bool;

    fn load(&self, path: &Path) -> Result<(), CoreError>;

    /// Save the graph; `None` re-saves to the path it was loaded from.
    fn save(&self, path: Option<&Path>) -> Result<(), CoreError>;

    /// Subscribe to structural changes (nodes or edges added/removed).
    fn subscribe_structure(&self) -> broadcast::Receiver<()>;

    /// Execute the dependency closure of `targets` (or the whole graph).
    ///
    /// Runs chunk by chunk until completion, failure, or a stop request.
    /// Must observe [`request_stop`](Graph::request_stop) at chunk
    /// boundaries and return promptly once it fires.
    async fn execute(&self, targets: Option<Vec<NodeId>>) -> Result<(), CoreError>;

    /// Ask a running [`execute`](Graph::execute) to stop cooperatively.
    fn request_stop(&self);
}

/// External scheduler hand-off.
///
/// Submission is synchronous bookkeeping (writing a job description,
/// calling a scheduler API); it never spawns a local execution thread,
/// so failures propagate directly to the caller.
pub trait Submitter: Send + Sync {
    fn submit(&self, graph: &dyn Graph, targets: Option<&[NodeId]>) -> Result<(), CoreError>;
}
