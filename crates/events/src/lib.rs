//! Gridflow event infrastructure.
//!
//! All cross-component notification in the runtime goes through one
//! explicit publish/subscribe bus:
//!
//! - [`EventBus`] — in-process fan-out hub backed by
//!   `tokio::sync::broadcast`.
//! - [`StatusEvent`] — chunk status change notifications emitted by the
//!   status monitor.
//! - [`ComputeStateEvent`] — aggregate computing-state notifications
//!   emitted by the orchestrator.

pub mod bus;

pub use bus::{ComputeStateEvent, EventBus, StatusEvent};
