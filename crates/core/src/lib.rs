//! Gridflow shared types and collaborator interfaces.
//!
//! This crate holds everything the runtime crates agree on:
//!
//! - [`ChunkStatus`] — the externally-owned status enum the runtime
//!   observes but never invents.
//! - [`CurveSet`] and [`Statistics`] — the resource-telemetry data model
//!   and its persisted schema (version 2.0).
//! - [`Chunk`], [`Graph`] and [`Submitter`] — the collaborator traits at
//!   the boundary of the runtime layer. Graph construction, argument
//!   assembly and persistence of the pipeline itself live behind these
//!   traits, outside this workspace.
//! - [`CoreError`] — the shared error type.

pub mod chunk;
pub mod curves;
pub mod error;
pub mod graph;
pub mod record;
pub mod status;
pub mod types;

pub use chunk::Chunk;
pub use curves::{CurveSet, MISSED_SAMPLE};
pub use error::CoreError;
pub use graph::{Graph, Submitter};
pub use record::{ComputerRecord, ProcessRecord, Statistics, STATS_FILE_VERSION};
pub use status::ChunkStatus;
pub use types::{ChunkId, LogLevel, NodeId};
