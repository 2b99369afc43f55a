//! Resource telemetry and per-chunk logging for gridflow.
//!
//! This crate covers the leaf runtime components driven by whatever
//! executes a chunk:
//!
//! - [`StatSampler`] — one host + process resource snapshot per tick,
//!   including an optional external GPU metrics tool query.
//! - [`SamplingThread`] — drives the sampler at a fixed interval for one
//!   chunk and persists the record after every tick.
//! - [`ChunkLogger`] — structured per-chunk log file with an in-place
//!   updated ASCII progress bar.
//! - [`cpu_benchmark`] — one-shot CPU performance figure used for
//!   computation-time estimation.

pub mod benchmark;
pub mod gpu;
pub mod logger;
pub mod sampler;
pub mod sampling;

pub use benchmark::cpu_benchmark;
pub use gpu::{GpuTool, GPU_QUERY_TIMEOUT};
pub use logger::ChunkLogger;
pub use sampler::{bytes2human, StatSampler};
pub use sampling::SamplingThread;
