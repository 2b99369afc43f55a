//! Per-chunk sampling task.
//!
//! One [`SamplingThread`] runs per actively executing chunk. It takes an
//! immediate first sample (so even very short-lived work leaves at least
//! one tick), then samples every `interval` until it is asked to stop, at
//! which point it takes exactly one final sample — only if the target
//! process is still alive — and exits. A process that disappears
//! mid-loop ends the task silently; that is the expected end of life,
//! not a fault.
//!
//! Stop is cooperative: [`request_stop`](SamplingThread::request_stop)
//! signals the wait point, it never kills the task.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use gridflow_core::{Chunk, Statistics};

use crate::sampler::StatSampler;

/// Handle to one chunk's background sampling loop.
pub struct SamplingThread {
    handle: JoinHandle<()>,
    stop_tx: watch::Sender<bool>,
}

impl SamplingThread {
    /// Start sampling `chunk`'s process at a fixed interval.
    ///
    /// The statistics record is created here, mutated only by this task,
    /// and persisted through [`Chunk::persist_statistics`] after every
    /// tick plus once more after the final tick.
    pub fn spawn(chunk: Arc<dyn Chunk>, sampler: StatSampler, interval: Duration) -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run(chunk, sampler, interval, stop_rx));
        Self { handle, stop_tx }
    }

    /// Ask the task to exit as soon as possible (cooperative).
    pub fn request_stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task to exit.
    pub async fn join(self) {
        let _ = self.handle.await;
    }

    /// Request a stop and wait for the final sample to be persisted.
    pub async fn stop(self) {
        self.request_stop();
        self.join().await;
    }
}

async fn run(
    chunk: Arc<dyn Chunk>,
    mut sampler: StatSampler,
    interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    let started = Instant::now();
    let mut statistics = Statistics::new(interval.as_secs_f64());

    // Immediate first sample: short-lived work still gets one tick. A
    // process that is already gone ends the task right away.
    if !sample_and_persist(&chunk, &mut sampler, &mut statistics, started).await {
        return;
    }

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                if !sample_and_persist(&chunk, &mut sampler, &mut statistics, started).await {
                    return;
                }
            }
            _ = stop_rx.changed() => {
                // Stop requested: one accurate final sample, skipped if
                // the process already exited.
                let _ = sample_and_persist(&chunk, &mut sampler, &mut statistics, started).await;
                return;
            }
        }
    }
}

/// Take one sample and persist the record. Returns `false` when the
/// target process has disappeared (nothing was appended or persisted).
async fn sample_and_persist(
    chunk: &Arc<dyn Chunk>,
    sampler: &mut StatSampler,
    statistics: &mut Statistics,
    started: Instant,
) -> bool {
    if !sampler.update(statistics).await {
        return false;
    }
    statistics.process.duration = started.elapsed().as_secs_f64();
    if let Err(e) = chunk.persist_statistics(statistics) {
        tracing::debug!(chunk = %chunk.id(), error = %e, "failed to persist statistics");
    }
    true
}
