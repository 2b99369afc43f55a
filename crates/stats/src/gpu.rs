//! External GPU metrics tool query.
//!
//! The sampler never talks to GPU drivers directly; it invokes a
//! configured external tool (by default `nvidia-smi` in CSV query mode)
//! with a bounded timeout. A tool that hangs is killed and its output
//! drained; a field that fails to parse is replaced by the missed-sample
//! sentinel without affecting the other fields.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;

use gridflow_core::CurveSet;

/// Default upper bound on one GPU tool invocation.
pub const GPU_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Curve keys filled by one query, in tool output order.
const GPU_CURVE_KEYS: [&str; 3] = ["gpuMemoryUsed", "gpuUsed", "gpuTemperature"];

#[derive(Debug, thiserror::Error)]
pub enum GpuQueryError {
    #[error("failed to spawn GPU tool: {0}")]
    Spawn(std::io::Error),

    #[error("failed to wait for GPU tool: {0}")]
    Wait(std::io::Error),

    #[error("GPU tool produced no stdout pipe")]
    NoOutput,

    #[error("GPU tool exited with status {0:?}")]
    NonZeroExit(Option<i32>),

    #[error("GPU tool timed out after {0:?}")]
    Timeout(Duration),
}

/// A configured external GPU metrics tool.
#[derive(Debug, Clone)]
pub struct GpuTool {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl GpuTool {
    /// Query `program` with the default nvidia-smi CSV arguments:
    /// memory used (MiB), GPU utilization (%), GPU temperature (°C).
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec![
                "--query-gpu=memory.used,utilization.gpu,temperature.gpu".into(),
                "--format=csv,noheader,nounits".into(),
            ],
            timeout: GPU_QUERY_TIMEOUT,
        }
    }

    /// Query a tool with custom arguments. The tool must print one line
    /// of comma-separated values: memory used, utilization, temperature.
    pub fn with_args(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: GPU_QUERY_TIMEOUT,
        }
    }

    /// Override the per-invocation timeout (default [`GPU_QUERY_TIMEOUT`]).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Append one GPU tick to `curves`.
    ///
    /// Every failure mode (spawn error, timeout, bad exit, parse error)
    /// appends the sentinel for the affected metrics and logs at debug
    /// severity; it never aborts the caller's sampling loop.
    pub async fn sample(&self, curves: &mut CurveSet) {
        match self.query().await {
            Ok(output) => parse_query_line(&output, curves),
            Err(e) => {
                tracing::debug!(tool = %self.program, error = %e, "GPU metrics query failed");
                for key in GPU_CURVE_KEYS {
                    curves.push_missed(key);
                }
            }
        }
    }

    /// One-time device facts: GPU name and total memory in MiB.
    ///
    /// Uses the tool's CSV query interface; tools that do not understand
    /// the nvidia-smi flags simply yield `None` and the record keeps its
    /// defaults.
    pub async fn device_facts(&self) -> Option<(String, f64)> {
        let args = vec![
            "--query-gpu=name,memory.total".to_owned(),
            "--format=csv,noheader,nounits".to_owned(),
        ];
        match self.run_query(&args).await {
            Ok(output) => parse_device_facts(&output),
            Err(e) => {
                tracing::debug!(tool = %self.program, error = %e, "GPU device facts query failed");
                None
            }
        }
    }

    /// Run the tool once with the configured metric arguments.
    async fn query(&self) -> Result<String, GpuQueryError> {
        self.run_query(&self.args).await
    }

    /// Run the tool once and return its stdout.
    async fn run_query(&self, args: &[String]) -> Result<String, GpuQueryError> {
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(GpuQueryError::Spawn)?;

        // Read stdout concurrently so a chatty tool cannot dead-lock on a
        // full pipe while we wait on its exit status.
        let mut stdout = child.stdout.take().ok_or(GpuQueryError::NoOutput)?;
        let reader = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stdout.read_to_string(&mut buf).await;
            buf
        });

        match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) if status.success() => Ok(reader.await.unwrap_or_default()),
            Ok(Ok(status)) => Err(GpuQueryError::NonZeroExit(status.code())),
            Ok(Err(e)) => Err(GpuQueryError::Wait(e)),
            Err(_elapsed) => {
                // Forcibly terminate the tool and drain whatever it wrote.
                let _ = child.kill().await;
                let _ = reader.await;
                Err(GpuQueryError::Timeout(self.timeout))
            }
        }
    }
}

/// Parse one CSV line of `memory.used, utilization.gpu, temperature.gpu`.
///
/// Each field parses independently: a missing or malformed field appends
/// the sentinel for its own curve only.
fn parse_query_line(output: &str, curves: &mut CurveSet) {
    let line = output.lines().next().unwrap_or("");
    let mut fields = line.split(',');

    for key in GPU_CURVE_KEYS {
        match fields.next().map(str::trim).map(str::parse::<f64>) {
            Some(Ok(value)) => curves.push(key, value),
            Some(Err(e)) => {
                tracing::debug!(metric = key, error = %e, "failed to parse GPU metric");
                curves.push_missed(key);
            }
            None => {
                tracing::debug!(metric = key, "GPU metric missing from tool output");
                curves.push_missed(key);
            }
        }
    }
}

/// Parse one CSV line of `name, memory.total`.
fn parse_device_facts(output: &str) -> Option<(String, f64)> {
    let line = output.lines().next()?;
    let (name, memory) = line.rsplit_once(',')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_owned(), memory.trim().parse().ok()?))
}
