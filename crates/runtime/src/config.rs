//! Environment-driven runtime configuration.
//!
//! | Variable                         | Default      | Description                                |
//! |----------------------------------|--------------|--------------------------------------------|
//! | `GRIDFLOW_POLL_INTERVAL_SECS`    | `5`          | Seconds between status-file polls          |
//! | `GRIDFLOW_SAMPLING_INTERVAL_SECS`| `10`         | Seconds between resource-sampling ticks    |
//! | `GRIDFLOW_GPU_TOOL`              | `nvidia-smi` | GPU metrics tool; empty string disables it |

use std::time::Duration;

/// Default interval between status-file polls.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Default interval between resource-sampling ticks.
const DEFAULT_SAMPLING_INTERVAL_SECS: u64 = 10;

/// Default GPU metrics tool, expected on `PATH`.
const DEFAULT_GPU_TOOL: &str = "nvidia-smi";

/// Runtime settings shared by the monitor and the sampling layer.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub poll_interval: Duration,
    pub sampling_interval: Duration,
    /// GPU metrics tool program, `None` to skip GPU metrics entirely.
    pub gpu_tool: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            sampling_interval: Duration::from_secs(DEFAULT_SAMPLING_INTERVAL_SECS),
            gpu_tool: Some(DEFAULT_GPU_TOOL.to_owned()),
        }
    }
}

impl RuntimeConfig {
    /// Load from the environment, falling back to defaults. Reads a
    /// `.env` file first when present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let poll_secs = env_u64("GRIDFLOW_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS);
        let sampling_secs = env_u64(
            "GRIDFLOW_SAMPLING_INTERVAL_SECS",
            DEFAULT_SAMPLING_INTERVAL_SECS,
        );

        // Unset → default tool; set but empty → GPU metrics disabled.
        let gpu_tool = match std::env::var("GRIDFLOW_GPU_TOOL") {
            Ok(tool) if tool.is_empty() => None,
            Ok(tool) => Some(tool),
            Err(_) => Some(DEFAULT_GPU_TOOL.to_owned()),
        };

        Self {
            poll_interval: Duration::from_secs(poll_secs),
            sampling_interval: Duration::from_secs(sampling_secs),
            gpu_tool,
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
