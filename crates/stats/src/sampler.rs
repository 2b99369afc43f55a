//! Host and process resource sampling.
//!
//! [`StatSampler::update`] appends exactly one tick to a chunk's
//! [`Statistics`] record: per-core CPU, RAM, swap, a VRAM placeholder and
//! disk I/O counters for the host; CPU, memory, threads, status, I/O and
//! context-switch counters for the executing process; plus GPU metrics
//! when an external tool is configured.
//!
//! A metric that cannot be collected on a tick appends
//! [`MISSED_SAMPLE`] instead of being skipped, so every curve stays
//! aligned with the shared timestamp sequence.

use std::time::{SystemTime, UNIX_EPOCH};

use sysinfo::{Pid, ProcessStatus, System};

use gridflow_core::record::ComputerRecord;
use gridflow_core::{CurveSet, Statistics};

use crate::gpu::GpuTool;

const BYTES_PER_GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Sector size assumed for `/proc/diskstats` byte conversion.
#[cfg(target_os = "linux")]
const SECTOR_SIZE: u64 = 512;

const IO_COUNTER_FIELDS: [&str; 4] = ["read_bytes", "read_count", "write_bytes", "write_count"];

/// Samples one process and its host, one snapshot per [`update`] call.
///
/// Each sampler owns its own [`System`] handle, so concurrently
/// executing chunks sample independently without shared mutable state.
///
/// [`update`]: StatSampler::update
pub struct StatSampler {
    system: System,
    pid: Pid,
    gpu: Option<GpuTool>,
    host_facts_recorded: bool,
}

impl StatSampler {
    /// Sampler for an arbitrary process id.
    pub fn new(pid: u32, gpu: Option<GpuTool>) -> Self {
        Self {
            system: System::new(),
            pid: Pid::from_u32(pid),
            gpu,
            host_facts_recorded: false,
        }
    }

    /// Sampler for the current process — the common case, since a chunk
    /// executes its external computation from within this process.
    pub fn for_current_process(gpu: Option<GpuTool>) -> Self {
        Self::new(std::process::id(), gpu)
    }

    /// Append one tick to `statistics`.
    ///
    /// Returns `false` without appending anything when the target process
    /// has disappeared — the expected end-of-life condition for the
    /// sampling loop, not a fault.
    pub async fn update(&mut self, statistics: &mut Statistics) -> bool {
        self.system.refresh_cpu();
        self.system.refresh_memory();
        if !self.system.refresh_process(self.pid) || self.system.process(self.pid).is_none() {
            return false;
        }

        statistics.times.push(unix_now_secs());

        if !self.host_facts_recorded {
            self.record_host_facts(&mut statistics.computer);
            if let Some(gpu) = &self.gpu {
                if let Some((name, memory_total)) = gpu.device_facts().await {
                    statistics.computer.gpu_name = name;
                    statistics.computer.gpu_memory_total = memory_total;
                }
            }
            self.host_facts_recorded = true;
        }

        self.sample_host(&mut statistics.computer.curves);
        self.sample_process(&mut statistics.process.curves);

        if let Some(gpu) = &self.gpu {
            gpu.sample(&mut statistics.computer.curves).await;
        }
        true
    }

    /// One-time host facts, captured on the first tick only.
    fn record_host_facts(&self, computer: &mut ComputerRecord) {
        computer.nb_cores = self.system.cpus().len();
        computer.cpu_freq = self
            .system
            .cpus()
            .first()
            .map(|cpu| cpu.frequency() as f64)
            .unwrap_or(0.0);
        computer.ram_total = self.system.total_memory() as f64 / BYTES_PER_GIB;
    }

    fn sample_host(&self, curves: &mut CurveSet) {
        for (i, cpu) in self.system.cpus().iter().enumerate() {
            curves.push(&format!("cpuUsage.{i}"), f64::from(cpu.cpu_usage()));
        }

        curves.push(
            "ramUsage",
            percent(self.system.used_memory(), self.system.total_memory()),
        );
        curves.push(
            "swapUsage",
            percent(self.system.used_swap(), self.system.total_swap()),
        );
        // VRAM is not sampled directly; the GPU tool reports memory use.
        curves.push("vramUsage", 0.0);

        match host_io_counters() {
            Some(io) => curves.push_value("ioCounters", &io),
            None => {
                for field in IO_COUNTER_FIELDS {
                    curves.push_missed(&format!("ioCounters.{field}"));
                }
            }
        }
    }

    fn sample_process(&self, curves: &mut CurveSet) {
        // The caller refreshed the process and checked liveness; a lookup
        // miss here means it died between the two calls.
        let Some(process) = self.system.process(self.pid) else {
            return;
        };

        curves.push("cpu_percent", f64::from(process.cpu_usage()));
        curves.push(
            "memory_percent",
            percent(process.memory(), self.system.total_memory()),
        );
        curves.push("memory_info.rss", process.memory() as f64);
        curves.push("memory_info.vms", process.virtual_memory() as f64);
        curves.push("status", status_code(process.status()));

        match proc_io_counters(self.pid.as_u32()) {
            Some(io) => curves.push_value("io_counters", &io),
            None => {
                // Fall back to byte totals only; the syscall counts have
                // no portable source.
                let disk = process.disk_usage();
                curves.push_value(
                    "io_counters",
                    &serde_json::json!({
                        "read_bytes": disk.total_read_bytes,
                        "write_bytes": disk.total_written_bytes,
                    }),
                );
                curves.push_missed("io_counters.read_count");
                curves.push_missed("io_counters.write_count");
            }
        }

        match proc_task_counters(self.pid.as_u32()) {
            Some(counters) => {
                curves.push("num_threads", counters.threads);
                curves.push("num_ctx_switches.voluntary", counters.voluntary_ctx_switches);
                curves.push(
                    "num_ctx_switches.involuntary",
                    counters.involuntary_ctx_switches,
                );
            }
            None => {
                curves.push_missed("num_threads");
                curves.push_missed("num_ctx_switches.voluntary");
                curves.push_missed("num_ctx_switches.involuntary");
            }
        }
    }
}

/// Convert a byte count to the largest fitting binary unit with two
/// decimal places, falling back to raw bytes below 1 KB.
///
/// ```
/// use gridflow_stats::bytes2human;
/// assert_eq!(bytes2human(10_000), "9.77 KB");
/// assert_eq!(bytes2human(100_001_221), "95.37 MB");
/// ```
pub fn bytes2human(n: u64) -> String {
    const SYMBOLS: [&str; 8] = ["K", "M", "G", "T", "P", "E", "Z", "Y"];
    let value = n as f64;
    for (i, symbol) in SYMBOLS.iter().enumerate().rev() {
        let unit = 1024f64.powi(i as i32 + 1);
        if value >= unit {
            return format!("{:.2} {}B", value / unit, symbol);
        }
    }
    format!("{value:.2} B")
}

fn unix_now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    used as f64 / total as f64 * 100.0
}

/// Numeric encoding of the process status for scalar curves.
fn status_code(status: ProcessStatus) -> f64 {
    match status {
        ProcessStatus::Run => 0.0,
        ProcessStatus::Sleep => 1.0,
        ProcessStatus::Idle => 2.0,
        ProcessStatus::Stop => 3.0,
        ProcessStatus::Zombie => 4.0,
        ProcessStatus::Tracing => 5.0,
        ProcessStatus::Dead => 6.0,
        ProcessStatus::Parked => 7.0,
        ProcessStatus::LockBlocked => 8.0,
        ProcessStatus::UninterruptibleDiskSleep => 9.0,
        ProcessStatus::Waking => 10.0,
        ProcessStatus::Wakekill => 11.0,
        _ => gridflow_core::MISSED_SAMPLE,
    }
}

/// Thread and context-switch counters read from `/proc/<pid>/status`.
struct TaskCounters {
    threads: f64,
    voluntary_ctx_switches: f64,
    involuntary_ctx_switches: f64,
}

#[cfg(target_os = "linux")]
fn proc_task_counters(pid: u32) -> Option<TaskCounters> {
    let status = std::fs::read_to_string(format!("/proc/{pid}/status")).ok()?;
    let field = |name: &str| -> Option<f64> {
        status
            .lines()
            .find(|line| line.starts_with(name))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|v| v.parse().ok())
    };
    Some(TaskCounters {
        threads: field("Threads:")?,
        voluntary_ctx_switches: field("voluntary_ctxt_switches:")?,
        involuntary_ctx_switches: field("nonvoluntary_ctxt_switches:")?,
    })
}

#[cfg(not(target_os = "linux"))]
fn proc_task_counters(_pid: u32) -> Option<TaskCounters> {
    None
}

/// Per-process I/O counters (bytes and syscall counts) read from
/// `/proc/<pid>/io`. `None` on platforms without it.
#[cfg(target_os = "linux")]
fn proc_io_counters(pid: u32) -> Option<serde_json::Value> {
    let io = std::fs::read_to_string(format!("/proc/{pid}/io")).ok()?;
    let field = |name: &str| -> Option<u64> {
        io.lines()
            .find(|line| line.starts_with(name))
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|v| v.parse().ok())
    };
    Some(serde_json::json!({
        "read_count": field("syscr:")?,
        "write_count": field("syscw:")?,
        "read_bytes": field("read_bytes:")?,
        "write_bytes": field("write_bytes:")?,
    }))
}

#[cfg(not(target_os = "linux"))]
fn proc_io_counters(_pid: u32) -> Option<serde_json::Value> {
    None
}

/// Host-wide disk I/O counters aggregated over whole-disk devices,
/// from `/proc/diskstats`. `None` on platforms without it.
#[cfg(target_os = "linux")]
fn host_io_counters() -> Option<serde_json::Value> {
    let diskstats = std::fs::read_to_string("/proc/diskstats").ok()?;
    let (mut read_count, mut write_count) = (0u64, 0u64);
    let (mut read_sectors, mut write_sectors) = (0u64, 0u64);

    for line in diskstats.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 10 {
            continue;
        }
        let name = fields[2];
        // Partitions do not appear under /sys/block, only whole disks.
        if !std::path::Path::new(&format!("/sys/block/{name}")).exists() {
            continue;
        }
        read_count += fields[3].parse().unwrap_or(0);
        read_sectors += fields[5].parse().unwrap_or(0);
        write_count += fields[7].parse().unwrap_or(0);
        write_sectors += fields[9].parse().unwrap_or(0);
    }

    Some(serde_json::json!({
        "read_count": read_count,
        "write_count": write_count,
        "read_bytes": read_sectors * SECTOR_SIZE,
        "write_bytes": write_sectors * SECTOR_SIZE,
    }))
}

#[cfg(not(target_os = "linux"))]
fn host_io_counters() -> Option<serde_json::Value> {
    None
}
