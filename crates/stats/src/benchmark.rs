//! One-shot CPU benchmark.
//!
//! A small factorial microbenchmark used to scale computation-time
//! estimates between machines. It runs at most once per process lifetime;
//! subsequent calls return the cached figure. Lower is better.

use std::sync::OnceLock;
use std::time::Instant;

use sysinfo::System;

/// Performance per physical core gained by simultaneous multithreading,
/// applied when the logical core count exceeds the physical one.
const SMT_FACTOR: f64 = 1.3;

static CPU_BENCHMARK: OnceLock<f64> = OnceLock::new();

/// The benchmark figure for this machine, normalized by physical core
/// count and the SMT factor. Computed lazily on first access and cached
/// for the rest of the process lifetime.
pub fn cpu_benchmark() -> f64 {
    *CPU_BENCHMARK.get_or_init(run_benchmark)
}

fn run_benchmark() -> f64 {
    let start = Instant::now();
    for n in 0..1000u32 {
        let mut factorial = 1.0f64;
        for i in 1..=n {
            factorial *= f64::from(i);
        }
        std::hint::black_box(factorial);
    }
    let elapsed = start.elapsed().as_secs_f64();

    let mut system = System::new();
    system.refresh_cpu();
    let logical = system.cpus().len().max(1);
    let physical = system.physical_core_count().unwrap_or(logical).max(1);

    elapsed / physical as f64 / smt_factor(logical, physical)
}

fn smt_factor(logical: usize, physical: usize) -> f64 {
    if logical > physical {
        SMT_FACTOR
    } else {
        1.0
    }
}
