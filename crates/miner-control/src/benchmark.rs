//! Synthetic-workload benchmark mode.
//!
//! Mutually exclusive with the run loop: the controller invokes this once
//! and the process exits with its result. The measurement window starts
//! strictly after the warm-up sleep so warm-up time never contaminates the
//! throughput denominator.

use std::time::Duration;

use engine::{format_hashrate, unix_millis, Engine, EngineMode, WorkPayload, WorkerStats};
use miner_config::MinerConfig;

use crate::control::ControlHandle;
use crate::controller::engine_options;
use crate::params::{BenchmarkSpec, ProcessParameters};

/// Throughput of one worker over the measurement window.
#[derive(Clone, Debug)]
pub struct BackendThroughput {
    pub name: String,
    pub hash_count: u64,
    pub elapsed_ms: u64,
    pub rate: f64,
}

#[derive(Clone, Debug)]
pub struct BenchmarkResult {
    pub per_worker: Vec<BackendThroughput>,
    pub total_rate: f64,
}

/// Per-worker rate = hashes / (last stamp - measurement start), in seconds.
/// A worker that never stamped inside the window reports zero.
pub fn compute_throughput(stats: &[WorkerStats], start_stamp_ms: u64) -> BenchmarkResult {
    let mut per_worker = Vec::with_capacity(stats.len());
    let mut total_rate = 0.0;
    for s in stats {
        let elapsed_ms = s.last_timestamp_ms.saturating_sub(start_stamp_ms);
        let rate = if elapsed_ms == 0 {
            0.0
        } else {
            s.hash_count as f64 / (elapsed_ms as f64 / 1000.0)
        };
        total_rate += rate;
        per_worker.push(BackendThroughput {
            name: s.name.clone(),
            hash_count: s.hash_count,
            elapsed_ms,
            rate,
        });
    }
    BenchmarkResult {
        per_worker,
        total_rate,
    }
}

pub async fn run_benchmark(
    params: &ProcessParameters,
    config: &MinerConfig,
    spec: BenchmarkSpec,
    control: &ControlHandle,
) -> anyhow::Result<BenchmarkResult> {
    log::info!(
        "Preparing benchmark for block version {}",
        spec.block_version
    );

    let engine = Engine::start(engine_options(params, config), EngineMode::Interactive)?;

    log::info!(
        "Waiting {} sec until all backends are initialized",
        spec.wait_sec
    );
    if !control
        .settle_sleep(Duration::from_secs(spec.wait_sec))
        .await
    {
        engine.shutdown();
        anyhow::bail!("Benchmark interrupted during warm-up");
    }

    let baseline = engine.worker_stats();
    let start_stamp_ms = unix_millis();
    engine.switch_work(WorkPayload::benchmark(spec.block_version));

    log::info!("Starting a {} second benchmark...", spec.work_sec);
    if !control
        .settle_sleep(Duration::from_secs(spec.work_sec))
        .await
    {
        engine.shutdown();
        anyhow::bail!("Benchmark interrupted during measurement");
    }
    engine.switch_work(WorkPayload::idle());

    let deltas: Vec<WorkerStats> = engine
        .worker_stats()
        .into_iter()
        .zip(baseline)
        .map(|(mut now, before)| {
            now.hash_count = now.hash_count.saturating_sub(before.hash_count);
            now
        })
        .collect();

    let result = compute_throughput(&deltas, start_stamp_ms);
    for worker in &result.per_worker {
        println!(
            "Benchmark worker {} ({} hashes): {}",
            worker.name,
            worker.hash_count,
            format_hashrate(worker.rate)
        );
    }
    println!("Benchmark Total: {}", format_hashrate(result.total_rate));

    engine.shutdown();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::BackendKind;

    fn stats(name: &str, hash_count: u64, last_timestamp_ms: u64) -> WorkerStats {
        WorkerStats {
            name: name.to_string(),
            backend: BackendKind::Cpu,
            hash_count,
            last_timestamp_ms,
        }
    }

    #[test]
    fn throughput_excludes_the_warm_up_window() {
        // Warm-up ended at t=5000; the worker last stamped at t=15000 with
        // 1000 hashes: 100 H/s over the 10s window, not 66.6 over 15s.
        let result = compute_throughput(&[stats("cpu-0", 1000, 15_000)], 5_000);
        assert_eq!(result.per_worker.len(), 1);
        assert_eq!(result.per_worker[0].elapsed_ms, 10_000);
        assert!((result.per_worker[0].rate - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn total_is_the_sum_of_per_worker_rates() {
        let result = compute_throughput(
            &[
                stats("cpu-0", 1000, 11_000),
                stats("cpu-1", 3000, 11_000),
                stats("cpu-2", 500, 6_000),
            ],
            1_000,
        );
        let sum: f64 = result.per_worker.iter().map(|w| w.rate).sum();
        assert!((result.total_rate - sum).abs() < 1e-9);
        assert!((result.total_rate - (100.0 + 300.0 + 100.0)).abs() < 1e-9);
    }

    #[test]
    fn idle_workers_report_zero_rate() {
        let result = compute_throughput(&[stats("cpu-0", 0, 0)], 5_000);
        assert_eq!(result.per_worker[0].rate, 0.0);
        assert_eq!(result.total_rate, 0.0);
    }
}
