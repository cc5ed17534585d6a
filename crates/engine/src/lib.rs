#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Compute engine facade for the Ember miner.
//!
//! The lifecycle controller drives mining through this crate without knowing
//! anything about the hashing internals:
//! - Persistent worker thread pool with per-worker hash/timestamp counters
//! - Work switching via bounded per-worker channels (idle vs. live payloads)
//! - Printable hashrate/results/connection reports for the runtime keys
//! - A known-answer self test run before the first start
//!
//! Only the CPU backend is implemented. The AMD/NVIDIA toggles keep the
//! multi-backend facade shape and resolve to zero workers in this build.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use sha3::{Digest, Keccak256};

/// Size of the raw work buffer handed to the engine.
pub const WORK_BUFFER_LEN: usize = 112;

/// Largest work size every backend family accepts.
pub const BACKEND_WORK_LIMIT: usize = 84;

/// How long an idle worker blocks waiting for new work.
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Hashes computed between work-switch checks.
const HASH_BATCH: u64 = 512;

/// A work blob dispatched to all workers.
///
/// The idle payload (length zero) parks the workers; any other payload is
/// hashed continuously until the next switch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkPayload {
    data: [u8; WORK_BUFFER_LEN],
    len: usize,
}

impl WorkPayload {
    /// Empty sentinel payload; workers park on it.
    pub fn idle() -> Self {
        Self {
            data: [0u8; WORK_BUFFER_LEN],
            len: 0,
        }
    }

    /// Zero-filled synthetic payload stamped with a block version,
    /// truncated to the size every backend accepts.
    pub fn benchmark(block_version: u8) -> Self {
        let mut data = [0u8; WORK_BUFFER_LEN];
        data[0] = block_version;
        Self {
            data,
            len: BACKEND_WORK_LIMIT,
        }
    }

    /// Full-size payload seeded from an arbitrary tag, used as the live
    /// workload until real pool work arrives.
    pub fn seed(tag: &[u8]) -> Self {
        let mut data = [0u8; WORK_BUFFER_LEN];
        for (d, s) in data.iter_mut().zip(tag.iter().cycle().take(WORK_BUFFER_LEN)) {
            *d = *s;
        }
        Self {
            data,
            len: WORK_BUFFER_LEN,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.len == 0
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

/// How the engine runs relative to the console.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineMode {
    /// Detached from the console (no interactive output expected).
    Daemon,
    /// Normal interactive run.
    Interactive,
}

/// Backend family a worker belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Cpu,
    Amd,
    Nvidia,
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Cpu => "cpu",
            BackendKind::Amd => "amd",
            BackendKind::Nvidia => "nvidia",
        }
    }
}

/// Engine construction options derived from the process parameters and the
/// parsed configuration.
#[derive(Clone, Debug)]
pub struct EngineOptions {
    pub use_cpu: bool,
    pub use_amd: bool,
    pub use_nvidia: bool,
    /// CPU worker threads (None = all logical CPUs).
    pub cpu_workers: Option<usize>,
    pub pool_address: String,
    pub currency: String,
}

/// Snapshot of one worker's counters.
#[derive(Clone, Debug)]
pub struct WorkerStats {
    pub name: String,
    pub backend: BackendKind,
    pub hash_count: u64,
    /// Milliseconds since the UNIX epoch of the worker's last batch.
    pub last_timestamp_ms: u64,
}

#[derive(Clone)]
struct WorkOrder {
    payload: WorkPayload,
}

struct WorkerSlot {
    name: String,
    backend: BackendKind,
    hash_count: Arc<AtomicU64>,
    last_stamp_ms: Arc<AtomicU64>,
    shares: Arc<AtomicU64>,
}

/// Live worker pool. Exactly one instance exists at a time; a restart drops
/// the old engine and builds a new one rather than mutating in place.
pub struct Engine {
    slots: Vec<WorkerSlot>,
    job_senders: Vec<Sender<WorkOrder>>,
    stop: Arc<AtomicBool>,
    handles: Vec<thread::JoinHandle<()>>,
    started: Instant,
    pool_address: String,
    currency: String,
    mode: EngineMode,
}

impl Engine {
    /// Spawn the worker pool with the idle payload loaded.
    pub fn start(options: EngineOptions, mode: EngineMode) -> anyhow::Result<Self> {
        let effective_cpus = num_cpus::get().max(1);
        let cpu_workers = if options.use_cpu {
            let n = options.cpu_workers.unwrap_or(effective_cpus);
            if options.cpu_workers.is_none() {
                log::info!("Auto-detected {} CPU worker(s)", n);
            }
            n
        } else {
            0
        };

        if options.use_amd {
            log::info!("AMD backend requested but no OpenCL devices in this build; skipping");
        }
        if options.use_nvidia {
            log::info!("NVIDIA backend requested but no CUDA devices in this build; skipping");
        }

        if cpu_workers == 0 {
            anyhow::bail!("No mining backends enabled; at least one worker is required");
        }

        let stop = Arc::new(AtomicBool::new(false));
        let mut slots = Vec::with_capacity(cpu_workers);
        let mut job_senders = Vec::with_capacity(cpu_workers);
        let mut handles = Vec::with_capacity(cpu_workers);

        log::info!(
            "Starting worker pool: {} CPU worker(s), mode {:?}",
            cpu_workers,
            mode
        );

        for id in 0..cpu_workers {
            let (job_tx, job_rx) = bounded::<WorkOrder>(1);
            let hash_count = Arc::new(AtomicU64::new(0));
            let last_stamp_ms = Arc::new(AtomicU64::new(0));
            let shares = Arc::new(AtomicU64::new(0));
            let name = format!("{}-{id}", BackendKind::Cpu.name());

            let counters = (hash_count.clone(), last_stamp_ms.clone(), shares.clone());
            let stop_flag = stop.clone();
            let thread_name = name.clone();
            let handle = thread::spawn(move || {
                worker_loop(&thread_name, id, job_rx, stop_flag, counters);
            });

            slots.push(WorkerSlot {
                name,
                backend: BackendKind::Cpu,
                hash_count,
                last_stamp_ms,
                shares,
            });
            job_senders.push(job_tx);
            handles.push(handle);
        }

        Ok(Self {
            slots,
            job_senders,
            stop,
            handles,
            started: Instant::now(),
            pool_address: options.pool_address,
            currency: options.currency,
            mode,
        })
    }

    /// Dispatch a new payload to every worker.
    ///
    /// Non-blocking per worker: a worker mid-batch picks the order up at its
    /// next switch check.
    pub fn switch_work(&self, payload: WorkPayload) {
        let order = WorkOrder { payload };
        for tx in &self.job_senders {
            let _ = tx.try_send(order.clone());
        }
        log::debug!(
            "Work switched on {} worker(s) (idle: {})",
            self.job_senders.len(),
            payload.is_idle()
        );
    }

    pub fn worker_count(&self) -> usize {
        self.slots.len()
    }

    pub fn worker_stats(&self) -> Vec<WorkerStats> {
        self.slots
            .iter()
            .map(|s| WorkerStats {
                name: s.name.clone(),
                backend: s.backend,
                hash_count: s.hash_count.load(Ordering::Relaxed),
                last_timestamp_ms: s.last_stamp_ms.load(Ordering::Relaxed),
            })
            .collect()
    }

    /// Report for the `h` key.
    pub fn hashrate_report(&self) -> String {
        let uptime = self.started.elapsed().as_secs_f64().max(1e-3);
        let mut out = String::from("HASHRATE REPORT\n");
        let mut total = 0.0;
        for slot in &self.slots {
            let rate = slot.hash_count.load(Ordering::Relaxed) as f64 / uptime;
            total += rate;
            out.push_str(&format!("| {:<8} | {:>12} |\n", slot.name, format_hashrate(rate)));
        }
        out.push_str(&format!("Total: {}\n", format_hashrate(total)));
        out
    }

    /// Report for the `r` key.
    pub fn results_report(&self) -> String {
        let hashes: u64 = self
            .slots
            .iter()
            .map(|s| s.hash_count.load(Ordering::Relaxed))
            .sum();
        let shares: u64 = self
            .slots
            .iter()
            .map(|s| s.shares.load(Ordering::Relaxed))
            .sum();
        format!(
            "RESULT REPORT\nShares found   : {}\nHashes total   : {}\nUptime         : {}s\n",
            shares,
            hashes,
            self.started.elapsed().as_secs()
        )
    }

    /// Report for the `c` key.
    pub fn connection_report(&self) -> String {
        format!(
            "CONNECTION REPORT\nPool address   : {}\nCurrency       : {}\nMode           : {:?}\nUptime         : {}s\n",
            self.pool_address,
            self.currency,
            self.mode,
            self.started.elapsed().as_secs()
        )
    }

    /// Stop the pool and join every worker. Consumes the engine so a stopped
    /// pool can never be reused.
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.job_senders.clear();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                log::warn!("A worker panicked during shutdown");
            }
        }
        log::info!("Worker pool stopped");
    }

    /// Known-answer check of the compute path. Fatal on mismatch.
    pub fn self_test() -> anyhow::Result<()> {
        const EMPTY: [u8; 32] = [
            0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7,
            0x03, 0xc0, 0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04,
            0x5d, 0x85, 0xa4, 0x70,
        ];
        const ABC: [u8; 32] = [
            0x4e, 0x03, 0x65, 0x7a, 0xea, 0x45, 0xa9, 0x4f, 0xc7, 0xd4, 0x7b, 0xa8, 0x26, 0xc8,
            0xd6, 0x67, 0xc0, 0xd1, 0xe6, 0xe3, 0x3a, 0x64, 0xa0, 0x36, 0xec, 0x44, 0xf5, 0x8f,
            0xa1, 0x2d, 0x6c, 0x45,
        ];

        let empty = Keccak256::digest([]);
        let abc = Keccak256::digest(b"abc");
        if empty.as_slice() != EMPTY || abc.as_slice() != ABC {
            anyhow::bail!("Compute self-test failed: hash output does not match known vectors");
        }
        Ok(())
    }
}

fn worker_loop(
    name: &str,
    id: usize,
    job_rx: Receiver<WorkOrder>,
    stop: Arc<AtomicBool>,
    (hash_count, last_stamp_ms, shares): (Arc<AtomicU64>, Arc<AtomicU64>, Arc<AtomicU64>),
) {
    log::debug!("{name} started");

    // Disjoint nonce spaces per worker.
    let mut nonce: u64 = (id as u64) << 40;
    let mut work = WorkPayload::idle();

    loop {
        if stop.load(Ordering::Relaxed) {
            break;
        }

        if work.is_idle() {
            match job_rx.recv_timeout(IDLE_POLL) {
                Ok(order) => work = order.payload,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            continue;
        }

        for _ in 0..HASH_BATCH {
            let mut hasher = Keccak256::new();
            hasher.update(work.bytes());
            hasher.update(nonce.to_le_bytes());
            let digest = hasher.finalize();
            if digest[0] == 0 && digest[1] == 0 {
                shares.fetch_add(1, Ordering::Relaxed);
            }
            nonce = nonce.wrapping_add(1);
        }
        hash_count.fetch_add(HASH_BATCH, Ordering::Relaxed);
        last_stamp_ms.store(unix_millis(), Ordering::Relaxed);

        match job_rx.try_recv() {
            Ok(order) => work = order.payload,
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => break,
        }
    }

    log::debug!("{name} exited");
}

/// Milliseconds since the UNIX epoch.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Human-readable hashrate.
pub fn format_hashrate(rate: f64) -> String {
    if rate >= 1_000_000.0 {
        format!("{:.2} MH/s", rate / 1_000_000.0)
    } else if rate >= 1_000.0 {
        format!("{:.2} kH/s", rate / 1_000.0)
    } else {
        format!("{:.1} H/s", rate)
    }
}
