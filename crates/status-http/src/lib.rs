#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! HTTP status server for the Ember miner.
//!
//! Serves a small JSON surface while the miner runs:
//! - `GET /api/status` - mining state plus the current configuration snapshot
//! - `POST /api/restart` - requests a miner restart (picked up by the
//!   lifecycle controller on its next tick)
//!
//! The server is owned by the controller's context and torn down during every
//! restart via graceful shutdown, then rebuilt against the fresh config.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::sync::oneshot;
use warp::Filter;

/// Configuration snapshot shown on the status page and by the `i` key.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ConfigSnapshot {
    pub http_port: u16,
    pub currency: String,
    pub pool_address: String,
    pub wallet_address: String,
    pub cpu_workers: usize,
    pub cpus_available: usize,
    pub amd_enabled: bool,
    pub nvidia_enabled: bool,
}

impl fmt::Display for ConfigSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "===================================================")?;
        writeln!(f, "=                Miner Configuration              =")?;
        writeln!(f, "===================================================")?;
        writeln!(f, "Http port      : {}", self.http_port)?;
        writeln!(f, "Pool address   : {}", self.pool_address)?;
        writeln!(f, "Wallet id      : {}", self.wallet_address)?;
        writeln!(f, "Currency       : {}", self.currency)?;
        writeln!(f, "CPU in use     : {}", self.cpu_workers)?;
        writeln!(f, "CPU available  : {}", self.cpus_available)?;
        writeln!(
            f,
            "AMD gpu(s)     : {}",
            if self.amd_enabled { "enabled" } else { "not in use" }
        )?;
        writeln!(
            f,
            "NVIDIA gpu(s)  : {}",
            if self.nvidia_enabled { "enabled" } else { "not in use" }
        )?;
        write!(f, "---------------------------------------------------")
    }
}

struct SharedStatus {
    mining: AtomicBool,
    snapshot: RwLock<ConfigSnapshot>,
}

/// Running status server handle. Dropping it without [`StatusServer::stop`]
/// aborts the serve task with the runtime.
pub struct StatusServer {
    shared: Arc<SharedStatus>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
    addr: SocketAddr,
}

impl StatusServer {
    /// Bind and spawn the server. `on_restart` runs on every
    /// `POST /api/restart`; it must only request the transition, never apply
    /// it.
    pub fn start(
        port: u16,
        snapshot: ConfigSnapshot,
        on_restart: Arc<dyn Fn() + Send + Sync>,
    ) -> anyhow::Result<Self> {
        let shared = Arc::new(SharedStatus {
            mining: AtomicBool::new(false),
            snapshot: RwLock::new(snapshot),
        });

        let status_shared = shared.clone();
        let status_route = warp::path!("api" / "status").and(warp::get()).map(move || {
            let mining = status_shared.mining.load(Ordering::Relaxed);
            let snapshot = status_shared
                .snapshot
                .read()
                .map(|s| s.clone())
                .unwrap_or_default();
            warp::reply::json(&serde_json::json!({
                "mining": mining,
                "config": snapshot,
            }))
        });

        let restart_route = warp::path!("api" / "restart").and(warp::post()).map(move || {
            log::info!("Restart requested over HTTP");
            on_restart();
            warp::reply::json(&serde_json::json!({ "status": "restarting" }))
        });

        let routes = status_route.or(restart_route);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let bind: SocketAddr = ([0, 0, 0, 0], port).into();
        let (addr, server) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(bind, async {
                shutdown_rx.await.ok();
            })
            .map_err(|e| anyhow::anyhow!("Cannot bind HTTP status server on {bind}: {e}"))?;

        let task = tokio::spawn(server);
        log::info!("HTTP status server listening on {addr}");

        Ok(Self {
            shared,
            shutdown_tx: Some(shutdown_tx),
            task,
            addr,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn set_mining_state(&self, mining: bool) {
        self.shared.mining.store(mining, Ordering::Relaxed);
    }

    pub fn is_mining(&self) -> bool {
        self.shared.mining.load(Ordering::Relaxed)
    }

    pub fn config_snapshot(&self) -> ConfigSnapshot {
        self.shared
            .snapshot
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Graceful shutdown; waits for the serve task to finish.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            log::warn!("HTTP status server task ended abnormally: {e}");
        }
        log::info!("HTTP status server stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn snapshot() -> ConfigSnapshot {
        ConfigSnapshot {
            http_port: 8282,
            currency: "monero".to_string(),
            pool_address: "pool.example.com:3333".to_string(),
            wallet_address: "WALLET".to_string(),
            cpu_workers: 4,
            cpus_available: 8,
            amd_enabled: false,
            nvidia_enabled: false,
        }
    }

    #[test]
    fn snapshot_display_lists_the_key_fields() {
        let text = snapshot().to_string();
        assert!(text.contains("Miner Configuration"));
        assert!(text.contains("pool.example.com:3333"));
        assert!(text.contains("CPU in use     : 4"));
        assert!(text.contains("not in use"));
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let value = serde_json::to_value(snapshot()).expect("serialize");
        assert_eq!(value["http_port"], 8282);
        assert_eq!(value["pool_address"], "pool.example.com:3333");
    }

    #[tokio::test]
    async fn server_starts_stops_and_tracks_mining_state() {
        let restarts = Arc::new(AtomicUsize::new(0));
        let counter = restarts.clone();
        let server = StatusServer::start(
            0,
            snapshot(),
            Arc::new(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            }),
        )
        .expect("bind on an ephemeral port");

        assert!(!server.is_mining());
        server.set_mining_state(true);
        assert!(server.is_mining());
        assert_eq!(server.config_snapshot().http_port, 8282);
        assert_ne!(server.addr().port(), 0);

        server.stop().await;
        assert_eq!(restarts.load(Ordering::Relaxed), 0);
    }
}
