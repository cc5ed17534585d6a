//! Shared lifecycle request state.
//!
//! The controller owns the only authoritative copy of the pause/restart
//! flags. Everything else (keyboard listener, HTTP restart endpoint) may only
//! request a transition through this handle; the watchdog loop applies it on
//! its next tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

struct ControlState {
    paused: AtomicBool,
    restart_requested: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
}

/// Cloneable handle over the controller's request flags.
#[derive(Clone)]
pub struct ControlHandle {
    inner: Arc<ControlState>,
}

impl ControlHandle {
    /// New handle; the miner starts paused until the controller decides
    /// otherwise from the persisted state.
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(ControlState {
                paused: AtomicBool::new(true),
                restart_requested: AtomicBool::new(false),
                shutdown_tx,
            }),
        }
    }

    pub fn request_pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
    }

    pub fn request_resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    pub fn request_restart(&self) {
        self.inner.restart_requested.store(true, Ordering::SeqCst);
    }

    pub fn restart_requested(&self) -> bool {
        self.inner.restart_requested.load(Ordering::SeqCst)
    }

    pub fn clear_restart(&self) {
        self.inner.restart_requested.store(false, Ordering::SeqCst);
    }

    /// Ask every cancellable wait (and the input listener) to end.
    pub fn trigger_shutdown(&self) {
        let _ = self.inner.shutdown_tx.send(true);
    }

    pub fn shutdown_requested(&self) -> bool {
        *self.inner.shutdown_tx.borrow()
    }

    pub fn shutdown_watch(&self) -> watch::Receiver<bool> {
        self.inner.shutdown_tx.subscribe()
    }

    /// Sleep that a shutdown request interrupts. Returns `true` when the full
    /// duration elapsed, `false` when interrupted.
    pub async fn settle_sleep(&self, duration: Duration) -> bool {
        let mut watch_rx = self.shutdown_watch();
        if *watch_rx.borrow() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => true,
            _ = watch_rx.wait_for(|&stop| stop) => false,
        }
    }
}

impl Default for ControlHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[test]
    fn starts_paused_without_pending_requests() {
        let control = ControlHandle::new();
        assert!(control.is_paused());
        assert!(!control.restart_requested());
        assert!(!control.shutdown_requested());
    }

    #[test]
    fn requests_are_visible_through_clones() {
        let control = ControlHandle::new();
        let remote = control.clone();
        remote.request_resume();
        remote.request_restart();
        assert!(!control.is_paused());
        assert!(control.restart_requested());
        control.clear_restart();
        assert!(!remote.restart_requested());
    }

    #[tokio::test(start_paused = true)]
    async fn settle_sleep_runs_to_completion_when_undisturbed() {
        let control = ControlHandle::new();
        let begin = Instant::now();
        assert!(control.settle_sleep(Duration::from_millis(1000)).await);
        assert!(begin.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn settle_sleep_is_interrupted_by_shutdown() {
        let control = ControlHandle::new();
        let sleeper = control.clone();
        let waiter = tokio::spawn(async move {
            sleeper.settle_sleep(Duration::from_secs(60)).await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        control.trigger_shutdown();
        assert!(!waiter.await.expect("join"));
    }

    #[tokio::test]
    async fn settle_sleep_returns_immediately_after_shutdown() {
        let control = ControlHandle::new();
        control.trigger_shutdown();
        assert!(!control.settle_sleep(Duration::from_secs(60)).await);
    }
}
