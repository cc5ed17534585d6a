//! Keyboard command listener.
//!
//! One persistent background thread reads single key presses and forwards
//! them over a bounded channel; the watchdog loop drains the channel every
//! tick and maps keys to commands based on the current lifecycle mode. The
//! thread is never joined - its lifetime is bounded by the shutdown watch
//! and the channel staying open.
//!
//! Raw mode is held only around each poll window so regular log output keeps
//! normal terminal processing.

use std::thread;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal;
use tokio::sync::{mpsc, watch};

/// Capacity of the key channel; stray keys beyond this are dropped.
pub const COMMAND_CHANNEL_CAPACITY: usize = 16;

const POLL_WINDOW: Duration = Duration::from_millis(250);

/// Lifecycle command decoded from a key press.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MinerCommand {
    ShowHashrate,
    ShowResults,
    ShowConnection,
    Pause,
    Resume,
    ShowConfig,
}

/// What the controller is doing when a key arrives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListenerMode {
    Running,
    Paused,
    Restarting,
}

/// Key → command mapping for the current mode. Unmapped keys are ignored;
/// during a restart every key is ignored (the controller prints a wait
/// notice instead).
pub fn map_key(mode: ListenerMode, key: char) -> Option<MinerCommand> {
    match (mode, key) {
        (ListenerMode::Running, 'h') => Some(MinerCommand::ShowHashrate),
        (ListenerMode::Running, 'r') => Some(MinerCommand::ShowResults),
        (ListenerMode::Running, 'c') => Some(MinerCommand::ShowConnection),
        (ListenerMode::Running, 'p') => Some(MinerCommand::Pause),
        (ListenerMode::Running, 'i') => Some(MinerCommand::ShowConfig),
        (ListenerMode::Paused, 'p') => Some(MinerCommand::Resume),
        (ListenerMode::Paused, 'i') => Some(MinerCommand::ShowConfig),
        _ => None,
    }
}

/// Handle of the background reader thread.
pub struct InputListener {
    handle: Option<thread::JoinHandle<()>>,
}

impl InputListener {
    /// Spawn the reader. It ends when the shutdown watch flips or the
    /// receiving side of `tx` is dropped.
    pub fn spawn(tx: mpsc::Sender<char>, shutdown: watch::Receiver<bool>) -> Self {
        let spawned = thread::Builder::new()
            .name("key-listener".to_string())
            .spawn(move || {
                log::debug!("Key listener started");
                loop {
                    if *shutdown.borrow() {
                        break;
                    }
                    match poll_key(POLL_WINDOW) {
                        Ok(Some(key)) => {
                            if tx.try_send(key).is_err() && tx.is_closed() {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            // No usable terminal (service mode, tests):
                            // stay alive but stop hammering the tty.
                            log::debug!("Key poll failed: {e}");
                            thread::sleep(POLL_WINDOW);
                        }
                    }
                }
                log::debug!("Key listener exited");
            });

        match spawned {
            Ok(handle) => Self {
                handle: Some(handle),
            },
            Err(e) => {
                log::warn!("Cannot start the key listener: {e}");
                Self { handle: None }
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

fn poll_key(window: Duration) -> anyhow::Result<Option<char>> {
    terminal::enable_raw_mode()?;
    let key = read_key(window);
    let _ = terminal::disable_raw_mode();
    key
}

fn read_key(window: Duration) -> anyhow::Result<Option<char>> {
    if !event::poll(window)? {
        return Ok(None);
    }
    match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
            KeyCode::Char(c) => Ok(Some(c.to_ascii_lowercase())),
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_mode_maps_the_full_command_set() {
        assert_eq!(
            map_key(ListenerMode::Running, 'h'),
            Some(MinerCommand::ShowHashrate)
        );
        assert_eq!(
            map_key(ListenerMode::Running, 'r'),
            Some(MinerCommand::ShowResults)
        );
        assert_eq!(
            map_key(ListenerMode::Running, 'c'),
            Some(MinerCommand::ShowConnection)
        );
        assert_eq!(map_key(ListenerMode::Running, 'p'), Some(MinerCommand::Pause));
        assert_eq!(
            map_key(ListenerMode::Running, 'i'),
            Some(MinerCommand::ShowConfig)
        );
        assert_eq!(map_key(ListenerMode::Running, 'x'), None);
    }

    #[test]
    fn paused_mode_accepts_only_resume_and_config() {
        assert_eq!(map_key(ListenerMode::Paused, 'p'), Some(MinerCommand::Resume));
        assert_eq!(
            map_key(ListenerMode::Paused, 'i'),
            Some(MinerCommand::ShowConfig)
        );
        for key in ['h', 'r', 'c', 'q', 'z'] {
            assert_eq!(map_key(ListenerMode::Paused, key), None, "key {key}");
        }
    }

    #[test]
    fn restarting_mode_ignores_everything() {
        for key in ['h', 'r', 'c', 'p', 'i'] {
            assert_eq!(map_key(ListenerMode::Restarting, key), None, "key {key}");
        }
    }

    #[tokio::test]
    async fn listener_exits_when_shutdown_flips() {
        let (tx, _rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let listener = InputListener::spawn(tx, shutdown_rx);
        shutdown_tx.send(true).expect("send shutdown");
        // The reader notices within one poll window.
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(!listener.is_running());
    }
}
