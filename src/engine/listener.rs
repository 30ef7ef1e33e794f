//! Cancellation-key listener running on a background thread

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

#[cfg(windows)]
use crate::adapters::ConsoleKeyInput;
#[cfg(unix)]
use crate::adapters::TermiosKeyInput;
use crate::config::SupervisorConfig;
use crate::domain::model::CancelToken;
use crate::error::{SupervisorError, SupervisorResult};
use crate::ports::KeyInput;

/// Key input used when no interactive terminal is attached.
///
/// Entering raw mode always fails, so the listener never starts a thread and
/// the operation simply cannot be cancelled from the keyboard.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopKeyInput;

impl KeyInput for NoopKeyInput {
    fn name(&self) -> &'static str {
        "none"
    }

    fn enter_raw_mode(&self) -> SupervisorResult<()> {
        Err(SupervisorError::TerminalModeUnavailable {
            reason: "stdin is not an interactive terminal".to_string(),
        })
    }

    fn read_key(&self, _timeout: Duration) -> SupervisorResult<Option<char>> {
        Ok(None)
    }

    fn restore_mode(&self) -> SupervisorResult<()> {
        Ok(())
    }
}

/// Pick the key input strategy for this process's stdin
pub fn detect_key_input() -> Arc<dyn KeyInput> {
    #[cfg(unix)]
    {
        if TermiosKeyInput::is_available() {
            return Arc::new(TermiosKeyInput::new());
        }
    }

    #[cfg(windows)]
    {
        if ConsoleKeyInput::is_available() {
            return Arc::new(ConsoleKeyInput::new());
        }
    }

    debug!("no interactive terminal on stdin; keyboard cancellation disabled");
    Arc::new(NoopKeyInput)
}

fn is_cancel_key(pressed: char, cancel_key: char) -> bool {
    pressed == cancel_key || pressed.to_lowercase().eq(cancel_key.to_lowercase())
}

/// Puts the terminal back when the listener thread exits, however it exits
struct RestoreGuard(Arc<dyn KeyInput>);

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        if let Err(e) = self.0.restore_mode() {
            debug!("terminal restore from listener thread failed: {}", e);
        }
    }
}

struct Worker {
    stop: Arc<AtomicBool>,
    done_rx: mpsc::Receiver<()>,
    handle: JoinHandle<()>,
}

/// Watches the keyboard for the cancellation key while an operation runs.
///
/// The terminal is switched to unbuffered, non-echoing input on [`start`](Self::start)
/// and restored on [`stop`](Self::stop), which also runs on drop. If raw mode
/// cannot be entered the listener logs a warning and does nothing.
pub struct RawInputListener {
    key_input: Arc<dyn KeyInput>,
    cancel: CancelToken,
    cancel_key: char,
    key_poll: Duration,
    join_timeout: Duration,
    worker: Option<Worker>,
}

impl RawInputListener {
    pub fn new(config: &SupervisorConfig, key_input: Arc<dyn KeyInput>, cancel: CancelToken) -> Self {
        Self {
            key_input,
            cancel,
            cancel_key: config.cancel_key,
            key_poll: config.key_poll(),
            join_timeout: config.join_timeout(),
            worker: None,
        }
    }

    /// Enter raw mode and start watching for the cancellation key. Idempotent.
    pub fn start(&mut self) {
        if self.worker.is_some() {
            return;
        }

        if let Err(e) = self.key_input.enter_raw_mode() {
            warn!(input = self.key_input.name(), "Keyboard cancellation unavailable: {}", e);
            return;
        }

        let stop = Arc::new(AtomicBool::new(false));
        let (done_tx, done_rx) = mpsc::channel();
        let key_input = Arc::clone(&self.key_input);
        let cancel = self.cancel.clone();
        let thread_stop = Arc::clone(&stop);
        let cancel_key = self.cancel_key;
        let key_poll = self.key_poll;

        let spawned = thread::Builder::new()
            .name("key-listener".to_string())
            .spawn(move || {
                let _restore = RestoreGuard(Arc::clone(&key_input));

                while !thread_stop.load(Ordering::Acquire) && !cancel.is_cancelled() {
                    match key_input.read_key(key_poll) {
                        Ok(Some(key)) if is_cancel_key(key, cancel_key) => {
                            if cancel.cancel() {
                                info!("Cancellation requested from keyboard");
                            }
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            debug!("key listener stopped reading: {}", e);
                            break;
                        }
                    }
                }
                let _ = done_tx.send(());
            });

        match spawned {
            Ok(handle) => {
                debug!(input = self.key_input.name(), "key listener started");
                self.worker = Some(Worker { stop, done_rx, handle });
            }
            Err(e) => {
                warn!("Keyboard cancellation unavailable: {}", e);
                if let Err(e) = self.key_input.restore_mode() {
                    warn!("Failed to restore terminal mode: {}", e);
                }
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop watching and restore the terminal.
    ///
    /// Waits for the listener thread at most the configured join timeout. The
    /// terminal mode is restored even if the thread never started or did not
    /// finish in time.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop.store(true, Ordering::Release);
            match worker.done_rx.recv_timeout(self.join_timeout) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    if worker.handle.join().is_err() {
                        debug!("key listener thread panicked");
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!("key listener did not stop within {:?}; detaching", self.join_timeout);
                }
            }
        }

        if let Err(e) = self.key_input.restore_mode() {
            warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

impl Drop for RawInputListener {
    fn drop(&mut self) {
        self.stop();
    }
}
