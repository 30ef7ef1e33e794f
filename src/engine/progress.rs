//! Single-line live status display for running operations

use std::io::Write;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::SupervisorConfig;
use crate::domain::model::{CancelToken, SharedStats, StatSnapshot};
use crate::utils::Utils;

/// Destination for status repaints
pub type StatusSink = Arc<Mutex<dyn Write + Send>>;

/// Status sink writing to the process's stdout
pub fn stdout_sink() -> StatusSink {
    Arc::new(Mutex::new(std::io::stdout()))
}

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];
const ELLIPSIS: &str = "...";

/// What the status line shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Encoder statistics parsed from process output
    Stats,
    /// Spinner and elapsed time for work that reports no progress
    Heartbeat,
}

/// Build the status line for one repaint, already cut to `width` characters
pub fn format_status(
    label: &str,
    stats: &StatSnapshot,
    mode: DisplayMode,
    elapsed: Duration,
    tick: usize,
    cancel_key: char,
    width: usize,
) -> String {
    let hint = format!("Press '{}' to cancel", cancel_key);
    let line = match mode {
        DisplayMode::Stats => {
            let mut line = format!(
                "{} -> Time: {} | Size: {} | Bitrate: {} | Speed: {} | FPS: {}",
                label, stats.time, stats.size, stats.bitrate, stats.speed, stats.fps
            );
            if stats.drop != "0" || stats.dup != "0" {
                line.push_str(&format!(" | Drop: {} | Dup: {}", stats.drop, stats.dup));
            }
            format!("{} | {}", line, hint)
        }
        DisplayMode::Heartbeat => format!(
            "{} {} Elapsed: {} | {}",
            label,
            SPINNER[tick % SPINNER.len()],
            Utils::format_duration(elapsed),
            hint
        ),
    };
    truncate(&line, width)
}

/// Cut `line` to at most `width` characters, marking the cut with `...`
pub fn truncate(line: &str, width: usize) -> String {
    if line.chars().count() <= width {
        return line.to_string();
    }
    let keep = width.saturating_sub(ELLIPSIS.len());
    let mut cut: String = line.chars().take(keep).collect();
    cut.push_str(ELLIPSIS);
    cut
}

/// Usable status width: the configured cap, narrowed to the terminal if known
fn effective_width(max_width: usize) -> usize {
    match crossterm::terminal::size() {
        Ok((columns, _)) if columns > 1 => max_width.min(columns as usize - 1),
        _ => max_width,
    }
}

struct Worker {
    stop_tx: mpsc::Sender<()>,
    done_rx: mpsc::Receiver<()>,
    handle: JoinHandle<()>,
}

/// Repaints one terminal line at a fixed cadence on a background thread.
///
/// Each repaint starts with `\r` and pads over the previous paint; no newline
/// is written until [`stop`](Self::stop). Nothing else may print to the same
/// terminal while the renderer runs.
pub struct LiveStatusRenderer {
    stats: SharedStats,
    cancel: CancelToken,
    sink: StatusSink,
    interval: Duration,
    join_timeout: Duration,
    cancel_key: char,
    max_width: usize,
    fit_terminal: bool,
    worker: Option<Worker>,
}

impl LiveStatusRenderer {
    pub fn new(config: &SupervisorConfig, stats: SharedStats, cancel: CancelToken, sink: StatusSink) -> Self {
        Self {
            stats,
            cancel,
            sink,
            interval: config.repaint_interval(),
            join_timeout: config.join_timeout(),
            cancel_key: config.cancel_key,
            max_width: config.max_status_width,
            fit_terminal: false,
            worker: None,
        }
    }

    /// Also narrow the line to the current terminal width, when one is detectable
    pub fn fit_to_terminal(mut self, fit: bool) -> Self {
        self.fit_terminal = fit;
        self
    }

    /// Start repainting. Does nothing if already running.
    pub fn start(&mut self, label: &str, mode: DisplayMode) {
        if self.worker.is_some() {
            return;
        }

        let (stop_tx, stop_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        let label = label.to_string();
        let stats = self.stats.clone();
        let cancel = self.cancel.clone();
        let sink = Arc::clone(&self.sink);
        let interval = self.interval;
        let cancel_key = self.cancel_key;
        let width = if self.fit_terminal {
            effective_width(self.max_width)
        } else {
            self.max_width
        };

        let spawned = thread::Builder::new()
            .name("status-renderer".to_string())
            .spawn(move || {
                let started = Instant::now();
                let mut tick = 0usize;
                let mut last_len = 0usize;

                while !cancel.is_cancelled() {
                    let line = format_status(
                        &label,
                        &stats.snapshot(),
                        mode,
                        started.elapsed(),
                        tick,
                        cancel_key,
                        width,
                    );
                    last_len = paint(&sink, &line, last_len);
                    tick = tick.wrapping_add(1);

                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        _ => break,
                    }
                }
                let _ = done_tx.send(());
            });

        match spawned {
            Ok(handle) => {
                self.worker = Some(Worker {
                    stop_tx,
                    done_rx,
                    handle,
                })
            }
            Err(e) => warn!("Status display unavailable: {}", e),
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Stop repainting and end the status line with a newline.
    ///
    /// Waits for the repaint thread at most the configured join timeout.
    pub fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        let _ = worker.stop_tx.send(());
        match worker.done_rx.recv_timeout(self.join_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.handle.join().is_err() {
                    debug!("status renderer thread panicked");
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("status renderer did not stop within {:?}; detaching", self.join_timeout);
            }
        }

        if let Ok(mut out) = self.sink.lock() {
            let _ = writeln!(out);
            let _ = out.flush();
        }
    }
}

impl Drop for LiveStatusRenderer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Write one repaint; returns the painted length for the next call's padding
fn paint(sink: &StatusSink, line: &str, last_len: usize) -> usize {
    let len = line.chars().count();
    let pad = last_len.saturating_sub(len);
    match sink.lock() {
        Ok(mut out) => {
            let written = write!(out, "\r{}{}", line, " ".repeat(pad)).and_then(|_| out.flush());
            if let Err(e) = written {
                debug!("status repaint failed: {}", e);
            }
        }
        Err(_) => debug!("status sink lock poisoned"),
    }
    len
}
