//! Pairing of key listener and status renderer for the lifetime of one operation

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::SupervisorConfig;
use crate::domain::model::{CancelToken, SharedStats};
use crate::engine::listener::{detect_key_input, RawInputListener};
use crate::engine::progress::{stdout_sink, DisplayMode, LiveStatusRenderer, StatusSink};
use crate::ports::KeyInput;

/// Terminal resources an operation runs against: keyboard, status sink, tunables
#[derive(Clone)]
pub struct ConsoleIo {
    config: SupervisorConfig,
    key_input: Arc<dyn KeyInput>,
    sink: StatusSink,
    fit_terminal: bool,
}

impl ConsoleIo {
    pub fn new(config: SupervisorConfig, key_input: Arc<dyn KeyInput>, sink: StatusSink) -> Self {
        Self {
            config,
            key_input,
            sink,
            fit_terminal: false,
        }
    }

    /// The process's own terminal: detected key input, stdout, terminal-width status line
    pub fn detect(config: SupervisorConfig) -> Self {
        Self::new(config, detect_key_input(), stdout_sink()).fit_to_terminal(true)
    }

    pub fn fit_to_terminal(mut self, fit: bool) -> Self {
        self.fit_terminal = fit;
        self
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Start the listener and then the renderer for one operation
    pub fn open_scope(
        &self,
        label: &str,
        mode: DisplayMode,
        cancel: &CancelToken,
        stats: &SharedStats,
    ) -> OperationScope {
        let mut listener =
            RawInputListener::new(&self.config, Arc::clone(&self.key_input), cancel.clone());
        let mut renderer = LiveStatusRenderer::new(
            &self.config,
            stats.clone(),
            cancel.clone(),
            Arc::clone(&self.sink),
        )
        .fit_to_terminal(self.fit_terminal);

        listener.start();
        renderer.start(label, mode);

        OperationScope {
            listener,
            renderer,
            closed: false,
        }
    }
}

impl fmt::Debug for ConsoleIo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsoleIo")
            .field("config", &self.config)
            .field("key_input", &self.key_input.name())
            .field("fit_terminal", &self.fit_terminal)
            .finish_non_exhaustive()
    }
}

/// Running listener and renderer; both are stopped on [`close`](Self::close) or drop.
///
/// The renderer stops first so its final newline lands before the terminal
/// leaves raw mode.
pub struct OperationScope {
    listener: RawInputListener,
    renderer: LiveStatusRenderer,
    closed: bool,
}

impl OperationScope {
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.renderer.stop();
        self.listener.stop();
    }

    /// [`close`](Self::close) from async code.
    ///
    /// Stopping joins the listener and renderer threads for up to the join
    /// timeout each, so the wait runs on the blocking pool instead of stalling
    /// the runtime's worker.
    pub async fn close_async(mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = tokio::task::spawn_blocking(move || self.close()).await {
            debug!("closing operation scope failed: {}", e);
        }
    }
}

impl Drop for OperationScope {
    fn drop(&mut self) {
        self.close();
    }
}
