// Domain models - Operation-scoped state shared between the supervisor's components

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::debug;

use crate::error::{SupervisorError, SupervisorResult};

#[cfg(test)]
mod tests;

/// One-shot cancellation flag for a single supervised operation.
///
/// A token starts out clear and can only ever go from clear to set. The
/// supervisor creates a fresh token per operation, so a cancellation can never
/// leak into the next one. Clones share the same flag.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

#[derive(Default)]
struct CancelInner {
    flag: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    /// Create a new, clear token
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Returns `true` only for the call that actually set it.
    pub fn cancel(&self) -> bool {
        let first = !self.inner.flag.swap(true, Ordering::AcqRel);
        if first {
            self.inner.notify.notify_waiters();
        }
        first
    }

    /// Check whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::Acquire)
    }

    /// Resolve once the token is set
    pub async fn cancelled(&self) {
        loop {
            // Register before checking so a concurrent cancel() cannot be missed.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Live statistics parsed from an encoder's output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatSnapshot {
    /// Encoded position, `HH:MM:SS`
    pub time: String,
    /// Output size so far, e.g. `256kB`
    pub size: String,
    /// Current bitrate, e.g. `1000kbits/s`
    pub bitrate: String,
    /// Encoding speed relative to realtime, e.g. `2.0x`
    pub speed: String,
    /// Frames per second
    pub fps: String,
    /// Dropped frame count
    pub drop: String,
    /// Duplicated frame count
    pub dup: String,
}

impl Default for StatSnapshot {
    fn default() -> Self {
        Self {
            time: "00:00:00".to_string(),
            size: "0kB".to_string(),
            bitrate: "0kbits/s".to_string(),
            speed: "0x".to_string(),
            fps: "0".to_string(),
            drop: "0".to_string(),
            dup: "0".to_string(),
        }
    }
}

/// Statistics shared between the output parser (writer) and the renderer (reader)
#[derive(Debug, Clone, Default)]
pub struct SharedStats {
    inner: Arc<Mutex<StatSnapshot>>,
}

impl SharedStats {
    /// Fresh statistics with placeholder values
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current values
    pub fn snapshot(&self) -> StatSnapshot {
        match self.inner.lock() {
            Ok(stats) => stats.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Mutate the statistics in place
    pub fn update<R>(&self, f: impl FnOnce(&mut StatSnapshot) -> R) -> R {
        match self.inner.lock() {
            Ok(mut stats) => f(&mut stats),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

/// Outcome of a supervised operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OperationResult {
    /// The work finished and produced its artifact
    Completed { output: PathBuf, size: u64 },
    /// The work did not succeed
    Failed {
        reason: String,
        exit_code: Option<i32>,
    },
    /// The user asked to stop; takes priority over any other outcome
    Cancelled,
}

impl OperationResult {
    /// Build a `Failed` outcome from an error, keeping the exit code if there is one
    pub fn failed(err: &SupervisorError) -> Self {
        let exit_code = match err {
            SupervisorError::ProcessExit { code, .. } => Some(*code),
            _ => None,
        };
        Self::Failed {
            reason: err.to_string(),
            exit_code,
        }
    }

    /// Outcome of a run that reported success: `Completed` if `output` is a
    /// non-empty file, otherwise `Failed` with a missing-output reason.
    pub fn from_output(output: impl AsRef<Path>) -> Self {
        let output = output.as_ref();
        match std::fs::metadata(output) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Self::Completed {
                output: output.to_path_buf(),
                size: meta.len(),
            },
            Ok(meta) => {
                debug!(path = %output.display(), len = meta.len(), is_file = meta.is_file(), "output is not a non-empty file");
                Self::missing(output)
            }
            Err(e) => {
                debug!(path = %output.display(), "output metadata unavailable: {}", e);
                Self::missing(output)
            }
        }
    }

    fn missing(output: &Path) -> Self {
        Self::failed(&SupervisorError::MissingOutput {
            path: output.display().to_string(),
        })
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Conventional process exit code for a CLI reporting this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed { .. } => 0,
            Self::Failed { .. } => 1,
            Self::Cancelled => 130,
        }
    }
}

/// An external process to run under supervision
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Name shown on the status line
    pub label: String,
    /// Program to execute
    pub program: String,
    /// Arguments passed to the program
    pub args: Vec<String>,
    /// File the process is expected to produce
    pub output: PathBuf,
    /// Working directory for the child
    pub current_dir: Option<PathBuf>,
    /// Extra environment variables for the child
    pub envs: Vec<(String, String)>,
}

impl ProcessSpec {
    /// Create a spec with no arguments
    pub fn new(label: impl Into<String>, program: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            program: program.into(),
            args: Vec::new(),
            output: output.into(),
            current_dir: None,
            envs: Vec::new(),
        }
    }

    /// Create a spec from a full argument vector (`argv[0]` is the program)
    pub fn from_argv(
        label: impl Into<String>,
        argv: Vec<String>,
        output: impl Into<PathBuf>,
    ) -> SupervisorResult<Self> {
        let mut argv = argv.into_iter();
        let program = argv
            .next()
            .filter(|p| !p.trim().is_empty())
            .ok_or(SupervisorError::EmptyCommand)?;
        Ok(Self::new(label, program, output).args(argv))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

/// Blocking call into an external library, producing the path of its artifact
pub type BlockingCall = Box<dyn FnOnce() -> anyhow::Result<PathBuf> + Send + 'static>;

/// A blocking library call to run under supervision.
///
/// The call has no progress hooks and no cancellation point, so cancelling it
/// is advisory: the supervisor stops waiting and reports `Cancelled`, while the
/// call itself runs on to completion in the background and its result is
/// thrown away.
pub struct OpaqueCall {
    /// Name shown on the status line
    pub label: String,
    pub(crate) call: BlockingCall,
}

impl OpaqueCall {
    pub fn new<F>(label: impl Into<String>, call: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<PathBuf> + Send + 'static,
    {
        Self {
            label: label.into(),
            call: Box::new(call),
        }
    }
}

impl fmt::Debug for OpaqueCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueCall")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// The unit of work handed to the supervisor
#[derive(Debug)]
pub enum WorkKind {
    /// External process; cancellation terminates it
    Process(ProcessSpec),
    /// Blocking library call; cancellation is advisory
    Opaque(OpaqueCall),
}

impl WorkKind {
    pub fn label(&self) -> &str {
        match self {
            Self::Process(spec) => &spec.label,
            Self::Opaque(call) => &call.label,
        }
    }
}
