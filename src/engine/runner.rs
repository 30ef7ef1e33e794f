//! External process execution with live statistics and keyboard cancellation

use std::collections::VecDeque;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::domain::model::{CancelToken, OperationResult, ProcessSpec, SharedStats};
use crate::engine::progress::DisplayMode;
use crate::engine::scope::ConsoleIo;
use crate::engine::stats::StreamStatsParser;
use crate::error::{detail_suffix, SupervisorError};

const LINE_CHANNEL_CAPACITY: usize = 256;
const READ_CHUNK: usize = 4096;

/// Runs one external process, feeding its output to the status line and
/// terminating it when cancellation is requested.
///
/// Cancellation asks the child to exit cleanly (`SIGTERM` on unix, `q` on its
/// stdin elsewhere) and kills it if it is still alive after the grace period.
#[derive(Debug, Clone)]
pub struct CancellableProcessRunner {
    io: ConsoleIo,
}

impl CancellableProcessRunner {
    pub fn new(io: ConsoleIo) -> Self {
        Self { io }
    }

    pub async fn run(&self, spec: &ProcessSpec, cancel: &CancelToken) -> OperationResult {
        self.run_with_stats(spec, cancel, SharedStats::new()).await
    }

    /// Run `spec` to exit or cancellation, writing parsed statistics into `stats`
    pub async fn run_with_stats(
        &self,
        spec: &ProcessSpec,
        cancel: &CancelToken,
        stats: SharedStats,
    ) -> OperationResult {
        let config = self.io.config();

        let mut child = match spawn(spec) {
            Ok(child) => child,
            Err(source) => {
                let err = SupervisorError::ProcessSpawn {
                    program: spec.program.clone(),
                    source,
                };
                error!(program = %spec.program, "{}", err);
                return OperationResult::failed(&err);
            }
        };
        info!(program = %spec.program, pid = ?child.id(), label = %spec.label, "process started");

        let (tx, mut lines) = mpsc::channel(LINE_CHANNEL_CAPACITY);
        let mut pumps: Vec<JoinHandle<()>> = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            pumps.push(tokio::spawn(pump_lines(stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(tokio::spawn(pump_lines(stderr, tx.clone())));
        }
        drop(tx);
        let mut stdin = child.stdin.take();

        let parser = StreamStatsParser::new(stats.clone());
        let mut tail = DiagnosticTail::new(config.diagnostic_lines);
        let scope = self.io.open_scope(&spec.label, DisplayMode::Stats, cancel, &stats);

        let mut drained = false;
        let mut exit: Option<io::Result<ExitStatus>> = None;
        let mut ticker = interval(config.read_poll());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if cancel.is_cancelled() {
                terminate(&mut child, stdin.take(), config.grace_period()).await;
                break;
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled() => {}

                // Ahead of the line branch so steady output cannot starve it.
                _ = ticker.tick() => {
                    // Grandchildren can keep the pipes open after the child itself exits.
                    if !drained {
                        if let Ok(Some(status)) = child.try_wait() {
                            exit = Some(Ok(status));
                            break;
                        }
                    }
                }

                line = lines.recv(), if !drained => match line {
                    Some(line) => {
                        parser.parse_line(&line);
                        tail.push(line);
                    }
                    None => drained = true,
                },

                status = child.wait(), if drained => {
                    exit = Some(status);
                    break;
                }
            }
        }

        if !drained && exit.is_some() {
            // The child is gone; collect what it wrote, without waiting on whoever still holds the pipes.
            let drain = async {
                while let Some(line) = lines.recv().await {
                    parser.parse_line(&line);
                    tail.push(line);
                }
            };
            let _ = timeout(config.read_poll(), drain).await;
        }

        scope.close_async().await;
        for pump in pumps {
            pump.abort();
        }
        drop(stdin);

        classify(spec, cancel, exit, &tail)
    }
}

fn spawn(spec: &ProcessSpec) -> io::Result<Child> {
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .envs(spec.envs.iter().map(|(key, value)| (key.as_str(), value.as_str())))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = &spec.current_dir {
        command.current_dir(dir);
    }
    command.spawn()
}

/// Forward `reader` to `tx` one line at a time, treating `\r` as a line end too
async fn pump_lines<R>(mut reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_CHUNK];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!("output pump stopped: {}", e);
                break;
            }
        };

        for &byte in &buf[..n] {
            if byte != b'\n' && byte != b'\r' {
                pending.push(byte);
                continue;
            }
            if pending.is_empty() {
                continue;
            }
            let line = String::from_utf8_lossy(&pending).into_owned();
            pending.clear();
            if tx.send(line).await.is_err() {
                return;
            }
        }
    }

    if !pending.is_empty() {
        let _ = tx.send(String::from_utf8_lossy(&pending).into_owned()).await;
    }
}

/// Last few output lines, kept for failure messages
#[derive(Debug)]
struct DiagnosticTail {
    lines: VecDeque<String>,
    limit: usize,
}

impl DiagnosticTail {
    fn new(limit: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(limit),
            limit,
        }
    }

    fn push(&mut self, line: String) {
        if self.limit == 0 || line.trim().is_empty() {
            return;
        }
        if self.lines.len() == self.limit {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    fn last(&self) -> Option<&str> {
        self.lines.back().map(String::as_str)
    }
}

async fn terminate(child: &mut Child, stdin: Option<ChildStdin>, grace: Duration) {
    info!(pid = ?child.id(), "requesting process exit");
    if let Err(e) = request_exit(child, stdin).await {
        debug!("graceful termination request failed: {}", e);
    }

    match timeout(grace, child.wait()).await {
        Ok(Ok(status)) => debug!(%status, "process exited after termination request"),
        Ok(Err(e)) => warn!("waiting for terminated process failed: {}", e),
        Err(_) => {
            let err = SupervisorError::TerminationTimeout {
                grace_ms: grace.as_millis() as u64,
            };
            warn!(pid = ?child.id(), "{}; killing", err);
            if let Err(e) = child.kill().await {
                warn!("Failed to kill process: {}", e);
            }
        }
    }
}

#[cfg(unix)]
async fn request_exit(child: &Child, _stdin: Option<ChildStdin>) -> io::Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };
    // SAFETY: kill(2) with a pid we spawned and have not yet reaped.
    if unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
async fn request_exit(_child: &Child, stdin: Option<ChildStdin>) -> io::Result<()> {
    use tokio::io::AsyncWriteExt;

    // FFmpeg treats `q` on stdin as its quit command.
    if let Some(mut stdin) = stdin {
        stdin.write_all(b"q").await?;
        stdin.flush().await?;
    }
    Ok(())
}

fn classify(
    spec: &ProcessSpec,
    cancel: &CancelToken,
    exit: Option<io::Result<ExitStatus>>,
    tail: &DiagnosticTail,
) -> OperationResult {
    if cancel.is_cancelled() {
        info!(label = %spec.label, "operation cancelled");
        return OperationResult::Cancelled;
    }

    let err = match exit {
        Some(Ok(status)) if status.success() => {
            let result = OperationResult::from_output(&spec.output);
            match &result {
                OperationResult::Completed { size, .. } => {
                    info!(output = %spec.output.display(), size, "operation completed")
                }
                OperationResult::Failed { reason, .. } => warn!(label = %spec.label, "operation failed: {}", reason),
                OperationResult::Cancelled => {}
            }
            return result;
        }
        Some(Ok(status)) => match status.code() {
            Some(code) => SupervisorError::ProcessExit {
                code,
                detail: detail_suffix(tail.last()),
            },
            None => SupervisorError::ProcessSignalled {
                detail: detail_suffix(Some(&status.to_string())),
            },
        },
        Some(Err(e)) => SupervisorError::IoError(e),
        None => SupervisorError::ProcessSignalled {
            detail: detail_suffix(Some("no exit status was reported")),
        },
    };

    warn!(label = %spec.label, "operation failed: {}", err);
    OperationResult::failed(&err)
}
