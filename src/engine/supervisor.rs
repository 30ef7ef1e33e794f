//! Top-level orchestration of one supervised operation

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::config::SupervisorConfig;
use crate::domain::model::{CancelToken, OpaqueCall, OperationResult, ProcessSpec, SharedStats, WorkKind};
use crate::engine::progress::{DisplayMode, StatusSink};
use crate::engine::runner::CancellableProcessRunner;
use crate::engine::scope::ConsoleIo;
use crate::error::SupervisorError;
use crate::ports::{KeyInput, OperationPort};

/// Runs processes and opaque library calls with a live status line and
/// keyboard cancellation.
///
/// Every operation gets a fresh [`CancelToken`], so a cancellation never
/// carries over to the next one.
///
/// # Opaque calls
///
/// An [`OpaqueCall`] has no progress hooks and no cancellation point. The call
/// runs on its own OS thread while the status line shows a spinner. When the
/// user cancels, `run` returns [`OperationResult::Cancelled`] immediately but
/// the call keeps running in the background until it finishes on its own; its
/// result, success or failure, is then discarded. Any side effects it has
/// (files written, network traffic) still happen.
#[derive(Debug, Clone)]
pub struct OperationSupervisor {
    io: ConsoleIo,
}

impl OperationSupervisor {
    /// Supervisor bound to this process's terminal
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            io: ConsoleIo::detect(config),
        }
    }

    /// Supervisor with injected key input and status output
    pub fn with_io(config: SupervisorConfig, key_input: Arc<dyn KeyInput>, sink: StatusSink) -> Self {
        Self {
            io: ConsoleIo::new(config, key_input, sink),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        self.io.config()
    }

    async fn run_process(&self, spec: ProcessSpec) -> OperationResult {
        let cancel = CancelToken::new();
        let runner = CancellableProcessRunner::new(self.io.clone());
        let task_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            runner.run_with_stats(&spec, &task_cancel, SharedStats::new()).await
        });

        match task.await {
            Ok(result) => result,
            Err(join_error) => {
                let message = if join_error.is_panic() {
                    panic_message(join_error.into_panic().as_ref())
                } else {
                    "runner task was aborted".to_string()
                };
                let err = SupervisorError::TaskPanicked { message };
                error!("{}", err);
                if cancel.is_cancelled() {
                    OperationResult::Cancelled
                } else {
                    OperationResult::failed(&err)
                }
            }
        }
    }

    async fn run_opaque(&self, call: OpaqueCall) -> OperationResult {
        let cancel = CancelToken::new();
        let stats = SharedStats::new();
        let OpaqueCall { label, call } = call;

        let scope = self.io.open_scope(&label, DisplayMode::Heartbeat, &cancel, &stats);

        let (tx, rx) = oneshot::channel();
        let thread_label = label.clone();
        let spawned = thread::Builder::new()
            .name("opaque-call".to_string())
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(call));
                if tx.send(outcome).is_err() {
                    debug!(label = %thread_label, "discarding result of cancelled operation");
                }
            });
        if let Err(e) = spawned {
            scope.close_async().await;
            return OperationResult::failed(&SupervisorError::IoError(e));
        }

        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            received = rx => Some(received),
        };
        scope.close_async().await;

        if cancel.is_cancelled() {
            info!(label = %label, "operation cancelled; the call continues in the background");
            return OperationResult::Cancelled;
        }

        let err = match received {
            Some(Ok(Ok(Ok(output)))) => {
                let result = OperationResult::from_output(&output);
                match &result {
                    OperationResult::Completed { size, .. } => {
                        info!(label = %label, output = %output.display(), size, "operation completed")
                    }
                    OperationResult::Failed { reason, .. } => error!(label = %label, "operation failed: {}", reason),
                    OperationResult::Cancelled => {}
                }
                return result;
            }
            Some(Ok(Ok(Err(e)))) => SupervisorError::OpaqueCall {
                message: format!("{:#}", e),
            },
            Some(Ok(Err(payload))) => SupervisorError::TaskPanicked {
                message: panic_message(payload.as_ref()),
            },
            Some(Err(_)) | None => SupervisorError::TaskPanicked {
                message: "operation thread ended without a result".to_string(),
            },
        };
        error!(label = %label, "{}", err);
        OperationResult::failed(&err)
    }
}

#[async_trait]
impl OperationPort for OperationSupervisor {
    async fn run(&self, work: WorkKind) -> OperationResult {
        debug!(label = work.label(), "starting supervised operation");
        match work {
            WorkKind::Process(spec) => self.run_process(spec).await,
            WorkKind::Opaque(call) => self.run_opaque(call).await,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
