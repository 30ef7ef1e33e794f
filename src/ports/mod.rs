// Ports - Interface definitions (contracts)

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::model::{OperationResult, WorkKind};
use crate::error::SupervisorResult;

/// Port for single-keystroke terminal input.
///
/// Implementations put the input device into a mode where keys arrive
/// without Enter and without echo, and put it back afterwards. The listener
/// calls `enter_raw_mode` once, `read_key` from its background thread, and
/// `restore_mode` from both the thread and `stop()`, so `restore_mode` must be
/// idempotent and safe to call without a prior `enter_raw_mode`.
pub trait KeyInput: Send + Sync {
    /// Short strategy name for logs
    fn name(&self) -> &'static str;

    /// Save the current mode and switch to unbuffered, non-echoing input
    fn enter_raw_mode(&self) -> SupervisorResult<()>;

    /// Wait at most `timeout` for one key
    fn read_key(&self, timeout: Duration) -> SupervisorResult<Option<char>>;

    /// Restore the saved mode, if any
    fn restore_mode(&self) -> SupervisorResult<()>;
}

/// Port for running a unit of work with cancellation and progress display
#[async_trait]
pub trait OperationPort: Send + Sync {
    /// Run the work to completion, failure or cancellation. Never panics.
    async fn run(&self, work: WorkKind) -> OperationResult;
}
