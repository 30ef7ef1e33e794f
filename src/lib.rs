//! vidsup library
//!
//! Runs long video operations (an FFmpeg process or a blocking library call)
//! with a live single-line status display and single-keystroke cancellation.
//! The terminal is always restored and background activity always stopped
//! before an operation's outcome is returned.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ports;
pub mod utils;

// Re-export commonly used types
pub use config::SupervisorConfig;
pub use domain::model::{
    CancelToken, OpaqueCall, OperationResult, ProcessSpec, SharedStats, StatSnapshot, WorkKind,
};
pub use engine::{CancellableProcessRunner, OperationSupervisor, StreamStatsParser};
pub use error::{SupervisorError, SupervisorResult};
pub use ports::{KeyInput, OperationPort};
