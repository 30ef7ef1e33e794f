//! Error handling module for vidsup

use thiserror::Error;

/// Main error type for supervised operations
#[derive(Error, Debug)]
pub enum SupervisorError {
    /// Raw keyboard input could not be enabled; cancellation is unavailable
    #[error("Terminal raw mode unavailable: {reason}")]
    TerminalModeUnavailable { reason: String },

    /// The external process could not be started
    #[error("Failed to start '{program}': {source}")]
    ProcessSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external process finished with a non-success exit code
    #[error("Process failed with code {code}{detail}")]
    ProcessExit { code: i32, detail: String },

    /// The external process was terminated by a signal
    #[error("Process terminated by signal{detail}")]
    ProcessSignalled { detail: String },

    /// The process reported success but the expected artifact is absent or empty
    #[error("Expected output is missing or empty: {path}")]
    MissingOutput { path: String },

    /// The child ignored the graceful termination request
    #[error("Process did not exit within {grace_ms} ms of the termination request")]
    TerminationTimeout { grace_ms: u64 },

    /// An opaque library call returned an error
    #[error("Operation failed: {message}")]
    OpaqueCall { message: String },

    /// A background task panicked or vanished
    #[error("Background task panicked: {message}")]
    TaskPanicked { message: String },

    /// A process spec without a program
    #[error("No program given to execute")]
    EmptyCommand,

    /// Configuration value rejected during validation
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Configuration file could not be parsed
    #[error("Failed to parse configuration file {path}: {message}")]
    ConfigParse { path: String, message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for supervisor operations
pub type SupervisorResult<T> = std::result::Result<T, SupervisorError>;

/// Format an optional trailing detail as `": detail"`
pub(crate) fn detail_suffix(detail: Option<&str>) -> String {
    match detail {
        Some(text) if !text.trim().is_empty() => format!(": {}", text.trim()),
        _ => String::new(),
    }
}
