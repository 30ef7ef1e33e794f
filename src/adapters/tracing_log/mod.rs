// Tracing log adapter - Structured logging using tracing crate

use tracing_subscriber::EnvFilter;

use crate::error::{SupervisorError, SupervisorResult};

/// Log levels accepted on the command line
pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Install the global subscriber.
///
/// Logs go to stderr so they never share a line with the status display on
/// stdout. `RUST_LOG` wins over `level` when set. Calling this twice is harmless.
pub fn init_logging(level: &str, json: bool) -> SupervisorResult<()> {
    let level = level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(SupervisorError::InvalidConfig {
            message: format!(
                "Invalid log level: {}. Valid levels: {}",
                level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    // Another subscriber may already be installed (tests, embedding apps).
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    Ok(())
}
