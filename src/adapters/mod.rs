// Adapters - External system implementations

#[cfg(windows)]
pub mod console_input;
#[cfg(unix)]
pub mod termios_input;
pub mod toml_config;
pub mod tracing_log;

// Re-export adapters
#[cfg(windows)]
pub use console_input::ConsoleKeyInput;
#[cfg(unix)]
pub use termios_input::TermiosKeyInput;
pub use toml_config::load_config;
pub use tracing_log::init_logging;
