//! Supervision engine: key listener, statistics parser, status renderer,
//! process runner and the supervisor that ties them together

pub mod listener;
pub mod progress;
pub mod runner;
pub mod scope;
pub mod stats;
pub mod supervisor;

pub use listener::{detect_key_input, NoopKeyInput, RawInputListener};
pub use progress::{stdout_sink, DisplayMode, LiveStatusRenderer, StatusSink};
pub use runner::CancellableProcessRunner;
pub use scope::{ConsoleIo, OperationScope};
pub use stats::StreamStatsParser;
pub use supervisor::OperationSupervisor;
