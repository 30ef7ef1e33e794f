//! CLI module for vidsup
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod args;
pub mod commands;

/// vidsup - supervised long-running video operations
///
/// Runs a command or a file copy with a live status line; press the cancel
/// key (default `q`) to stop it.
#[derive(Parser, Debug)]
#[command(name = "vidsup")]
#[command(about = "Run long video operations with live status and single-key cancellation")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Logging level (overridden by RUST_LOG)
    #[arg(long, default_value = "warn", global = true)]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Configuration file (default: vidsup.toml or config/vidsup.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Grace period before a cancelled process is killed, in milliseconds
    #[arg(long, global = true)]
    pub grace_ms: Option<u64>,

    /// Status line repaint interval, in milliseconds
    #[arg(long, global = true)]
    pub repaint_ms: Option<u64>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an external command under supervision
    Exec(args::ExecArgs),
    /// Copy a file as a blocking operation with a heartbeat display.
    ///
    /// Cancelling stops the wait at once, but the copy itself runs to completion in the background.
    Copy(args::CopyArgs),
    /// Print the effective configuration
    Config(args::ConfigArgs),
}
