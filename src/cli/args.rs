//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;

/// Arguments for the exec command
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// File the command is expected to produce
    #[arg(short, long)]
    pub output: PathBuf,

    /// Name shown on the status line (default: the program name)
    #[arg(short, long)]
    pub label: Option<String>,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,

    /// Program and arguments, after `--`
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

/// Arguments for the copy command
#[derive(Args, Debug)]
pub struct CopyArgs {
    /// Source file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Destination file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Print the outcome as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the config command
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Print as JSON instead of TOML
    #[arg(long)]
    pub json: bool,
}
