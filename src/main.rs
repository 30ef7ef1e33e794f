//! vidsup command-line front end
//!
//! Runs a long video operation with a live status line on stdout and logs on
//! stderr. Press the cancel key (default `q`) to stop it.
//!
//! # Usage
//!
//! ```bash
//! vidsup exec --output clip.mp4 -- ffmpeg -i input.mov -c:v libx264 clip.mp4
//! vidsup copy --input big.mov --output backup.mov
//! vidsup config --json
//! ```
//!
//! Exit codes: 0 completed, 1 failed, 130 cancelled.

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error};

mod cli;
mod config_initialization;

use cli::{commands, Cli, Commands};
use config_initialization::initialize_configuration_hierarchy;
use vidsup::adapters::init_logging;
use vidsup::OperationSupervisor;

/// Main entry point for the vidsup CLI application
#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli.log_level, cli.log_json) {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let config = initialize_configuration_hierarchy(&cli)?;
    debug!(?config, "effective configuration");

    let outcome = match cli.command {
        Commands::Exec(args) => {
            let supervisor = OperationSupervisor::new(config);
            commands::exec(&supervisor, args).await?
        }
        Commands::Copy(args) => {
            let supervisor = OperationSupervisor::new(config);
            commands::copy(&supervisor, args).await?
        }
        Commands::Config(args) => {
            commands::config(&config, args)?;
            return Ok(0);
        }
    };

    Ok(outcome.exit_code())
}
