//! Configuration initialization and hierarchy management

use anyhow::{Context, Result};
use tracing::info;

use vidsup::adapters::load_config;
use vidsup::SupervisorConfig;

use crate::cli::Cli;

/// Build the effective configuration following precedence: CLI > Env > File > Defaults
pub fn initialize_configuration_hierarchy(cli: &Cli) -> Result<SupervisorConfig> {
    initialize_with_env(cli, |name| std::env::var(name).ok())
}

fn initialize_with_env<F>(cli: &Cli, lookup: F) -> Result<SupervisorConfig>
where
    F: Fn(&str) -> Option<String>,
{
    info!("Initializing configuration hierarchy");

    // Steps 1 and 2: defaults, then the config file if one is found
    let (mut config, source) =
        load_config(cli.config.as_deref()).context("Failed to load configuration file")?;
    match source {
        Some(path) => info!("Loaded configuration from: {}", path.display()),
        None => info!("No config file loaded, using defaults"),
    }

    // Step 3: environment variables
    let env_overrides = config
        .apply_env_overrides(lookup)
        .context("Invalid environment override")?;
    if env_overrides > 0 {
        info!("Applied {} environment variable overrides", env_overrides);
    }

    // Step 4: command-line arguments
    let cli_overrides = apply_cli_configuration_overrides(&mut config, cli);
    if cli_overrides > 0 {
        info!("Applied {} CLI configuration overrides", cli_overrides);
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn apply_cli_configuration_overrides(config: &mut SupervisorConfig, cli: &Cli) -> usize {
    let mut cli_overrides = 0;

    if let Some(grace_ms) = cli.grace_ms {
        info!("CLI override: grace_period_ms = {}", grace_ms);
        config.grace_period_ms = grace_ms;
        cli_overrides += 1;
    }
    if let Some(repaint_ms) = cli.repaint_ms {
        info!("CLI override: repaint_interval_ms = {}", repaint_ms);
        config.repaint_interval_ms = repaint_ms;
        cli_overrides += 1;
    }

    cli_overrides
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_beats_env_beats_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[supervisor]\ngrace_period_ms = 1000\nrepaint_interval_ms = 300\nkey_poll_ms = 50"
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let cli = parse(&["vidsup", "--config", &path, "--grace-ms", "3000", "config"]);
        let config = initialize_with_env(&cli, |name| match name {
            "VIDSUP_GRACE_PERIOD_MS" => Some("2000".to_string()),
            "VIDSUP_REPAINT_INTERVAL_MS" => Some("250".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.grace_period_ms, 3000);
        assert_eq!(config.repaint_interval_ms, 250);
        assert_eq!(config.key_poll_ms, 50);
        assert_eq!(config.join_timeout_ms, SupervisorConfig::default().join_timeout_ms);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let cli = parse(&["vidsup", "--config", "/nonexistent/vidsup.toml", "config"]);
        assert!(initialize_with_env(&cli, |_| None).is_err());
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let cli = parse(&["vidsup", "--repaint-ms", "0", "config"]);
        assert!(initialize_with_env(&cli, |_| None).is_err());

        let cli = parse(&["vidsup", "config"]);
        let result = initialize_with_env(&cli, |name| {
            (name == "VIDSUP_KEY_POLL_MS").then(|| "fast".to_string())
        });
        assert!(result.is_err());
    }
}
