// TOML config adapter - Loads supervisor settings from TOML files

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SupervisorConfig;
use crate::error::{SupervisorError, SupervisorResult};

/// Files searched, in order, when no explicit config path is given
pub const DEFAULT_CONFIG_PATHS: &[&str] = &["vidsup.toml", "config/vidsup.toml"];

/// On-disk layout: everything lives under a `[supervisor]` table
#[derive(Debug, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    supervisor: SupervisorConfig,
}

/// Load configuration from `path`, or from the first default location that
/// exists, or fall back to built-in defaults.
///
/// An explicit path that does not exist is an error; missing default files are not.
pub fn load_config(path: Option<&Path>) -> SupervisorResult<(SupervisorConfig, Option<PathBuf>)> {
    let source = match path {
        Some(path) => {
            if !path.exists() {
                return Err(SupervisorError::InvalidConfig {
                    message: format!("Config file does not exist: {}", path.display()),
                });
            }
            Some(path.to_path_buf())
        }
        None => DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|candidate| candidate.exists()),
    };

    match source {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            let content = std::fs::read_to_string(&path)?;
            let config = parse_config(&content, &path)?;
            Ok((config, Some(path)))
        }
        None => {
            debug!("No configuration file found, using defaults");
            Ok((SupervisorConfig::default(), None))
        }
    }
}

/// Parse the TOML text of a config file
pub fn parse_config(content: &str, path: &Path) -> SupervisorResult<SupervisorConfig> {
    let file: ConfigFile = toml::from_str(content).map_err(|e| SupervisorError::ConfigParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    Ok(file.supervisor)
}

/// Render a configuration in the same layout `load_config` reads
pub fn serialize_config(config: &SupervisorConfig) -> SupervisorResult<String> {
    let file = ConfigFile {
        supervisor: config.clone(),
    };
    toml::to_string_pretty(&file).map_err(|e| SupervisorError::InvalidConfig {
        message: format!("Failed to serialize configuration: {}", e),
    })
}
