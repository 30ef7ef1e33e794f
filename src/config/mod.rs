//! Supervisor configuration values and environment overrides

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{SupervisorError, SupervisorResult};

/// Tunables for listener, renderer and process runner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Key that requests cancellation (case-insensitive)
    pub cancel_key: char,
    /// Status line repaint cadence
    pub repaint_interval_ms: u64,
    /// How long a child gets to exit after the graceful termination request
    pub grace_period_ms: u64,
    /// Upper bound for joining the listener and renderer threads
    pub join_timeout_ms: u64,
    /// Upper bound for a single wait on child output
    pub read_poll_ms: u64,
    /// Upper bound for a single wait on a keystroke
    pub key_poll_ms: u64,
    /// Status line width cap, in characters
    pub max_status_width: usize,
    /// Output lines kept for failure messages
    pub diagnostic_lines: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            cancel_key: 'q',
            repaint_interval_ms: 500,
            grace_period_ms: 5_000,
            join_timeout_ms: 1_000,
            read_poll_ms: 200,
            key_poll_ms: 100,
            max_status_width: 120,
            diagnostic_lines: 5,
        }
    }
}

/// Environment variables recognised as overrides, and the key each one sets
pub const ENV_MAPPINGS: &[(&str, &str)] = &[
    ("VIDSUP_CANCEL_KEY", "cancel_key"),
    ("VIDSUP_REPAINT_INTERVAL_MS", "repaint_interval_ms"),
    ("VIDSUP_GRACE_PERIOD_MS", "grace_period_ms"),
    ("VIDSUP_JOIN_TIMEOUT_MS", "join_timeout_ms"),
    ("VIDSUP_READ_POLL_MS", "read_poll_ms"),
    ("VIDSUP_KEY_POLL_MS", "key_poll_ms"),
    ("VIDSUP_MAX_STATUS_WIDTH", "max_status_width"),
    ("VIDSUP_DIAGNOSTIC_LINES", "diagnostic_lines"),
];

impl SupervisorConfig {
    pub fn repaint_interval(&self) -> Duration {
        Duration::from_millis(self.repaint_interval_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn read_poll(&self) -> Duration {
        Duration::from_millis(self.read_poll_ms)
    }

    pub fn key_poll(&self) -> Duration {
        Duration::from_millis(self.key_poll_ms)
    }

    /// Set a single value by its config key
    pub fn set(&mut self, key: &str, value: &str) -> SupervisorResult<()> {
        let value = value.trim();
        match key {
            "cancel_key" => {
                let mut chars = value.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => self.cancel_key = c,
                    _ => {
                        return Err(SupervisorError::InvalidConfig {
                            message: format!("cancel_key must be a single character, got '{}'", value),
                        })
                    }
                }
            }
            "repaint_interval_ms" => self.repaint_interval_ms = parse_number(key, value)?,
            "grace_period_ms" => self.grace_period_ms = parse_number(key, value)?,
            "join_timeout_ms" => self.join_timeout_ms = parse_number(key, value)?,
            "read_poll_ms" => self.read_poll_ms = parse_number(key, value)?,
            "key_poll_ms" => self.key_poll_ms = parse_number(key, value)?,
            "max_status_width" => self.max_status_width = parse_number(key, value)?,
            "diagnostic_lines" => self.diagnostic_lines = parse_number(key, value)?,
            _ => {
                return Err(SupervisorError::InvalidConfig {
                    message: format!("unknown configuration key '{}'", key),
                })
            }
        }
        Ok(())
    }

    /// Apply `VIDSUP_*` overrides read through `lookup`; returns how many were applied
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> SupervisorResult<usize>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = 0;
        for (env_var, key) in ENV_MAPPINGS {
            if let Some(value) = lookup(env_var) {
                info!("Found environment override: {} = {}", env_var, value);
                self.set(key, &value)?;
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Reject values that would make the supervisor hang or misbehave
    pub fn validate(&self) -> SupervisorResult<()> {
        let positive = [
            ("repaint_interval_ms", self.repaint_interval_ms),
            ("grace_period_ms", self.grace_period_ms),
            ("join_timeout_ms", self.join_timeout_ms),
            ("read_poll_ms", self.read_poll_ms),
            ("key_poll_ms", self.key_poll_ms),
        ];
        for (key, value) in positive {
            if value == 0 {
                return Err(SupervisorError::InvalidConfig {
                    message: format!("{} must be greater than zero", key),
                });
            }
        }

        if self.max_status_width < 20 {
            return Err(SupervisorError::InvalidConfig {
                message: format!(
                    "max_status_width must be at least 20, got {}",
                    self.max_status_width
                ),
            });
        }

        if self.cancel_key.is_whitespace() || self.cancel_key.is_control() {
            return Err(SupervisorError::InvalidConfig {
                message: "cancel_key must be a printable character".to_string(),
            });
        }

        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> SupervisorResult<T>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e| SupervisorError::InvalidConfig {
        message: format!("invalid value '{}' for {}: {}", value, key, e),
    })
}
