use std::{env, fmt::Display, str::FromStr};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Bounds and default for poll durations, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub default_minutes: i64,
    pub min_minutes: i64,
    pub max_minutes: i64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            default_minutes: 10,
            min_minutes: 1,
            max_minutes: 1440,
        }
    }
}

impl PollConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_minutes < 1 {
            return Err(ConfigError::Invalid {
                key: "POLL_MIN_MINUTES",
                reason: "must be at least 1".into(),
            });
        }
        if self.max_minutes > i64::from(i32::MAX) {
            return Err(ConfigError::Invalid {
                key: "POLL_MAX_MINUTES",
                reason: format!("must not exceed {}", i32::MAX),
            });
        }
        if !(self.min_minutes..=self.max_minutes).contains(&self.default_minutes) {
            return Err(ConfigError::Invalid {
                key: "POLL_DEFAULT_MINUTES",
                reason: format!(
                    "must lie within {}..={}",
                    self.min_minutes, self.max_minutes
                ),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    pub poll: PollConfig,
}

impl Config {
    /// Read from the environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = PollConfig::default();
        let poll = PollConfig {
            default_minutes: try_load("POLL_DEFAULT_MINUTES", defaults.default_minutes)?,
            min_minutes: try_load("POLL_MIN_MINUTES", defaults.min_minutes)?,
            max_minutes: try_load("POLL_MAX_MINUTES", defaults.max_minutes)?,
        };
        poll.validate()?;

        Ok(Self {
            port: try_load("PORT", 3030)?,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            max_connections: try_load("DB_MAX_CONNECTIONS", 5)?,
            poll,
        })
    }
}

fn try_load<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                reason: e.to_string(),
            }
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
