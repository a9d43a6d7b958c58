use std::env;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_API_BASE: &str = "http://localhost:8080/api";
pub const DEFAULT_INITIAL_POLL_DELAY_MS: u64 = 1500;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;

/// Poll loop timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay before the first poll after the session gains focus.
    pub initial_delay: Duration,
    /// Delay between the end of one poll and the start of the next.
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_POLL_DELAY_MS),
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL the game routes hang off, without a trailing slash.
    pub api_base: String,
    pub poll: PollConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            poll: PollConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Builds the configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_base: api_base()?,
            poll: PollConfig {
                initial_delay: millis_var(
                    "CHESS_POLL_INITIAL_DELAY_MS",
                    DEFAULT_INITIAL_POLL_DELAY_MS,
                )?,
                interval: millis_var("CHESS_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?,
            },
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = normalize_base(&api_base.into());
        self
    }
}

fn api_base() -> Result<String, ConfigError> {
    match env::var("CHESS_API_BASE") {
        Ok(value) if value.trim().is_empty() => Err(ConfigError::Empty {
            name: "CHESS_API_BASE",
        }),
        Ok(value) => Ok(normalize_base(&value)),
        Err(_) => Ok(DEFAULT_API_BASE.to_string()),
    }
}

fn millis_var(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match env::var(name) {
        Ok(value) => parse_millis(name, &value),
        Err(_) => Ok(Duration::from_millis(default)),
    }
}

fn parse_millis(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidDuration {
            name,
            value: value.to_string(),
        })
}

fn normalize_base(value: &str) -> String {
    value.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_environment() {
        let config = ClientConfig::default();
        assert_eq!(config.poll.initial_delay, Duration::from_millis(1500));
        assert_eq!(config.poll.interval, Duration::from_millis(5000));
        assert_eq!(config.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn parse_millis_rejects_garbage() {
        assert_eq!(
            parse_millis("X", " 250 "),
            Ok(Duration::from_millis(250))
        );
        assert!(matches!(
            parse_millis("X", "soon"),
            Err(ConfigError::InvalidDuration { name: "X", .. })
        ));
    }

    #[test]
    fn api_base_loses_trailing_slash() {
        let config = ClientConfig::default().with_api_base("https://chess.example/api/");
        assert_eq!(config.api_base, "https://chess.example/api");
    }
}
