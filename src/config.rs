//! Application-level configuration loading: battle tuning, leaderboard refresh and question generation.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationSeconds, serde_as};
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_BATTLE_CONFIG_PATH";

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Room lifecycle and coordinator tuning.
    pub battle: BattleSettings,
    /// Global leaderboard refresh policy.
    pub leaderboard: LeaderboardSettings,
    /// External question generation endpoint.
    pub generator: GeneratorSettings,
}

/// Tuning knobs for battle rooms and their coordinators.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BattleSettings {
    /// Seconds allowed per question when the creator does not pick one.
    pub default_time_per_question: u32,
    /// Lower bound accepted for `time_per_question`.
    pub min_time_per_question: u32,
    /// Upper bound accepted for `time_per_question`.
    pub max_time_per_question: u32,
    /// Number of questions used when the creator does not pick one.
    pub default_total_questions: usize,
    /// Upper bound accepted for `total_questions`.
    pub max_total_questions: usize,
    /// Idle time after which a waiting room is force-completed.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub abandonment_window: Duration,
    /// Number of characters in a join code.
    pub room_code_length: usize,
    /// Attempts made to find a free join code before giving up.
    pub max_code_attempts: u32,
    /// Capacity of each room's inbound command queue.
    pub command_capacity: usize,
    /// Capacity of each room's update broadcast channel.
    pub update_capacity: usize,
    /// Attempts made to persist final results.
    pub finalize_attempts: u32,
    /// Delay before a timer-driven transition is retried after a storage failure.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub retry_delay: Duration,
    /// Upper bound on a single storage round-trip issued by a room.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub storage_timeout: Duration,
}

impl Default for BattleSettings {
    fn default() -> Self {
        Self {
            default_time_per_question: 30,
            min_time_per_question: 5,
            max_time_per_question: 120,
            default_total_questions: 5,
            max_total_questions: 50,
            abandonment_window: Duration::from_secs(300),
            room_code_length: 6,
            max_code_attempts: 16,
            command_capacity: 64,
            update_capacity: 64,
            finalize_attempts: 3,
            retry_delay: Duration::from_secs(2),
            storage_timeout: Duration::from_secs(5),
        }
    }
}

/// Refresh policy for the cached global leaderboard.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LeaderboardSettings {
    /// Interval between two scheduled recomputations.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub refresh_interval: Duration,
    /// Number of entries returned when the client does not ask for a limit.
    pub default_limit: usize,
    /// Hard cap on the number of entries returned.
    pub max_limit: usize,
}

impl Default for LeaderboardSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(60),
            default_limit: 50,
            max_limit: 500,
        }
    }
}

/// Where and how to reach the question generation service.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    /// Endpoint receiving `{topic, difficulty, count}` requests. Generation is disabled when unset.
    pub endpoint: Option<String>,
    /// Timeout applied to each generation request.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub request_timeout: Duration,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json_str(&contents) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        code_length = config.battle.room_code_length,
                        abandonment_secs = config.battle.abandonment_window.as_secs(),
                        "loaded configuration"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document, keeping defaults for every omitted field.
    pub fn from_json_str(contents: &str) -> serde_json::Result<Self> {
        let mut config: Self = serde_json::from_str(contents)?;
        config.battle.room_code_length = config.battle.room_code_length.max(1);
        config.battle.command_capacity = config.battle.command_capacity.max(1);
        config.battle.update_capacity = config.battle.update_capacity.max(1);
        config.battle.finalize_attempts = config.battle.finalize_attempts.max(1);
        Ok(config)
    }

    /// Override the generator endpoint, typically from the process environment.
    pub fn with_generator_endpoint(mut self, endpoint: Option<String>) -> Self {
        if let Some(endpoint) = endpoint.filter(|value| !value.trim().is_empty()) {
            self.generator.endpoint = Some(endpoint);
        }
        self
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = AppConfig::from_json_str("{}").unwrap();
        assert_eq!(config.battle.default_time_per_question, 30);
        assert_eq!(config.battle.abandonment_window, Duration::from_secs(300));
        assert_eq!(config.leaderboard.refresh_interval, Duration::from_secs(60));
        assert!(config.generator.endpoint.is_none());
    }

    #[test]
    fn durations_are_read_in_seconds() {
        let config = AppConfig::from_json_str(
            r#"{"battle": {"abandonment_window": 90, "retry_delay": 1}, "leaderboard": {"refresh_interval": 15}}"#,
        )
        .unwrap();
        assert_eq!(config.battle.abandonment_window, Duration::from_secs(90));
        assert_eq!(config.battle.retry_delay, Duration::from_secs(1));
        assert_eq!(config.battle.room_code_length, 6);
        assert_eq!(config.leaderboard.refresh_interval, Duration::from_secs(15));
    }

    #[test]
    fn degenerate_values_are_clamped() {
        let config = AppConfig::from_json_str(
            r#"{"battle": {"room_code_length": 0, "command_capacity": 0, "finalize_attempts": 0}}"#,
        )
        .unwrap();
        assert_eq!(config.battle.room_code_length, 1);
        assert_eq!(config.battle.command_capacity, 1);
        assert_eq!(config.battle.finalize_attempts, 1);
    }

    #[test]
    fn environment_endpoint_overrides_file() {
        let config = AppConfig::default()
            .with_generator_endpoint(Some("http://generator.local/questions".into()));
        assert_eq!(
            config.generator.endpoint.as_deref(),
            Some("http://generator.local/questions")
        );
        let untouched = AppConfig::default().with_generator_endpoint(Some("  ".into()));
        assert!(untouched.generator.endpoint.is_none());
    }
}
