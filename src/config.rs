//! Application-level configuration loading: scoring constants, the store
//! retry policy, and lobby defaults.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::services::scoring::ScoringTuning;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "HOOTLINE_BACK_CONFIG_PATH";

/// Bounded-retry parameters for optimistic store updates.
///
/// This is the contention policy only; code allocation runs its own,
/// unrelated attempt loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum read-modify-write attempts before surfacing contention.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles each retry.
    pub initial_backoff: Duration,
    /// Ceiling for the doubling backoff.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    scoring: ScoringTuning,
    retry: RetryPolicy,
    code_attempts: u32,
    default_max_players: usize,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in
    /// defaults when the file is absent or unreadable.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration");
                    app_config
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

    /// Scoring constants applied to every answer.
    pub fn scoring(&self) -> &ScoringTuning {
        &self.scoring
    }

    /// Retry policy for transactional store updates.
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Attempt cap for unique-code allocation.
    pub fn code_attempts(&self) -> u32 {
        self.code_attempts
    }

    /// Lobby size applied when a session is created without an explicit cap.
    pub fn default_max_players(&self) -> usize {
        self.default_max_players
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringTuning::default(),
            retry: RetryPolicy::default(),
            code_attempts: 8,
            default_max_players: 8,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    scoring: Option<RawScoring>,
    #[serde(default)]
    retry: Option<RawRetry>,
    #[serde(default)]
    code_attempts: Option<u32>,
    #[serde(default)]
    default_max_players: Option<usize>,
}

#[derive(Debug, Deserialize)]
/// JSON representation of the scoring constants.
struct RawScoring {
    base_points: Option<u32>,
    time_bonus_cap: Option<u32>,
    time_bonus_divisor_ms: Option<u32>,
    streak_multiplier: Option<u32>,
}

#[derive(Debug, Deserialize)]
/// JSON representation of the store retry policy, durations in milliseconds.
struct RawRetry {
    max_attempts: Option<u32>,
    initial_backoff_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = AppConfig::default();

        let scoring = value
            .scoring
            .map(|raw| {
                let base = ScoringTuning::default();
                ScoringTuning {
                    base_points: raw.base_points.unwrap_or(base.base_points),
                    time_bonus_cap: raw.time_bonus_cap.unwrap_or(base.time_bonus_cap),
                    time_bonus_divisor_ms: raw
                        .time_bonus_divisor_ms
                        .unwrap_or(base.time_bonus_divisor_ms),
                    streak_multiplier: raw.streak_multiplier.unwrap_or(base.streak_multiplier),
                }
            })
            .unwrap_or(defaults.scoring);

        let retry = value
            .retry
            .map(|raw| {
                let base = RetryPolicy::default();
                RetryPolicy {
                    max_attempts: raw.max_attempts.unwrap_or(base.max_attempts).max(1),
                    initial_backoff: raw
                        .initial_backoff_ms
                        .map(Duration::from_millis)
                        .unwrap_or(base.initial_backoff),
                    max_backoff: raw
                        .max_backoff_ms
                        .map(Duration::from_millis)
                        .unwrap_or(base.max_backoff),
                }
            })
            .unwrap_or(defaults.retry);

        Self {
            scoring,
            retry,
            code_attempts: value.code_attempts.unwrap_or(defaults.code_attempts).max(1),
            default_max_players: value
                .default_max_players
                .unwrap_or(defaults.default_max_players),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
