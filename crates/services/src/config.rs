use std::time::Duration;

use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use crate::stats::ChallengeConfig;

pub const ENV_RETRY_ATTEMPTS: &str = "QUIZ_RETRY_ATTEMPTS";
pub const ENV_RETRY_DELAY_MS: &str = "QUIZ_RETRY_DELAY_MS";
pub const ENV_RECENT_SESSIONS: &str = "QUIZ_RECENT_SESSIONS";
pub const ENV_QUESTION_COUNT: &str = "QUIZ_QUESTION_COUNT";

/// Tunables for the sync layer and quiz flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub retry: RetryPolicy,
    /// How many recent sessions feed the dashboard.
    pub recent_sessions: u32,
    /// Questions sampled per quiz.
    pub question_count: usize,
    pub challenge: ChallengeConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            recent_sessions: 50,
            question_count: 10,
            challenge: ChallengeConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Defaults overridden by `QUIZ_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a set variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading values through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a present value does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(attempts) = parse(&lookup, ENV_RETRY_ATTEMPTS)? {
            config.retry = RetryPolicy::new(attempts, config.retry.delay);
        }
        if let Some(ms) = parse::<u64>(&lookup, ENV_RETRY_DELAY_MS)? {
            config.retry.delay = Duration::from_millis(ms);
        }
        if let Some(recent) = parse(&lookup, ENV_RECENT_SESSIONS)? {
            config.recent_sessions = recent;
        }
        if let Some(count) = parse::<usize>(&lookup, ENV_QUESTION_COUNT)? {
            if count == 0 {
                return Err(ConfigError::Invalid {
                    key: ENV_QUESTION_COUNT,
                    value: count.to_string(),
                });
            }
            config.question_count = count;
        }

        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::Invalid { key, value: raw })
}
