//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryConfig;
use crate::usage::UsageLimits;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Scenes generating media at the same time, across all stories
    pub max_concurrent_scenes: usize,
    /// In-flight calls to generative services, across all stories
    pub max_external_calls: usize,
    /// Attempts per external call, including the first
    pub retry_max_attempts: u32,
    /// First backoff delay; doubles per failed attempt
    pub retry_base_delay: Duration,
    /// Cap on a single backoff delay
    pub retry_max_delay: Duration,
    /// Directory for persisted story state; `None` keeps state in memory
    pub state_dir: Option<PathBuf>,
    /// Optional daily call limits per capability
    pub usage_limits: UsageLimits,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_scenes: 3,
            max_external_calls: 4,
            retry_max_attempts: 6,
            retry_base_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(60),
            state_dir: None,
            usage_limits: UsageLimits::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_concurrent_scenes: env_parse::<usize>("WORKER_MAX_CONCURRENT_SCENES")
                .unwrap_or(defaults.max_concurrent_scenes)
                .max(1),
            max_external_calls: env_parse::<usize>("WORKER_MAX_EXTERNAL_CALLS")
                .unwrap_or(defaults.max_external_calls)
                .max(1),
            retry_max_attempts: env_parse::<u32>("WORKER_RETRY_MAX_ATTEMPTS")
                .unwrap_or(defaults.retry_max_attempts)
                .max(1),
            retry_base_delay: env_parse("WORKER_RETRY_BASE_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_base_delay),
            retry_max_delay: env_parse("WORKER_RETRY_MAX_DELAY_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry_max_delay),
            state_dir: std::env::var("STATE_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            usage_limits: UsageLimits {
                text: env_parse("DAILY_TEXT_LIMIT"),
                image: env_parse("DAILY_IMAGE_LIMIT"),
                audio: env_parse("DAILY_AUDIO_LIMIT"),
            },
        }
    }

    /// Retry policy for one kind of external call.
    pub fn retry_config(&self, operation_name: &str) -> RetryConfig {
        RetryConfig::new(operation_name)
            .with_max_attempts(self.retry_max_attempts)
            .with_base_delay(self.retry_base_delay)
            .with_max_delay(self.retry_max_delay)
    }
}
