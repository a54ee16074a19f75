//! Provider retry configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::application::retry::RetryPolicy;

/// `[retry]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Attempts per provider call including the first (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// First backoff delay in milliseconds (default: 1000).
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    /// Backoff ceiling in milliseconds (default: 30000).
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_base_backoff_ms() -> u64 {
    1_000
}

const fn default_max_backoff_ms() -> u64 {
    30_000
}

impl RetryConfig {
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}
