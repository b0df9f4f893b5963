use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;

use crate::constants::DEFAULT_BASE_DELAY_MS;
use crate::constants::DEFAULT_MAX_DELAY_MS;
use crate::Result;

/// Bounded exponential backoff applied by a view between failed fetches.
///
/// The delay starts at `base_delay_ms`, doubles per consecutive failure and
/// caps at `max_delay_ms`. The consecutive-failure counter resets on any
/// successful fetch.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct BackoffPolicy {
    /// Maximum number of consecutive retries (0 means unlimited retries)
    #[serde(default)]
    pub max_retries: usize,

    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exp = attempt.saturating_sub(1).min(16) as u32;
        let delay_ms = self
            .base_delay_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }

    /// Whether `attempt` consecutive failures exhausted this policy.
    pub fn exhausted(&self, attempt: usize) -> bool {
        self.max_retries != 0 && attempt > self.max_retries
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.base_delay_ms == 0 {
            return Err(ConfigError::Message("retry.base_delay_ms must be greater than zero".to_string()).into());
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(ConfigError::Message(
                "retry.max_delay_ms must not be smaller than retry.base_delay_ms".to_string(),
            )
            .into());
        }
        Ok(())
    }
}

fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}
