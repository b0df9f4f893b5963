use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;

use crate::constants::DEFAULT_MAX_QUIESCE_MS;
use crate::constants::DEFAULT_MIN_QUIESCE_MS;
use crate::Result;

/// Coalescing window applied by the coordinator before it notifies the
/// consumer about changed dependencies.
///
/// Every change event before `min_wait_ms` elapses re-arms the minimum
/// timer; `max_wait_ms` bounds the total settle time of one batch so a
/// constant stream of changes cannot defer the notification forever.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct QuiescenceConfig {
    #[serde(default = "default_min_quiesce_ms")]
    pub min_wait_ms: u64,

    #[serde(default = "default_max_quiesce_ms")]
    pub max_wait_ms: u64,
}

impl Default for QuiescenceConfig {
    fn default() -> Self {
        Self {
            min_wait_ms: DEFAULT_MIN_QUIESCE_MS,
            max_wait_ms: DEFAULT_MAX_QUIESCE_MS,
        }
    }
}

impl QuiescenceConfig {
    pub fn min_wait(&self) -> Duration {
        Duration::from_millis(self.min_wait_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.min_wait_ms == 0 {
            return Err(ConfigError::Message("quiescence.min_wait_ms must be greater than zero".to_string()).into());
        }
        if self.max_wait_ms < self.min_wait_ms {
            return Err(ConfigError::Message(
                "quiescence.max_wait_ms must not be smaller than quiescence.min_wait_ms".to_string(),
            )
            .into());
        }
        Ok(())
    }
}

fn default_min_quiesce_ms() -> u64 {
    DEFAULT_MIN_QUIESCE_MS
}
fn default_max_quiesce_ms() -> u64 {
    DEFAULT_MAX_QUIESCE_MS
}
