//! Configuration for the watch core.
//!
//! Settings merge from multiple sources with priority:
//! 1. Default values (hardcoded)
//! 2. Optional TOML file
//! 3. Environment variables (highest priority)

mod retry;
mod watch;
pub use retry::*;
pub use watch::*;

#[cfg(test)]
mod retry_test;

//---
use crate::constants::DEFAULT_WAIT_MS;
use crate::Result;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct WatchSettings {
    /// Change-notification coalescing window
    #[serde(default)]
    pub quiescence: QuiescenceConfig,

    /// View retry policy for transient backend failures
    #[serde(default)]
    pub retry: BackoffPolicy,

    /// Long-poll wait hint passed to backends, in milliseconds
    #[serde(default = "default_wait_ms")]
    pub default_wait_ms: u64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            quiescence: QuiescenceConfig::default(),
            retry: BackoffPolicy::default(),
            default_wait_ms: DEFAULT_WAIT_MS,
        }
    }
}

impl WatchSettings {
    /// Load settings merged from an optional TOML file and `CONFWATCH__*`
    /// environment variables. File values override defaults, environment
    /// values override the file.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }

        let config = builder
            .add_source(
                Environment::with_prefix("CONFWATCH")
                    .separator("__")
                    .ignore_empty(true)
                    .try_parsing(true),
            )
            .build()?;

        let settings: WatchSettings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn default_wait(&self) -> Duration {
        Duration::from_millis(self.default_wait_ms)
    }

    fn validate(&self) -> Result<()> {
        self.quiescence.validate()?;
        self.retry.validate()?;
        Ok(())
    }
}

fn default_wait_ms() -> u64 {
    DEFAULT_WAIT_MS
}
