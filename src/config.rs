//! Runtime settings.
//!
//! Layered with the `config` crate: built-in defaults, an optional TOML file,
//! then `ATHLETE_MONITOR_*` environment variables (nested keys separated by
//! `__`, e.g. `ATHLETE_MONITOR_RECONNECT__MAX_DELAY_MS=10000`). Command-line
//! flags are applied on top by the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::data::{Thresholds, DEFAULT_CAPACITY, DEFAULT_CHART_CAPACITY, DEFAULT_FALLBACK_RETAIN};
use crate::source::ReconnectPolicy;

pub const DEFAULT_ENDPOINT: &str = "ws://192.168.4.1:81";
pub const DEFAULT_DATA_DIR: &str = ".athlete-monitor";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data_dir: PathBuf,
    /// Used when no endpoint has been persisted yet.
    pub endpoint: String,
    pub reconnect: ReconnectSettings,
    pub session: SessionSettings,
    pub chart: ChartSettings,
    pub storage: StorageSettings,
    pub thresholds: Thresholds,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            reconnect: ReconnectSettings::default(),
            session: SessionSettings::default(),
            chart: ChartSettings::default(),
            storage: StorageSettings::default(),
            thresholds: Thresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReconnectSettings {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl ReconnectSettings {
    pub fn policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub capacity: usize,
    /// Readings kept when a persist hits the storage quota.
    pub fallback_retain: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            fallback_retain: DEFAULT_FALLBACK_RETAIN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ChartSettings {
    pub capacity: usize,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CHART_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Byte budget across all persisted keys. Unlimited when unset.
    pub quota_bytes: Option<usize>,
}

impl Settings {
    /// Load settings from an optional file plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(
                Environment::with_prefix("ATHLETE_MONITOR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Invalid configuration")
    }
}
