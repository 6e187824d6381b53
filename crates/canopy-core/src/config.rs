//! Engine configuration loading.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::TickContext;

/// Top-level engine configuration, usually loaded from `canopy.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fixed-step ticking used by `run_until_quiescent`
    pub tick: TickConfig,

    /// In-memory lifecycle tracing
    pub trace: TraceConfig,

    /// Default `EnvFilter` directive for hosts that install a subscriber
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    #[serde(default = "default_dt_seconds")]
    pub dt_seconds: f32,

    /// Upper bound before a run is reported as stalled
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    pub enabled: bool,
}

fn default_dt_seconds() -> f32 {
    1.0 / 60.0
}
fn default_max_ticks() -> u64 {
    10_000
}
fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            dt_seconds: default_dt_seconds(),
            max_ticks: default_max_ticks(),
        }
    }
}

impl TickConfig {
    pub fn context(&self, tick: u64) -> TickContext {
        TickContext::new(tick, self.dt_seconds)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick: TickConfig::default(),
            trace: TraceConfig::default(),
            log_filter: default_log_filter(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text).context("Invalid engine config")?;
        if !(config.tick.dt_seconds.is_finite() && config.tick.dt_seconds >= 0.0) {
            anyhow::bail!("tick.dt_seconds must be a non-negative number");
        }
        Ok(config)
    }

    /// Load `path` when it exists, otherwise the defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize engine config")
    }
}
