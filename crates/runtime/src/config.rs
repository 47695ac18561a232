use std::path::Path;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub min_flip_delay_ms: u64,
    pub max_flip_delay_ms: u64,
    pub stats_interval_ms: u64,
    pub shutdown_grace_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            min_flip_delay_ms: 5_000,
            max_flip_delay_ms: 15_000,
            stats_interval_ms: 30_000,
            shutdown_grace_ms: 5_000,
        }
    }
}

impl MonitorConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading monitor config {}", path.display()))?;
        let cfg: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parsing monitor config {}", path.display()))?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.max_flip_delay_ms > 0, "max_flip_delay_ms must be positive");
        ensure!(
            self.min_flip_delay_ms <= self.max_flip_delay_ms,
            "min_flip_delay_ms ({}) exceeds max_flip_delay_ms ({})",
            self.min_flip_delay_ms,
            self.max_flip_delay_ms
        );
        ensure!(self.stats_interval_ms > 0, "stats_interval_ms must be positive");
        Ok(())
    }

    pub fn min_flip_delay(&self) -> Duration {
        Duration::from_millis(self.min_flip_delay_ms)
    }

    pub fn max_flip_delay(&self) -> Duration {
        Duration::from_millis(self.max_flip_delay_ms)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_millis(self.stats_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}
