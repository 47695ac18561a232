//! Periodic fleet statistics log.
//!
//! Every `interval` the reporter aggregates the registry and emits one
//! structured `info` event plus a JSON line at `debug`, until cancelled.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use dm_registry::StatusRegistry;
use dm_views::{StatisticsAggregator, StatisticsSnapshot};

use crate::metrics::{MetricsSnapshot, MonitorMetrics};

/// What the periodic task logs.
#[derive(Debug, Clone, Serialize)]
pub struct StatisticsLogEntry {
    #[serde(flatten)]
    pub statistics: StatisticsSnapshot,
    pub metrics: MetricsSnapshot,
}

pub struct StatisticsReporter {
    aggregator: StatisticsAggregator,
    metrics: MonitorMetrics,
    interval: Duration,
    started: Instant,
}

impl StatisticsReporter {
    pub fn new(registry: Arc<StatusRegistry>, metrics: MonitorMetrics, interval: Duration) -> Self {
        Self {
            aggregator: StatisticsAggregator::new(registry),
            metrics,
            interval,
            started: Instant::now(),
        }
    }

    pub fn entry(&self) -> StatisticsLogEntry {
        StatisticsLogEntry {
            statistics: self.aggregator.snapshot(),
            metrics: self.metrics.snapshot(),
        }
    }

    pub fn emit(&self) -> StatisticsLogEntry {
        let entry = self.entry();
        let stats = &entry.statistics.statistics;
        info!(
            at = %entry.statistics.generated_at,
            total_equipment = stats.total_equipment,
            working = stats.working_count,
            downtime = stats.downtime_count,
            uptime_minutes = stats.total_uptime_minutes,
            downtime_minutes = stats.total_downtime_minutes,
            status_changes = stats.total_status_changes,
            simulated = entry.metrics.simulated_transitions,
            overrides = entry.metrics.manual_overrides,
            faults = entry.metrics.worker_faults,
            "monitor statistics"
        );
        debug!(
            line = %serde_json::to_string(&entry).unwrap_or_default(),
            running_ms = self.started.elapsed().as_millis() as u64,
            "monitor statistics json"
        );
        entry
    }

    pub async fn run(self, shutdown: CancellationToken) {
        info!(interval_ms = self.interval.as_millis() as u64, "statistics reporter starting");

        let mut interval = tokio::time::interval(self.interval);
        // Skip the first immediate tick
        interval.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("statistics reporter shutting down");
                    break;
                }

                _ = interval.tick() => {
                    self.emit();
                }
            }
        }
    }
}
