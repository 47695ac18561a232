//! Read-only views over the status registry (fleet statistics, dashboard listing).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use dm_core::{EquipmentStatus, Minutes, StatusRecord};
use dm_registry::StatusRegistry;

/// Fleet-wide counters. Minute totals only include completed intervals; time
/// in each machine's current status is not part of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FleetStatistics {
    pub total_equipment: usize,
    pub working_count: usize,
    pub downtime_count: usize,
    pub total_uptime_minutes: Minutes,
    pub total_downtime_minutes: Minutes,
    pub total_status_changes: u64,
}

impl FleetStatistics {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a StatusRecord>,
    {
        records
            .into_iter()
            .fold(Self::default(), |mut stats, record| {
                stats.total_equipment += 1;
                match record.current_status {
                    EquipmentStatus::Working => stats.working_count += 1,
                    EquipmentStatus::Downtime => stats.downtime_count += 1,
                }
                stats.total_uptime_minutes += record.uptime_minutes;
                stats.total_downtime_minutes += record.downtime_minutes;
                stats.total_status_changes += record.status_changes_count;
                stats
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatisticsSnapshot {
    #[serde(flatten)]
    pub statistics: FleetStatistics,
    pub generated_at: DateTime<Utc>,
}

pub struct StatisticsAggregator {
    registry: Arc<StatusRegistry>,
}

impl StatisticsAggregator {
    pub fn new(registry: Arc<StatusRegistry>) -> Self {
        Self { registry }
    }

    pub fn collect(&self) -> FleetStatistics {
        FleetStatistics::from_records(&self.registry.list_all())
    }

    /// Same as [`collect`](Self::collect), stamped with the registry clock.
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            statistics: self.collect(),
            generated_at: self.registry.clock().now(),
        }
    }
}

/// All records ordered by equipment id, as the dashboard shows them.
pub fn dashboard_listing(registry: &StatusRegistry) -> Vec<StatusRecord> {
    let mut records = registry.list_all();
    records.sort_by(|a, b| a.equipment_id.cmp(&b.equipment_id));
    records
}
