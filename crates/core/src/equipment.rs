use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EquipmentId, Minutes};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EquipmentStatus {
    Working,
    Downtime,
}

impl EquipmentStatus {
    pub fn toggled(self) -> Self {
        match self {
            Self::Working => Self::Downtime,
            Self::Downtime => Self::Working,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Working => "Working",
            Self::Downtime => "Downtime",
        }
    }

    /// Dashboard badge class for the status.
    pub fn color(self) -> &'static str {
        match self {
            Self::Working => "success",
            Self::Downtime => "danger",
        }
    }
}

impl fmt::Display for EquipmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl std::str::FromStr for EquipmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "working" => Ok(Self::Working),
            "downtime" => Ok(Self::Downtime),
            other => Err(format!("unknown equipment status: {other}")),
        }
    }
}

/// Requested outcome of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionTarget {
    Toggle,
    Set(EquipmentStatus),
}

impl TransitionTarget {
    pub fn resolve(self, current: EquipmentStatus) -> EquipmentStatus {
        match self {
            Self::Toggle => current.toggled(),
            Self::Set(status) => status,
        }
    }
}

impl From<EquipmentStatus> for TransitionTarget {
    fn from(status: EquipmentStatus) -> Self {
        Self::Set(status)
    }
}

/// State of one piece of equipment. Values handed out by the registry are
/// copies; mutating one has no effect on the registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusRecord {
    pub equipment_id: EquipmentId,
    pub equipment_name: String,
    pub current_status: EquipmentStatus,
    pub status_changed_at: DateTime<Utc>,
    pub uptime_minutes: Minutes,
    pub downtime_minutes: Minutes,
    pub status_changes_count: u64,
}

impl StatusRecord {
    pub fn new(
        equipment_id: impl Into<EquipmentId>,
        equipment_name: impl Into<String>,
        status: EquipmentStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            equipment_id: equipment_id.into(),
            equipment_name: equipment_name.into(),
            current_status: status,
            status_changed_at: now,
            uptime_minutes: 0,
            downtime_minutes: 0,
            status_changes_count: 0,
        }
    }

    /// Whole minutes spent in the current status as of `now`.
    pub fn minutes_in_current_status(&self, now: DateTime<Utc>) -> Minutes {
        whole_minutes_between(self.status_changed_at, now)
    }
}

/// Truncates to whole minutes; a clock that went backwards yields zero.
pub fn whole_minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> Minutes {
    (to - from).num_minutes().max(0) as Minutes
}
