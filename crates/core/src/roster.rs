use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{EquipmentId, EquipmentStatus, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RosterEntry {
    pub equipment_id: EquipmentId,
    pub equipment_name: String,
    pub initial_status: EquipmentStatus,
}

impl RosterEntry {
    pub fn new(
        equipment_id: impl Into<EquipmentId>,
        equipment_name: impl Into<String>,
        initial_status: EquipmentStatus,
    ) -> Self {
        Self {
            equipment_id: equipment_id.into(),
            equipment_name: equipment_name.into(),
            initial_status,
        }
    }
}

/// The shop-floor fleet used when no roster file is supplied.
pub fn default_roster() -> Vec<RosterEntry> {
    use EquipmentStatus::{Downtime, Working};
    vec![
        RosterEntry::new("EQ001", "CNC lathe", Working),
        RosterEntry::new("EQ002", "Milling machine", Working),
        RosterEntry::new("EQ003", "Welding unit", Downtime),
        RosterEntry::new("EQ004", "Press mould", Working),
        RosterEntry::new("EQ005", "Conveyor line", Downtime),
    ]
}

/// Reads a roster from a JSON array of entries.
pub fn load_roster(path: impl AsRef<Path>) -> Result<Vec<RosterEntry>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
