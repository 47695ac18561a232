//! Core types and traits for the equipment downtime monitor.

pub type EquipmentId = String;
pub type Minutes = u64;

#[derive(thiserror::Error, Debug)]
pub enum MonitorError {
    #[error("unknown equipment: {0}")]
    NotFound(EquipmentId),
    #[error("registry already initialized")]
    AlreadyInitialized,
    #[error("duplicate equipment id in roster: {0}")]
    DuplicateEquipment(EquipmentId),
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MonitorError>;

pub mod clock;
pub mod equipment;
pub mod roster;

pub use clock::{Clock, ManualClock, SystemClock};
pub use equipment::{EquipmentStatus, StatusRecord, TransitionTarget};
pub use roster::{default_roster, load_roster, RosterEntry};
