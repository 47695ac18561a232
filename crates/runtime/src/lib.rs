//! Monitor runtime: tracing bootstrap, configuration, metrics and the
//! supervisor that owns the simulation workers.

use tracing::Level;

pub mod config;
pub mod metrics;
pub mod reporter;
pub mod supervisor;

pub use config::MonitorConfig;
pub use metrics::{MetricsSnapshot, MonitorMetrics};
pub use supervisor::{MonitorReport, MonitorSupervisor, ShutdownReport, SupervisorState};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_max_level(Level::INFO)
        .try_init();
}
