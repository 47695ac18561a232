use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use dm_core::StatusRecord;
use dm_simulation::WorkerHooks;

#[derive(Clone, Default)]
pub struct MonitorMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    simulated_transitions: AtomicU64,
    manual_overrides: AtomicU64,
    unknown_equipment: AtomicU64,
    worker_faults: AtomicU64,
    workers_started: AtomicU64,
    workers_stopped: AtomicU64,
}

impl MonitorMetrics {
    pub fn inc_simulated_transitions(&self, delta: u64) {
        self.inner.simulated_transitions.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_manual_overrides(&self, delta: u64) {
        self.inner.manual_overrides.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_unknown_equipment(&self, delta: u64) {
        self.inner.unknown_equipment.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_worker_faults(&self, delta: u64) {
        self.inner.worker_faults.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_workers_started(&self, delta: u64) {
        self.inner.workers_started.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn inc_workers_stopped(&self, delta: u64) {
        self.inner.workers_stopped.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            simulated_transitions: self.inner.simulated_transitions.load(Ordering::Relaxed),
            manual_overrides: self.inner.manual_overrides.load(Ordering::Relaxed),
            unknown_equipment: self.inner.unknown_equipment.load(Ordering::Relaxed),
            worker_faults: self.inner.worker_faults.load(Ordering::Relaxed),
            workers_started: self.inner.workers_started.load(Ordering::Relaxed),
            workers_stopped: self.inner.workers_stopped.load(Ordering::Relaxed),
        }
    }
}

impl WorkerHooks for MonitorMetrics {
    fn on_transition(&self, _record: &StatusRecord) {
        self.inc_simulated_transitions(1);
    }

    fn on_fault(&self, _equipment_id: &str) {
        self.inc_worker_faults(1);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub simulated_transitions: u64,
    pub manual_overrides: u64,
    pub unknown_equipment: u64,
    pub worker_faults: u64,
    pub workers_started: u64,
    pub workers_stopped: u64,
}

impl MetricsSnapshot {
    pub fn live_workers(&self) -> u64 {
        self.workers_started.saturating_sub(self.workers_stopped)
    }

    pub fn to_json_line(&self, label: &str, elapsed: Option<Duration>) -> String {
        #[derive(Serialize)]
        struct Snapshot<'a> {
            label: &'a str,
            #[serde(flatten)]
            counters: &'a MetricsSnapshot,
            elapsed_ms: Option<u128>,
        }

        let payload = Snapshot {
            label,
            counters: self,
            elapsed_ms: elapsed.map(|d| d.as_millis()),
        };
        serde_json::to_string(&payload).unwrap_or_else(|_| String::from("{}"))
    }
}

pub struct UptimeTimer {
    start: Instant,
}

impl UptimeTimer {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
