//! Lifecycle owner of the equipment monitor.
//!
//! `start` loads the roster into the registry, spawns one simulation worker
//! per machine and the periodic statistics reporter. `shutdown` cancels
//! everything, waits up to the configured grace period and aborts whatever
//! is still running, so no worker outlives the supervisor.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use dm_core::{EquipmentStatus, MonitorError, Result, RosterEntry, StatusRecord, TransitionTarget};
use dm_registry::StatusRegistry;
use dm_simulation::{SimulationWorker, UniformDelay, WorkerHooks};
use dm_views::{dashboard_listing, FleetStatistics, StatisticsAggregator, StatisticsSnapshot};

use crate::config::MonitorConfig;
use crate::metrics::{MetricsSnapshot, MonitorMetrics, UptimeTimer};
use crate::reporter::StatisticsReporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorState {
    Uninitialized,
    Running,
    ShuttingDown,
    Stopped,
}

impl SupervisorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Running => "running",
            Self::ShuttingDown => "shutting down",
            Self::Stopped => "stopped",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Workers that stopped on their own within the grace period.
    pub graceful: usize,
    /// Workers aborted after the grace period ran out.
    pub forced: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorReport {
    pub state: SupervisorState,
    pub statistics: StatisticsSnapshot,
    pub metrics: MetricsSnapshot,
    pub uptime_ms: u64,
}

impl MonitorReport {
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

pub struct MonitorSupervisor {
    config: MonitorConfig,
    registry: Arc<StatusRegistry>,
    aggregator: StatisticsAggregator,
    metrics: MonitorMetrics,
    state: SupervisorState,
    cancel: CancellationToken,
    workers: JoinSet<()>,
    reporter: Option<JoinHandle<()>>,
    timer: Option<UptimeTimer>,
}

impl MonitorSupervisor {
    pub fn new(config: MonitorConfig, registry: Arc<StatusRegistry>) -> Self {
        Self {
            config,
            aggregator: StatisticsAggregator::new(Arc::clone(&registry)),
            registry,
            metrics: MonitorMetrics::default(),
            state: SupervisorState::Uninitialized,
            cancel: CancellationToken::new(),
            workers: JoinSet::new(),
            reporter: None,
            timer: None,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn registry(&self) -> &Arc<StatusRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> &MonitorMetrics {
        &self.metrics
    }

    pub fn live_workers(&self) -> usize {
        self.workers.len()
    }

    /// Loads `roster` and spawns the workers. Fails with `InvalidState` when
    /// called outside a Tokio runtime.
    pub fn start(&mut self, roster: Vec<RosterEntry>) -> Result<usize> {
        if self.state != SupervisorState::Uninitialized {
            return Err(MonitorError::InvalidState {
                operation: "start",
                state: self.state.as_str(),
            });
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(MonitorError::InvalidState {
                operation: "start",
                state: "outside a tokio runtime",
            });
        }

        let loaded = self.registry.initialize(roster)?;
        let hooks: Arc<dyn WorkerHooks> = Arc::new(self.metrics.clone());

        for equipment_id in self.registry.equipment_ids() {
            let sampler =
                UniformDelay::new(self.config.min_flip_delay(), self.config.max_flip_delay());
            let worker = SimulationWorker::new(equipment_id, Arc::clone(&self.registry), sampler)
                .with_hooks(Arc::clone(&hooks));
            let cancel = self.cancel.child_token();
            self.spawn_worker(worker.run(cancel));
        }

        let reporter = StatisticsReporter::new(
            Arc::clone(&self.registry),
            self.metrics.clone(),
            self.config.stats_interval(),
        );
        self.reporter = Some(tokio::spawn(reporter.run(self.cancel.child_token())));

        self.timer = Some(UptimeTimer::start());
        self.state = SupervisorState::Running;
        info!(
            equipment = loaded,
            min_delay_ms = self.config.min_flip_delay_ms,
            max_delay_ms = self.config.max_flip_delay_ms,
            "equipment monitor started"
        );
        Ok(loaded)
    }

    /// Every task in `workers` goes through here, so the started and
    /// stopped counters describe the same set.
    fn spawn_worker<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.workers.spawn(task);
        self.metrics.inc_workers_started(1);
    }

    /// Administrative override: forces `equipment_id` into `status` through
    /// the same transition path the simulation uses.
    pub fn set_status(&self, equipment_id: &str, status: EquipmentStatus) -> Result<StatusRecord> {
        self.apply(equipment_id, TransitionTarget::Set(status))
    }

    /// Manual one-off flip.
    pub fn toggle(&self, equipment_id: &str) -> Result<StatusRecord> {
        self.apply(equipment_id, TransitionTarget::Toggle)
    }

    fn apply(&self, equipment_id: &str, target: TransitionTarget) -> Result<StatusRecord> {
        match self.registry.transition(equipment_id, target) {
            Ok(record) => {
                self.metrics.inc_manual_overrides(1);
                info!(
                    equipment_id,
                    status = %record.current_status,
                    changes = record.status_changes_count,
                    "manual status change"
                );
                Ok(record)
            }
            Err(err) => {
                if matches!(err, MonitorError::NotFound(_)) {
                    self.metrics.inc_unknown_equipment(1);
                }
                warn!(equipment_id, error = %err, "manual status change rejected");
                Err(err)
            }
        }
    }

    pub fn get_status(&self, equipment_id: &str) -> Result<StatusRecord> {
        self.registry.get_status(equipment_id)
    }

    /// Records sorted by equipment id.
    pub fn list_all(&self) -> Vec<StatusRecord> {
        dashboard_listing(&self.registry)
    }

    pub fn statistics(&self) -> FleetStatistics {
        self.aggregator.collect()
    }

    pub fn report(&self) -> MonitorReport {
        MonitorReport {
            state: self.state,
            statistics: self.aggregator.snapshot(),
            metrics: self.metrics.snapshot(),
            uptime_ms: self
                .timer
                .as_ref()
                .map_or(0, |t| t.elapsed().as_millis() as u64),
        }
    }

    /// Stops every worker. Calling it again, or before `start`, is a no-op.
    pub async fn shutdown(&mut self) -> ShutdownReport {
        if self.state != SupervisorState::Running {
            self.state = SupervisorState::Stopped;
            return ShutdownReport::default();
        }

        self.state = SupervisorState::ShuttingDown;
        info!(workers = self.workers.len(), "stopping equipment monitor");
        self.cancel.cancel();

        let grace = self.config.shutdown_grace();
        let graceful = self.drain_within(grace).await;
        let forced = self.workers.len();
        if forced > 0 {
            warn!(forced, "workers ignored cancellation, aborting");
            self.workers.abort_all();
            while self.workers.join_next().await.is_some() {}
        }
        self.metrics.inc_workers_stopped((graceful + forced) as u64);

        if let Some(reporter) = self.reporter.take() {
            reporter.abort();
            let _ = reporter.await;
        }

        self.state = SupervisorState::Stopped;
        let report = ShutdownReport { graceful, forced };
        info!(graceful, forced, "equipment monitor stopped");
        report
    }

    async fn drain_within(&mut self, grace: Duration) -> usize {
        let workers = &mut self.workers;
        let mut stopped = 0usize;
        let drain = async {
            while let Some(joined) = workers.join_next().await {
                if let Err(err) = joined {
                    if err.is_panic() {
                        warn!(error = %err, "simulation worker panicked");
                    }
                }
                stopped += 1;
            }
        };
        if tokio::time::timeout(grace, drain).await.is_err() {
            warn!(grace_ms = grace.as_millis() as u64, "shutdown grace period elapsed");
        }
        stopped
    }
}

impl Drop for MonitorSupervisor {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(reporter) = self.reporter.take() {
            reporter.abort();
        }
        // Dropping the JoinSet aborts any worker still registered.
    }
}
