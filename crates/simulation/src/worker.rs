use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use dm_core::{StatusRecord, TransitionTarget};
use dm_registry::StatusRegistry;

use crate::DelaySampler;

/// Observer for worker activity (metrics, test recorders).
pub trait WorkerHooks: Send + Sync {
    fn on_transition(&self, _record: &StatusRecord) {}
    fn on_fault(&self, _equipment_id: &str) {}
}

impl WorkerHooks for () {}

#[derive(Debug)]
pub enum IterationOutcome {
    Transitioned(StatusRecord),
    Failed,
}

/// Toggles one machine's status after every sampled delay until cancelled.
pub struct SimulationWorker<S> {
    equipment_id: String,
    registry: Arc<StatusRegistry>,
    sampler: S,
    hooks: Arc<dyn WorkerHooks>,
}

impl<S: DelaySampler> SimulationWorker<S> {
    pub fn new(equipment_id: impl Into<String>, registry: Arc<StatusRegistry>, sampler: S) -> Self {
        Self {
            equipment_id: equipment_id.into(),
            registry,
            sampler,
            hooks: Arc::new(()),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn WorkerHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn equipment_id(&self) -> &str {
        &self.equipment_id
    }

    /// Runs until `cancel` fires. Cancellation is checked before and after
    /// each sleep and also interrupts the sleep itself.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(equipment_id = %self.equipment_id, "simulation worker started");

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let delay = self.sampler.next_delay();
            tokio::select! {
                biased;

                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            if cancel.is_cancelled() {
                break;
            }
            self.step();
        }

        info!(equipment_id = %self.equipment_id, "simulation worker stopped");
    }

    /// One flip. Failures, panics included, are logged and reported to the
    /// hooks; they never end the worker.
    pub fn step(&self) -> IterationOutcome {
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            self.registry
                .transition(&self.equipment_id, TransitionTarget::Toggle)
        }));

        match attempt {
            Ok(Ok(record)) => {
                self.hooks.on_transition(&record);
                IterationOutcome::Transitioned(record)
            }
            Ok(Err(err)) => {
                warn!(equipment_id = %self.equipment_id, error = %err, "simulated transition failed");
                self.hooks.on_fault(&self.equipment_id);
                IterationOutcome::Failed
            }
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(equipment_id = %self.equipment_id, %reason, "simulation iteration panicked");
                self.hooks.on_fault(&self.equipment_id);
                IterationOutcome::Failed
            }
        }
    }
}
