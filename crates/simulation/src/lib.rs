//! Simulated equipment behaviour: one worker per machine flipping its status
//! at irregular intervals.

pub mod delay;
pub mod worker;

pub use delay::{DelaySampler, FixedDelay, UniformDelay};
pub use worker::{IterationOutcome, SimulationWorker, WorkerHooks};
