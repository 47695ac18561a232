use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Produces the pause before a worker's next status flip.
pub trait DelaySampler: Send {
    fn next_delay(&mut self) -> Duration;
}

/// Uniform over `[min, max]`, inclusive.
#[derive(Debug)]
pub struct UniformDelay {
    min: Duration,
    max: Duration,
    rng: StdRng,
}

impl UniformDelay {
    pub fn new(min: Duration, max: Duration) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min,
            max,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(min: Duration, max: Duration, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ..Self::new(min, max)
        }
    }
}

impl DelaySampler for UniformDelay {
    fn next_delay(&mut self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(self.rng.gen_range(min..=max))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl DelaySampler for FixedDelay {
    fn next_delay(&mut self) -> Duration {
        self.0
    }
}
