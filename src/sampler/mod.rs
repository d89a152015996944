//! Sampling fallback for locations that cannot be intercepted.

mod equality;
mod poller;

pub use equality::{deep_equal, EqualityPolicy};
pub use poller::{Accessor, Sampler};

use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_SAMPLES_PER_SECOND: f64 = 60.0;

/// Configuration for the sampler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Sample every leaf, even ones that could be intercepted.
    pub force: bool,
    pub samples_per_second: f64,
    /// Run a timer thread while samples are registered. When false, call
    /// `tick` yourself.
    pub background: bool,
    pub equality: EqualityPolicy,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            force: false,
            samples_per_second: DEFAULT_SAMPLES_PER_SECOND,
            background: true,
            equality: EqualityPolicy::default(),
        }
    }
}

impl PollingConfig {
    /// Interval between ticks. Rates that give no representable, non-zero
    /// interval fall back to the default of 60 per second.
    pub fn period(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.samples_per_second)
            .ok()
            .filter(|period| !period.is_zero())
            .unwrap_or_else(|| Duration::from_secs_f64(1.0 / DEFAULT_SAMPLES_PER_SECOND))
    }
}
