//! Rate sampler / TTL reaper timing.
//!
//! The sampler does not own a thread or a timer. The host calls `tick` from
//! the same context that mutates the store (the broker's graph loop), and the
//! sampler decides whether a full interval has passed since the previous
//! sampling tick.

use std::time::{Duration, Instant};

use tracing::trace;

use super::store::{SampleReport, TopologyStore};

#[derive(Debug)]
pub struct Sampler {
    interval: Duration,
    last: Instant,
}

impl Sampler {
    /// A zero `interval` disables periodic work entirely.
    pub fn new(interval: Duration, start: Instant) -> Self {
        Self {
            interval,
            last: start,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }

    /// Samples the store if at least one interval elapsed since the last
    /// sampling tick. Rates are computed over the actual elapsed time.
    pub fn tick(&mut self, now: Instant, store: &mut TopologyStore) -> Option<SampleReport> {
        if !self.is_enabled() {
            return None;
        }
        let elapsed = now.saturating_duration_since(self.last);
        if elapsed < self.interval {
            trace!("Skipping sample, {:?} of {:?} elapsed", elapsed, self.interval);
            return None;
        }
        self.last = now;
        Some(store.sample(elapsed.as_secs_f64()))
    }
}

#[cfg(test)]
mod tests {
    use super::Sampler;
    use crate::graph::store::TopologyStore;
    use std::time::{Duration, Instant};

    #[test]
    fn zero_interval_never_samples() {
        let start = Instant::now();
        let mut sampler = Sampler::new(Duration::ZERO, start);
        let mut store = TopologyStore::new(1);

        assert!(!sampler.is_enabled());
        assert!(sampler.tick(start + Duration::from_secs(60), &mut store).is_none());
    }

    #[test]
    fn samples_only_after_a_full_interval() {
        let start = Instant::now();
        let mut sampler = Sampler::new(Duration::from_secs(10), start);
        let mut store = TopologyStore::new(1);

        assert!(sampler.tick(start + Duration::from_secs(5), &mut store).is_none());
        assert!(sampler.tick(start + Duration::from_secs(10), &mut store).is_some());
        assert!(sampler.tick(start + Duration::from_secs(15), &mut store).is_none());
        assert!(sampler.tick(start + Duration::from_secs(21), &mut store).is_some());
    }
}
