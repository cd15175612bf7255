//! Simulated I/O latency for the demo collaborators.

use std::time::Duration;

use rand::Rng;

/// A random delay drawn uniformly from `[min, max]` milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedLatency {
    min_ms: u64,
    max_ms: u64,
}

impl SimulatedLatency {
    /// Bounds are swapped if given in the wrong order.
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min_ms: min_ms.min(max_ms),
            max_ms: min_ms.max(max_ms),
        }
    }

    /// No delay at all. Used by tests.
    pub fn none() -> Self {
        Self::new(0, 0)
    }

    pub fn sample(&self) -> Duration {
        if self.max_ms == 0 {
            return Duration::ZERO;
        }
        let ms = rand::rng().random_range(self.min_ms..=self.max_ms);
        Duration::from_millis(ms)
    }

    pub async fn wait(&self) {
        let delay = self.sample();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_zero() {
        assert_eq!(SimulatedLatency::none().sample(), Duration::ZERO);
    }

    #[test]
    fn samples_stay_in_bounds() {
        let latency = SimulatedLatency::new(5, 10);
        for _ in 0..100 {
            let d = latency.sample();
            assert!(d >= Duration::from_millis(5) && d <= Duration::from_millis(10));
        }
    }

    #[test]
    fn reversed_bounds_are_normalized() {
        assert_eq!(SimulatedLatency::new(10, 5), SimulatedLatency::new(5, 10));
    }
}
