//! Rolling-window service duration estimator
//!
//! Observed service durations are kept in a bounded FIFO window. The
//! wait-per-person figure is the plain mean of the window; recency comes only
//! from older samples falling out of it.

use crate::types::{DEFAULT_AVG_MINUTES, DEFAULT_SAMPLE_CAPACITY, MIN_AVG_MINUTES};
use std::collections::VecDeque;

const MILLIS_PER_MINUTE: f64 = 60_000.0;

/// Bounded window of service durations (milliseconds) and the derived average
#[derive(Debug, Clone, PartialEq)]
pub struct DurationEstimator {
    samples: VecDeque<f64>,
    capacity: usize,
    avg_service_minutes: f64,
}

impl DurationEstimator {
    /// Create an empty estimator. A zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            avg_service_minutes: DEFAULT_AVG_MINUTES,
        }
    }

    /// Rebuild an estimator from persisted samples, keeping the newest ones
    pub fn from_samples(samples: impl IntoIterator<Item = f64>, capacity: usize) -> Self {
        let mut estimator = Self::new(capacity);
        estimator.samples = samples
            .into_iter()
            .filter(|sample| sample.is_finite() && *sample > 0.0)
            .collect();
        estimator.evict_overflow();
        estimator.recompute();
        estimator
    }

    /// Record one observed service duration in milliseconds.
    ///
    /// Non-finite and non-positive durations are ignored.
    pub fn record(&mut self, duration_ms: f64) {
        if !duration_ms.is_finite() || duration_ms <= 0.0 {
            return;
        }
        self.samples.push_back(duration_ms);
        self.evict_overflow();
        self.recompute();
    }

    /// Drop all samples and restore the default average
    pub fn reset(&mut self) {
        self.samples.clear();
        self.avg_service_minutes = DEFAULT_AVG_MINUTES;
    }

    pub fn avg_service_minutes(&self) -> f64 {
        self.avg_service_minutes
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples from oldest to newest
    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    fn evict_overflow(&mut self) {
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    fn recompute(&mut self) {
        if self.samples.is_empty() {
            self.avg_service_minutes = DEFAULT_AVG_MINUTES;
            return;
        }
        let mean_ms = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
        self.avg_service_minutes = average_minutes(mean_ms);
    }
}

impl Default for DurationEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_CAPACITY)
    }
}

/// Convert a mean duration in milliseconds to the published per-person figure
pub fn average_minutes(mean_ms: f64) -> f64 {
    if !mean_ms.is_finite() {
        return DEFAULT_AVG_MINUTES;
    }
    let rounded = round1(mean_ms / MILLIS_PER_MINUTE);
    if rounded.is_finite() {
        rounded.max(MIN_AVG_MINUTES)
    } else {
        DEFAULT_AVG_MINUTES
    }
}

/// Round to one decimal place, half away from zero
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
