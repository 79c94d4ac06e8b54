//! Throughput arithmetic.
//!
//! [`RateTracker`] turns a sequence of step timestamps into samples/sec
//! figures. Each recorded step contributes `batch_size * world_size` samples,
//! since every participant consumes one batch per step.

use std::time::Instant;

#[derive(Debug, Clone)]
pub struct RateTracker {
    samples_per_step: f64,
    last: Option<Instant>,
    rates: Vec<f64>,
}

impl RateTracker {
    pub fn new(batch_size: usize, world_size: usize) -> Self {
        Self {
            samples_per_step: (batch_size * world_size) as f64,
            last: None,
            rates: Vec::new(),
        }
    }

    /// Set the reference timestamp for the first step.
    pub fn start(&mut self, at: Instant) {
        self.last = Some(at);
    }

    /// Close the step that ends at `at` and return its rate.
    ///
    /// Returns `None` if [`start`](Self::start) was never called, or if no
    /// time passed since the last step. Such a step has no finite rate and
    /// is left out of the list.
    pub fn record(&mut self, at: Instant) -> Option<f64> {
        let last = self.last.replace(at)?;
        let elapsed = at.saturating_duration_since(last).as_secs_f64();
        if elapsed <= 0.0 {
            return None;
        }
        let rate = self.samples_per_step / elapsed;
        self.rates.push(rate);
        Some(rate)
    }

    pub fn rates(&self) -> &[f64] {
        &self.rates
    }

    /// Mean of the recorded rates, `None` before any step completed.
    pub fn average(&self) -> Option<f64> {
        if self.rates.is_empty() {
            return None;
        }
        Some(self.rates.iter().sum::<f64>() / self.rates.len() as f64)
    }
}

/// Mean and population standard deviation, `None` for an empty slice.
pub fn mean_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}
