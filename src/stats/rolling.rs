//! Running latency statistics for live updates
//!
//! Keeps sums instead of the sample list so every probe can publish a fresh
//! mean, jitter and loss figure in constant time.

/// Rolling statistics over the probes of one latency stage
#[derive(Debug, Clone, Default)]
pub struct RollingLatencyStats {
    /// Probes attempted so far
    pub attempts: u32,

    /// Probes that returned a 2xx response
    pub successes: u32,

    sum: f64,
    sum_squared: f64,
}

impl RollingLatencyStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful probe
    pub fn add_sample(&mut self, rtt_ms: f64) {
        self.attempts += 1;
        self.successes += 1;
        self.sum += rtt_ms;
        self.sum_squared += rtt_ms * rtt_ms;
    }

    /// Record a lost probe
    pub fn add_loss(&mut self) {
        self.attempts += 1;
    }

    /// Mean of the successful probes
    pub fn average(&self) -> f64 {
        if self.successes == 0 {
            0.0
        } else {
            self.sum / f64::from(self.successes)
        }
    }

    /// Population variance of the successful probes
    pub fn variance(&self) -> f64 {
        if self.successes < 2 {
            return 0.0;
        }

        let avg = self.average();
        let n = f64::from(self.successes);
        // Rounding can push this slightly below zero for identical samples
        ((self.sum_squared / n) - (avg * avg)).max(0.0)
    }

    pub fn jitter(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn loss_percent(&self) -> f64 {
        super::packet_loss_percent(self.attempts, self.successes)
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
