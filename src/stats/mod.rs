//! Statistics used by the speed test engine
//!
//! Everything here is pure: jitter, packet loss and throughput reductions
//! take plain numbers and never fail. Invalid inputs (zero durations,
//! non-finite values) reduce to 0 so speeds stay non-negative and never NaN.

pub mod aim;
pub mod rolling;


pub use rolling::RollingLatencyStats;

use std::time::Duration;

/// Arithmetic mean, 0 for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation, 0 when fewer than two values
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    let avg = mean(values);
    let variance = values.iter().map(|&x| (x - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Packet loss percentage: `100 * (attempts - successes) / attempts`
pub fn packet_loss_percent(attempts: u32, successes: u32) -> f64 {
    if attempts == 0 {
        return 0.0;
    }
    let lost = attempts.saturating_sub(successes);
    100.0 * f64::from(lost) / f64::from(attempts)
}

/// Throughput of a transfer in bytes per second
pub fn throughput_bps(bytes: u64, elapsed: Duration) -> f64 {
    let seconds = elapsed.as_secs_f64();
    if seconds <= 0.0 {
        return 0.0;
    }
    sanitize_speed(bytes as f64 / seconds)
}

/// Clamp a speed to a finite, non-negative value
pub fn sanitize_speed(speed: f64) -> f64 {
    if speed.is_finite() && speed > 0.0 {
        speed
    } else {
        0.0
    }
}

/// Mean of the successful (> 0) speeds, `None` when there are none
pub fn mean_of_successful(speeds: &[f64]) -> Option<f64> {
    let successful: Vec<f64> = speeds.iter().copied().filter(|&s| s > 0.0 && s.is_finite()).collect();
    if successful.is_empty() {
        None
    } else {
        Some(mean(&successful))
    }
}

/// Maximum of the per-size means, 0 when there are none
pub fn max_of_means(means: &[f64]) -> f64 {
    means.iter().copied().map(sanitize_speed).fold(0.0, f64::max)
}

/// Convert bytes/s to megabits/s
pub fn bytes_to_megabits(bytes_per_sec: f64) -> f64 {
    bytes_per_sec * 8.0 / 1_000_000.0
}

/// Convert bytes/s to megabytes/s
pub fn bytes_to_megabytes(bytes_per_sec: f64) -> f64 {
    bytes_per_sec / 1_000_000.0
}

/// Milliseconds as f64 from a Duration
pub fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}
