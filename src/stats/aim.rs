//! AIM (Aggregated Internet Measurement) scoring
//!
//! Rates a completed result for three use cases: streaming, gaming and
//! real-time communication. Each use case is a cascade of thresholds checked
//! from best to worst; the first level whose conditions all hold wins.

use crate::models::TestResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Qualitative rating for one use case.
///
/// Variants are ordered from worst to best so `Ord` compares by quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AimLevel {
    VeryPoor,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl AimLevel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
            Self::VeryPoor => "Very Poor",
        }
    }

    pub fn is_at_least(&self, other: AimLevel) -> bool {
        *self >= other
    }
}

impl fmt::Display for AimLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Scores for the three use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AimScores {
    pub streaming: AimLevel,
    pub gaming: AimLevel,
    pub rtc: AimLevel,
}

impl AimScores {
    pub fn new(streaming: AimLevel, gaming: AimLevel, rtc: AimLevel) -> Self {
        Self { streaming, gaming, rtc }
    }

    /// Worst of the three scores
    pub fn overall(&self) -> AimLevel {
        self.streaming.min(self.gaming).min(self.rtc)
    }
}

/// Score a result using its unloaded latency and jitter
pub fn calculate_aim_scores(result: &TestResult) -> AimScores {
    score_metrics(
        super::bytes_to_megabits(result.download_speed_bps),
        super::bytes_to_megabits(result.upload_speed_bps),
        result.latency_ms,
        result.jitter_ms,
    )
}

/// Score raw metrics: throughput in Mbps, latency and jitter in ms
pub fn score_metrics(download_mbps: f64, upload_mbps: f64, latency_ms: f64, jitter_ms: f64) -> AimScores {
    AimScores {
        streaming: streaming_score(download_mbps, latency_ms),
        gaming: gaming_score(latency_ms, jitter_ms, download_mbps),
        rtc: rtc_score(upload_mbps, latency_ms, jitter_ms, download_mbps),
    }
}

pub fn streaming_score(download_mbps: f64, latency_ms: f64) -> AimLevel {
    if download_mbps >= 25.0 && latency_ms <= 50.0 {
        AimLevel::Excellent
    } else if download_mbps >= 15.0 && latency_ms <= 100.0 {
        AimLevel::Good
    } else if download_mbps >= 5.0 && latency_ms <= 150.0 {
        AimLevel::Fair
    } else if download_mbps >= 2.0 {
        AimLevel::Poor
    } else {
        AimLevel::VeryPoor
    }
}

pub fn gaming_score(latency_ms: f64, jitter_ms: f64, download_mbps: f64) -> AimLevel {
    if latency_ms <= 20.0 && jitter_ms <= 5.0 && download_mbps >= 3.0 {
        AimLevel::Excellent
    } else if latency_ms <= 50.0 && jitter_ms <= 10.0 && download_mbps >= 1.0 {
        AimLevel::Good
    } else if latency_ms <= 100.0 && jitter_ms <= 20.0 && download_mbps >= 0.5 {
        AimLevel::Fair
    } else if latency_ms <= 150.0 {
        AimLevel::Poor
    } else {
        AimLevel::VeryPoor
    }
}

pub fn rtc_score(upload_mbps: f64, latency_ms: f64, jitter_ms: f64, download_mbps: f64) -> AimLevel {
    if upload_mbps >= 2.0 && latency_ms <= 50.0 && jitter_ms <= 10.0 && download_mbps >= 1.0 {
        AimLevel::Excellent
    } else if upload_mbps >= 1.0 && latency_ms <= 100.0 && jitter_ms <= 20.0 && download_mbps >= 0.5 {
        AimLevel::Good
    } else if upload_mbps >= 0.5 && latency_ms <= 150.0 && jitter_ms <= 30.0 {
        AimLevel::Fair
    } else if upload_mbps >= 0.1 {
        AimLevel::Poor
    } else {
        AimLevel::VeryPoor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::metrics::fixtures;

    #[test]
    fn test_streaming_cascade_is_order_sensitive() {
        assert_eq!(streaming_score(30.0, 40.0), AimLevel::Excellent);
        assert_eq!(streaming_score(30.0, 120.0), AimLevel::Fair);
        assert_eq!(streaming_score(30.0, 200.0), AimLevel::Poor);
        assert_eq!(streaming_score(1.0, 10.0), AimLevel::VeryPoor);
    }

    #[test]
    fn test_streaming_boundaries_are_inclusive() {
        assert_eq!(streaming_score(25.0, 50.0), AimLevel::Excellent);
        assert_eq!(streaming_score(15.0, 100.0), AimLevel::Good);
        assert_eq!(streaming_score(5.0, 150.0), AimLevel::Fair);
        assert_eq!(streaming_score(2.0, 1000.0), AimLevel::Poor);
    }

    #[test]
    fn test_gaming_levels() {
        assert_eq!(gaming_score(15.0, 3.0, 10.0), AimLevel::Excellent);
        assert_eq!(gaming_score(15.0, 3.0, 2.0), AimLevel::Good);
        assert_eq!(gaming_score(80.0, 15.0, 0.6), AimLevel::Fair);
        assert_eq!(gaming_score(140.0, 50.0, 0.0), AimLevel::Poor);
        assert_eq!(gaming_score(151.0, 0.0, 100.0), AimLevel::VeryPoor);
    }

    #[test]
    fn test_rtc_levels() {
        assert_eq!(rtc_score(5.0, 30.0, 5.0, 10.0), AimLevel::Excellent);
        assert_eq!(rtc_score(1.5, 30.0, 5.0, 10.0), AimLevel::Good);
        assert_eq!(rtc_score(0.6, 140.0, 25.0, 0.0), AimLevel::Fair);
        assert_eq!(rtc_score(0.1, 500.0, 100.0, 0.0), AimLevel::Poor);
        assert_eq!(rtc_score(0.05, 10.0, 1.0, 100.0), AimLevel::VeryPoor);
    }

    #[test]
    fn test_scores_from_result_convert_to_megabits() {
        // 3.75 MB/s down = 30 Mbps, 0.5 MB/s up = 4 Mbps
        let result = fixtures::result(3_750_000.0, 500_000.0, 40.0, 4.0);
        let scores = calculate_aim_scores(&result);

        assert_eq!(scores.streaming, AimLevel::Excellent);
        assert_eq!(scores.gaming, AimLevel::Good);
        assert_eq!(scores.rtc, AimLevel::Excellent);
        assert_eq!(scores.overall(), AimLevel::Good);
    }

    #[test]
    fn test_zero_result_scores() {
        let result = fixtures::result(0.0, 0.0, 0.0, 0.0);
        let scores = calculate_aim_scores(&result);

        assert_eq!(scores.streaming, AimLevel::VeryPoor);
        // Zero latency still qualifies for the latency-only gaming tier
        assert_eq!(scores.gaming, AimLevel::Poor);
        assert_eq!(scores.rtc, AimLevel::VeryPoor);
    }

    #[test]
    fn test_level_ordering_and_labels() {
        assert!(AimLevel::Excellent > AimLevel::Good);
        assert!(AimLevel::Fair.is_at_least(AimLevel::Poor));
        assert!(!AimLevel::VeryPoor.is_at_least(AimLevel::Poor));
        assert_eq!(AimLevel::VeryPoor.to_string(), "Very Poor");
    }
}
