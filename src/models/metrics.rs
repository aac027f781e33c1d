//! Live metrics, measurement reports and result data models

use crate::stats::{self, aim::AimScores};
use crate::types::{LoadedLatencyMode, RunStatus, TestStage, TransferDirection};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Observable state of the engine, published after every sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveMetrics {
    /// Current download speed (bytes/s)
    pub download_bps: f64,

    /// Current upload speed (bytes/s)
    pub upload_bps: f64,

    pub latency_ms: f64,
    pub jitter_ms: f64,
    pub packet_loss_percent: f64,

    /// Overall run progress in [0.0, 1.0]
    pub progress: f64,

    /// Most recent per-connection download speeds in MB/s, oldest first
    pub download_history: VecDeque<f64>,

    /// Most recent per-connection upload speeds in MB/s, oldest first
    pub upload_history: VecDeque<f64>,

    pub is_running: bool,

    /// Stage the current run is in, `Idle` between runs
    pub stage: TestStage,

    /// How the most recent run ended
    pub last_outcome: Option<RunStatus>,
}

impl Default for LiveMetrics {
    fn default() -> Self {
        Self {
            download_bps: 0.0,
            upload_bps: 0.0,
            latency_ms: 0.0,
            jitter_ms: 0.0,
            packet_loss_percent: 0.0,
            progress: 0.0,
            download_history: VecDeque::new(),
            upload_history: VecDeque::new(),
            is_running: false,
            stage: TestStage::Idle,
            last_outcome: None,
        }
    }
}

impl LiveMetrics {
    pub fn history(&self, direction: TransferDirection) -> &VecDeque<f64> {
        match direction {
            TransferDirection::Download => &self.download_history,
            TransferDirection::Upload => &self.upload_history,
        }
    }

    /// Current speed for a direction (bytes/s)
    pub fn speed(&self, direction: TransferDirection) -> f64 {
        match direction {
            TransferDirection::Download => self.download_bps,
            TransferDirection::Upload => self.upload_bps,
        }
    }
}

/// Outcome of one latency stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyReport {
    /// Mean RTT of the successful probes (0 when none succeeded)
    pub mean_ms: f64,

    /// Population standard deviation of the successful RTTs
    pub jitter_ms: f64,

    pub packet_loss_percent: f64,

    /// Number of probes attempted
    pub attempts: u32,

    /// RTTs of the successful probes, in dispatch order
    pub samples_ms: Vec<f64>,
}

impl LatencyReport {
    /// Reduce a sample set to mean, jitter and loss
    pub fn from_samples(attempts: u32, samples_ms: Vec<f64>) -> Self {
        let successes = samples_ms.len() as u32;
        Self {
            mean_ms: stats::mean(&samples_ms),
            jitter_ms: stats::population_std_dev(&samples_ms),
            packet_loss_percent: stats::packet_loss_percent(attempts, successes),
            attempts,
            samples_ms,
        }
    }

    pub fn success_count(&self) -> u32 {
        self.samples_ms.len() as u32
    }
}

/// Measurements for a single payload size
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeMeasurement {
    pub size_bytes: u64,

    /// Speed of every connection (bytes/s), failed connections as 0
    pub connection_speeds_bps: Vec<f64>,

    /// Mean of the successful connection speeds, `None` when all failed
    pub mean_bps: Option<f64>,
}

impl SizeMeasurement {
    pub fn new(size_bytes: u64, connection_speeds_bps: Vec<f64>) -> Self {
        let mean_bps = stats::mean_of_successful(&connection_speeds_bps);
        Self {
            size_bytes,
            connection_speeds_bps,
            mean_bps,
        }
    }

    pub fn successful_connections(&self) -> usize {
        self.connection_speeds_bps.iter().filter(|&&s| s > 0.0).count()
    }
}

/// Outcome of one transfer stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferReport {
    pub direction: TransferDirection,

    /// Stage speed: max of the per-size means (bytes/s)
    pub speed_bps: f64,

    pub per_size: Vec<SizeMeasurement>,
}

impl TransferReport {
    pub fn from_sizes(direction: TransferDirection, per_size: Vec<SizeMeasurement>) -> Self {
        let means: Vec<f64> = per_size.iter().filter_map(|m| m.mean_bps).collect();
        Self {
            direction,
            speed_bps: stats::max_of_means(&means),
            per_size,
        }
    }

    pub fn empty(direction: TransferDirection) -> Self {
        Self {
            direction,
            speed_bps: 0.0,
            per_size: Vec::new(),
        }
    }
}

/// Final result of a completed run. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Download throughput (bytes/s)
    pub download_speed_bps: f64,

    /// Upload throughput (bytes/s)
    pub upload_speed_bps: f64,

    /// Unloaded latency mean (ms)
    pub latency_ms: f64,

    /// Unloaded jitter (ms)
    pub jitter_ms: f64,

    /// Packet loss of the unloaded latency stage
    pub packet_loss_percent: f64,

    pub loaded_download_latency_ms: f64,
    pub loaded_upload_latency_ms: f64,
    pub loaded_download_jitter_ms: f64,
    pub loaded_upload_jitter_ms: f64,

    /// `Estimated` means the upload-side loaded figures are derived from
    /// the download-side ones rather than measured
    pub loaded_latency_mode: LoadedLatencyMode,

    pub download: TransferReport,
    pub upload: TransferReport,
}

impl TestResult {
    /// Download throughput in megabits per second
    pub fn download_megabits(&self) -> f64 {
        stats::bytes_to_megabits(self.download_speed_bps)
    }

    /// Upload throughput in megabits per second
    pub fn upload_megabits(&self) -> f64 {
        stats::bytes_to_megabits(self.upload_speed_bps)
    }

    pub fn loaded_upload_is_estimated(&self) -> bool {
        self.loaded_latency_mode == LoadedLatencyMode::Estimated
    }
}

/// Caller-supplied description of the network a test ran on
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkContext {
    pub network_type: Option<String>,
    pub isp_name: Option<String>,
}

impl NetworkContext {
    pub fn new(network_type: Option<String>, isp_name: Option<String>) -> Self {
        Self { network_type, isp_name }
    }

    pub fn network_type_or_unknown(&self) -> &str {
        self.network_type.as_deref().unwrap_or("Unknown")
    }

    pub fn isp_name_or_unknown(&self) -> &str {
        self.isp_name.as_deref().unwrap_or("Unknown")
    }
}

/// A completed result annotated for storage or display by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedTestRecord {
    pub timestamp: DateTime<Utc>,
    pub network: NetworkContext,
    pub result: TestResult,
    pub aim_scores: AimScores,
}

impl SpeedTestRecord {
    pub fn new(result: TestResult, network: NetworkContext) -> Self {
        let aim_scores = crate::stats::aim::calculate_aim_scores(&result);
        Self {
            timestamp: Utc::now(),
            network,
            result,
            aim_scores,
        }
    }

    /// Download speed in MB/s
    pub fn download_mbps(&self) -> f64 {
        stats::bytes_to_megabytes(self.result.download_speed_bps)
    }

    /// Upload speed in MB/s
    pub fn upload_mbps(&self) -> f64 {
        stats::bytes_to_megabytes(self.result.upload_speed_bps)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::aim::AimLevel;

    #[test]
    fn test_latency_report_from_samples() {
        let report = LatencyReport::from_samples(4, vec![10.0, 20.0, 30.0]);

        assert_eq!(report.mean_ms, 20.0);
        assert!((report.jitter_ms - 8.164_965_809).abs() < 1e-6);
        assert_eq!(report.packet_loss_percent, 25.0);
        assert_eq!(report.success_count(), 3);
    }

    #[test]
    fn test_latency_report_all_lost() {
        let report = LatencyReport::from_samples(10, vec![]);

        assert_eq!(report.mean_ms, 0.0);
        assert_eq!(report.jitter_ms, 0.0);
        assert_eq!(report.packet_loss_percent, 100.0);
    }

    #[test]
    fn test_size_measurement_ignores_failed_connections() {
        let measurement = SizeMeasurement::new(1_000, vec![100.0, 0.0, 300.0]);

        assert_eq!(measurement.mean_bps, Some(200.0));
        assert_eq!(measurement.successful_connections(), 2);

        let failed = SizeMeasurement::new(1_000, vec![0.0, 0.0]);
        assert_eq!(failed.mean_bps, None);
    }

    #[test]
    fn test_transfer_report_takes_max_of_means() {
        let report = TransferReport::from_sizes(
            TransferDirection::Download,
            vec![
                SizeMeasurement::new(100, vec![50.0, 150.0]),
                SizeMeasurement::new(1_000, vec![400.0, 0.0]),
                SizeMeasurement::new(10_000, vec![0.0, 0.0]),
            ],
        );

        assert_eq!(report.speed_bps, 400.0);
        assert_eq!(report.per_size.len(), 3);
    }

    #[test]
    fn test_transfer_report_all_sizes_failed() {
        let report = TransferReport::from_sizes(
            TransferDirection::Upload,
            vec![SizeMeasurement::new(100, vec![0.0])],
        );
        assert_eq!(report.speed_bps, 0.0);
    }

    #[test]
    fn test_record_attaches_scores_and_context() {
        let result = fixtures::result(3_750_000.0, 1_250_000.0, 15.0, 2.0);
        let record = SpeedTestRecord::new(
            result,
            NetworkContext::new(Some("WiFi".to_string()), None),
        );

        assert_eq!(record.download_mbps(), 3.75);
        assert_eq!(record.upload_mbps(), 1.25);
        assert_eq!(record.result.download_megabits(), 30.0);
        assert_eq!(record.aim_scores.streaming, AimLevel::Excellent);
        assert_eq!(record.network.network_type_or_unknown(), "WiFi");
        assert_eq!(record.network.isp_name_or_unknown(), "Unknown");
    }

    #[test]
    fn test_live_metrics_default_is_idle() {
        let metrics = LiveMetrics::default();
        assert!(!metrics.is_running);
        assert_eq!(metrics.stage, TestStage::Idle);
        assert_eq!(metrics.progress, 0.0);
        assert!(metrics.history(TransferDirection::Upload).is_empty());
        assert!(metrics.last_outcome.is_none());
    }

    #[test]
    fn test_result_serializes_mode() {
        let result = fixtures::result(1.0, 1.0, 1.0, 1.0);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["loaded_latency_mode"], "estimated");
        assert_eq!(json["download"]["direction"], "download");
    }
}
