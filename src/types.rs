//! Type definitions shared across the engine, models and host

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// Stages of a speed test run
///
/// `Idle` is both the initial state and the state the engine returns to
/// after a run completes, fails or is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TestStage {
    #[default]
    Idle,
    MeasuringUnloadedLatency,
    MeasuringDownload,
    MeasuringUpload,
    MeasuringLoadedLatency,
}

impl TestStage {
    /// Human-readable stage name
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::MeasuringUnloadedLatency => "Measuring latency",
            Self::MeasuringDownload => "Measuring download",
            Self::MeasuringUpload => "Measuring upload",
            Self::MeasuringLoadedLatency => "Measuring loaded latency",
        }
    }

    /// Progress range `[start, end]` this stage covers within a run
    pub fn progress_range(&self) -> (f64, f64) {
        match self {
            Self::Idle => (0.0, 0.0),
            Self::MeasuringUnloadedLatency => (0.0, 0.1),
            Self::MeasuringDownload => (0.1, 0.5),
            Self::MeasuringUpload => (0.5, 0.9),
            Self::MeasuringLoadedLatency => (0.9, 1.0),
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle)
    }
}

impl fmt::Display for TestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Terminal status of the most recent run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

/// Direction of a bulk transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    Download,
    Upload,
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download => write!(f, "download"),
            Self::Upload => write!(f, "upload"),
        }
    }
}

/// How the loaded-latency figures of a result are obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadedLatencyMode {
    /// One latency stage after the upload stage. The upload-side figures are
    /// derived from it with fixed offsets and are not independent measurements.
    #[default]
    Estimated,
    /// Latency probed separately under a background download load and a
    /// background upload load.
    Measured,
}

impl LoadedLatencyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Estimated => "estimated",
            Self::Measured => "measured",
        }
    }
}

impl fmt::Display for LoadedLatencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadedLatencyMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "estimated" | "estimate" => Ok(Self::Estimated),
            "measured" | "measure" => Ok(Self::Measured),
            other => Err(AppError::parse(format!(
                "Invalid loaded latency mode '{}' (expected 'estimated' or 'measured')",
                other
            ))),
        }
    }
}
