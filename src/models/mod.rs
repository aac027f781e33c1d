//! Data models for the speed test engine and host

pub mod config;
pub mod metrics;

// Re-export main model types
pub use config::{Config, TestConfiguration};
pub use metrics::{
    LatencyReport, LiveMetrics, NetworkContext, SizeMeasurement, SpeedTestRecord, TestResult,
    TransferReport,
};

#[cfg(test)]
pub(crate) use metrics::fixtures;
