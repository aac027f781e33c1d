//! Network Speed Tester
//!
//! An active HTTP speed test engine. It measures unloaded latency, download
//! and upload throughput and loaded latency against a speed-test endpoint,
//! publishes live progress while it runs, and derives qualitative AIM scores
//! (streaming, gaming, real-time communication) from the final result.

pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod output;
pub mod stats;
pub mod types;

// Re-export commonly used types
pub use client::{MockTransport, ReqwestTransport, SpeedTestTransport, TransferResponse};
pub use engine::{RunOutcome, SpeedTestEngine};
pub use error::{AppError, Result};
pub use models::{Config, LiveMetrics, NetworkContext, SpeedTestRecord, TestConfiguration, TestResult};
pub use stats::aim::{calculate_aim_scores, AimLevel, AimScores};
pub use types::{LoadedLatencyMode, RunStatus, TestStage, TransferDirection};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Version string including the build metadata captured by `build.rs`
pub fn build_info() -> String {
    let commit = option_env!("GIT_COMMIT").unwrap_or("unknown");
    let built = option_env!("BUILD_TIME").unwrap_or("unknown");
    let target = option_env!("TARGET_TRIPLE").unwrap_or("unknown");
    let profile = option_env!("BUILD_PROFILE").unwrap_or("unknown");
    format!("{} {} ({}, built {}, {} {})", PKG_NAME, VERSION, commit, built, target, profile)
}

/// Default configuration values
pub mod defaults {
    pub const DEFAULT_DOWNLOAD_URL: &str = "https://speed.cloudflare.com/__down";
    pub const DEFAULT_UPLOAD_URL: &str = "https://speed.cloudflare.com/__up";
    pub const DEFAULT_LATENCY_URL: &str = "https://speed.cloudflare.com/__down";

    pub const DEFAULT_DOWNLOAD_SIZES: &[u64] = &[
        100_000,    // 100 KB
        1_000_000,  // 1 MB
        5_000_000,  // 5 MB
        10_000_000, // 10 MB
        25_000_000, // 25 MB
    ];
    pub const DEFAULT_UPLOAD_SIZES: &[u64] = &[
        100_000,    // 100 KB
        1_000_000,  // 1 MB
        5_000_000,  // 5 MB
        10_000_000, // 10 MB
    ];

    pub const DEFAULT_LATENCY_SAMPLES: u32 = 10;
    pub const DEFAULT_CONCURRENT_CONNECTIONS: u32 = 4;
    pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
    pub const DEFAULT_HISTORY_CAPACITY: usize = 50;
    pub const DEFAULT_LATENCY_INTERVAL_MS: u64 = 200;
    pub const DEFAULT_INTER_SIZE_DELAY_MS: u64 = 100;
    pub const DEFAULT_ENABLE_COLOR: bool = true;

    /// Offsets applied to the single loaded-latency measurement to estimate
    /// the upload-side figures in estimated mode
    pub const LOADED_UPLOAD_LATENCY_OFFSET_MS: f64 = 5.0;
    pub const LOADED_UPLOAD_JITTER_OFFSET_MS: f64 = 1.0;

    pub fn default_user_agent() -> String {
        format!("network-speed-tester/{}", super::VERSION)
    }
}
