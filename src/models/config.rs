//! Configuration data model and validation

use crate::types::{AppError, LoadedLatencyMode, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Largest payload accepted for a single transfer
pub const MAX_PAYLOAD_BYTES: u64 = 1_000_000_000;

/// Engine configuration, fixed for the lifetime of a `SpeedTestEngine`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestConfiguration {
    /// Download payload sizes in bytes
    #[serde(default = "default_download_sizes")]
    pub download_sizes: Vec<u64>,

    /// Upload payload sizes in bytes
    #[serde(default = "default_upload_sizes")]
    pub upload_sizes: Vec<u64>,

    /// Number of latency probes per latency stage
    #[serde(default = "default_latency_samples")]
    pub latency_samples: u32,

    /// Parallel connections per payload size
    #[serde(default = "default_concurrent_connections")]
    pub concurrent_connections: u32,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_seconds: u64,

    #[serde(default = "default_download_url")]
    pub download_url: String,

    #[serde(default = "default_upload_url")]
    pub upload_url: String,

    #[serde(default = "default_latency_url")]
    pub latency_url: String,

    /// User-Agent sent with every request
    #[serde(default = "crate::defaults::default_user_agent")]
    pub user_agent: String,

    /// Capacity of the download/upload speed history buffers
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Delay between latency probes
    #[serde(default = "default_latency_interval_ms")]
    pub latency_interval_ms: u64,

    /// Delay between payload sizes in a transfer stage
    #[serde(default = "default_inter_size_delay_ms")]
    pub inter_size_delay_ms: u64,

    #[serde(default)]
    pub loaded_latency_mode: LoadedLatencyMode,
}

impl Default for TestConfiguration {
    fn default() -> Self {
        Self {
            download_sizes: default_download_sizes(),
            upload_sizes: default_upload_sizes(),
            latency_samples: default_latency_samples(),
            concurrent_connections: default_concurrent_connections(),
            timeout_seconds: default_timeout_secs(),
            download_url: default_download_url(),
            upload_url: default_upload_url(),
            latency_url: default_latency_url(),
            user_agent: crate::defaults::default_user_agent(),
            history_capacity: default_history_capacity(),
            latency_interval_ms: default_latency_interval_ms(),
            inter_size_delay_ms: default_inter_size_delay_ms(),
            loaded_latency_mode: LoadedLatencyMode::default(),
        }
    }
}

impl TestConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn latency_interval(&self) -> Duration {
        Duration::from_millis(self.latency_interval_ms)
    }

    pub fn inter_size_delay(&self) -> Duration {
        Duration::from_millis(self.inter_size_delay_ms)
    }

    /// Download sizes in the order the engine measures them
    pub fn sorted_download_sizes(&self) -> Vec<u64> {
        sorted(&self.download_sizes)
    }

    /// Upload sizes in the order the engine measures them
    pub fn sorted_upload_sizes(&self) -> Vec<u64> {
        sorted(&self.upload_sizes)
    }

    /// Validate the configuration and return the first problem found
    pub fn validate(&self) -> Result<()> {
        validate_sizes("download", &self.download_sizes)?;
        validate_sizes("upload", &self.upload_sizes)?;

        if self.latency_samples == 0 {
            return Err(AppError::config("Latency sample count must be greater than 0"));
        }

        if self.latency_samples > 100 {
            return Err(AppError::config("Latency sample count cannot exceed 100"));
        }

        if self.concurrent_connections == 0 {
            return Err(AppError::config("Concurrent connections must be greater than 0"));
        }

        if self.concurrent_connections > 32 {
            return Err(AppError::config("Concurrent connections cannot exceed 32"));
        }

        if self.timeout_seconds == 0 {
            return Err(AppError::config("Timeout must be greater than 0"));
        }

        if self.timeout_seconds > 300 {
            return Err(AppError::config("Timeout cannot exceed 300 seconds"));
        }

        validate_url("download", &self.download_url)?;
        validate_url("upload", &self.upload_url)?;
        validate_url("latency", &self.latency_url)?;

        if self.user_agent.trim().is_empty() {
            return Err(AppError::config("User agent cannot be empty"));
        }

        if self.history_capacity == 0 {
            return Err(AppError::config("History capacity must be greater than 0"));
        }

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(sizes) = std::env::var("SPEEDTEST_DOWNLOAD_SIZES") {
            self.download_sizes = parse_size_list("SPEEDTEST_DOWNLOAD_SIZES", &sizes)?;
        }

        if let Ok(sizes) = std::env::var("SPEEDTEST_UPLOAD_SIZES") {
            self.upload_sizes = parse_size_list("SPEEDTEST_UPLOAD_SIZES", &sizes)?;
        }

        if let Ok(samples) = std::env::var("SPEEDTEST_LATENCY_SAMPLES") {
            self.latency_samples = samples.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid SPEEDTEST_LATENCY_SAMPLES value '{}': {}", samples, e)))?;
        }

        if let Ok(connections) = std::env::var("SPEEDTEST_CONNECTIONS") {
            self.concurrent_connections = connections.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid SPEEDTEST_CONNECTIONS value '{}': {}", connections, e)))?;
        }

        if let Ok(timeout) = std::env::var("SPEEDTEST_TIMEOUT_SECONDS") {
            self.timeout_seconds = timeout.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid SPEEDTEST_TIMEOUT_SECONDS value '{}': {}", timeout, e)))?;
        }

        if let Ok(url) = std::env::var("SPEEDTEST_DOWNLOAD_URL") {
            self.download_url = url.trim().to_string();
        }

        if let Ok(url) = std::env::var("SPEEDTEST_UPLOAD_URL") {
            self.upload_url = url.trim().to_string();
        }

        if let Ok(url) = std::env::var("SPEEDTEST_LATENCY_URL") {
            self.latency_url = url.trim().to_string();
        }

        if let Ok(user_agent) = std::env::var("SPEEDTEST_USER_AGENT") {
            self.user_agent = user_agent;
        }

        if let Ok(mode) = std::env::var("SPEEDTEST_LOADED_LATENCY") {
            self.loaded_latency_mode = mode.parse()
                .map_err(|e: AppError| AppError::config(format!("Invalid SPEEDTEST_LOADED_LATENCY value: {}", e)))?;
        }

        Ok(())
    }
}

/// Host application configuration wrapping the engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub test: TestConfiguration,

    /// Enable colored terminal output
    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    /// Enable verbose output
    #[serde(default)]
    pub verbose: bool,

    /// Enable debug output
    #[serde(default)]
    pub debug: bool,

    /// Print the final record as JSON
    #[serde(default)]
    pub json_output: bool,

    /// Show speeds in bytes per second instead of bits per second
    #[serde(default)]
    pub show_bytes: bool,

    /// Caller-supplied network type attached to the record
    #[serde(default)]
    pub network_type: Option<String>,

    /// Caller-supplied ISP name attached to the record
    #[serde(default)]
    pub isp_name: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            test: TestConfiguration::default(),
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
            json_output: false,
            show_bytes: false,
            network_type: None,
            isp_name: None,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        self.test.validate()
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        self.test.merge_from_env()?;

        if let Ok(enable_color) = std::env::var("ENABLE_COLOR") {
            self.enable_color = enable_color.trim().parse()
                .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", enable_color, e)))?;
        }

        Ok(())
    }
}

fn sorted(sizes: &[u64]) -> Vec<u64> {
    let mut sizes = sizes.to_vec();
    sizes.sort_unstable();
    sizes
}

fn validate_sizes(direction: &str, sizes: &[u64]) -> Result<()> {
    for &size in sizes {
        if size == 0 {
            return Err(AppError::config(format!("{} payload size must be greater than 0", capitalize(direction))));
        }
        if size > MAX_PAYLOAD_BYTES {
            return Err(AppError::config(format!(
                "{} payload size {} exceeds the {} byte limit",
                capitalize(direction), size, MAX_PAYLOAD_BYTES
            )));
        }
    }
    Ok(())
}

fn validate_url(name: &str, url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(AppError::config(format!("{} URL cannot be empty", capitalize(name))));
    }

    match url::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        Ok(parsed) => Err(AppError::config(format!(
            "{} URL must use http or https, got '{}': {}",
            capitalize(name), parsed.scheme(), url
        ))),
        Err(e) => Err(AppError::config(format!("Invalid {} URL '{}': {}", name, url, e))),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Parse a comma separated list of byte counts
pub fn parse_size_list(name: &str, value: &str) -> Result<Vec<u64>> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u64>()
                .map_err(|e| AppError::config(format!("Invalid {} entry '{}': {}", name, s, e)))
        })
        .collect()
}

// Default value functions for serde
fn default_download_sizes() -> Vec<u64> {
    crate::defaults::DEFAULT_DOWNLOAD_SIZES.to_vec()
}

fn default_upload_sizes() -> Vec<u64> {
    crate::defaults::DEFAULT_UPLOAD_SIZES.to_vec()
}

fn default_latency_samples() -> u32 {
    crate::defaults::DEFAULT_LATENCY_SAMPLES
}

fn default_concurrent_connections() -> u32 {
    crate::defaults::DEFAULT_CONCURRENT_CONNECTIONS
}

fn default_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_TIMEOUT_SECONDS
}

fn default_download_url() -> String {
    crate::defaults::DEFAULT_DOWNLOAD_URL.to_string()
}

fn default_upload_url() -> String {
    crate::defaults::DEFAULT_UPLOAD_URL.to_string()
}

fn default_latency_url() -> String {
    crate::defaults::DEFAULT_LATENCY_URL.to_string()
}

fn default_history_capacity() -> usize {
    crate::defaults::DEFAULT_HISTORY_CAPACITY
}

fn default_latency_interval_ms() -> u64 {
    crate::defaults::DEFAULT_LATENCY_INTERVAL_MS
}

fn default_inter_size_delay_ms() -> u64 {
    crate::defaults::DEFAULT_INTER_SIZE_DELAY_MS
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TestConfiguration::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.download_sizes.len(), 5);
        assert_eq!(config.upload_sizes.len(), 4);
        assert_eq!(config.latency_samples, 10);
        assert_eq!(config.concurrent_connections, 4);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.loaded_latency_mode, LoadedLatencyMode::Estimated);
    }

    #[test]
    fn test_empty_size_lists_are_allowed() {
        let config = TestConfiguration {
            download_sizes: vec![],
            upload_sizes: vec![],
            ..TestConfiguration::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_and_oversized_payloads_invalid() {
        let mut config = TestConfiguration::default();
        config.download_sizes = vec![0];
        assert!(config.validate().is_err());

        let mut config = TestConfiguration::default();
        config.upload_sizes = vec![MAX_PAYLOAD_BYTES + 1];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Upload payload size"));
    }

    #[test]
    fn test_sample_and_connection_limits() {
        let mut config = TestConfiguration::default();
        config.latency_samples = 0;
        assert!(config.validate().is_err());
        config.latency_samples = 101;
        assert!(config.validate().is_err());

        let mut config = TestConfiguration::default();
        config.concurrent_connections = 0;
        assert!(config.validate().is_err());
        config.concurrent_connections = 33;
        assert!(config.validate().is_err());
        config.concurrent_connections = 32;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_timeout_limits() {
        let mut config = TestConfiguration::default();
        config.timeout_seconds = 0;
        assert!(config.validate().is_err());
        config.timeout_seconds = 301;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_url_scheme_validation() {
        let mut config = TestConfiguration::default();
        config.latency_url = "ftp://example.com/ping".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("http or https"));

        let mut config = TestConfiguration::default();
        config.upload_url = "not-a-url".to_string();
        assert!(config.validate().is_err());

        let mut config = TestConfiguration::default();
        config.download_url = "http://127.0.0.1:8080/__down".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_user_agent_and_history_invalid() {
        let mut config = TestConfiguration::default();
        config.user_agent = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = TestConfiguration::default();
        config.history_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sorted_sizes_leave_config_untouched() {
        let config = TestConfiguration {
            download_sizes: vec![5_000, 100, 1_000],
            ..TestConfiguration::default()
        };
        assert_eq!(config.sorted_download_sizes(), vec![100, 1_000, 5_000]);
        assert_eq!(config.download_sizes, vec![5_000, 100, 1_000]);
    }

    #[test]
    fn test_parse_size_list() {
        assert_eq!(parse_size_list("X", "100, 2000 ,").unwrap(), vec![100, 2000]);
        assert!(parse_size_list("X", "100,abc").is_err());
        assert!(parse_size_list("X", "").unwrap().is_empty());
    }

    #[test]
    fn test_serde_defaults_fill_missing_fields() {
        let config: TestConfiguration =
            serde_json::from_str(r#"{"latency_samples": 3, "loaded_latency_mode": "measured"}"#).unwrap();
        assert_eq!(config.latency_samples, 3);
        assert_eq!(config.loaded_latency_mode, LoadedLatencyMode::Measured);
        assert_eq!(config.download_url, crate::defaults::DEFAULT_DOWNLOAD_URL);
        assert_eq!(config.history_capacity, 50);
    }

    #[test]
    fn test_host_config_defaults() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.enable_color);
        assert!(!config.json_output);
        assert!(config.network_type.is_none());
    }
}
