//! Environment variable handling and .env file management

use crate::error::{AppError, ErrorContext, Result};
use crate::models::config::{parse_size_list, MAX_PAYLOAD_BYTES};
use crate::types::LoadedLatencyMode;
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        Self::load_env_file_from(Path::new(".env"), debug)
    }

    /// Load a specific env file if it exists. Variables already set win.
    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<()> {
        if path.exists() {
            dotenv::from_path(path).with_context(|| format!("Failed to load {}", path.display()))?;

            if debug {
                eprintln!("Loaded configuration from {}", path.display());
            }
        } else if debug {
            eprintln!("No {} file found, using defaults and CLI arguments", path.display());
        }

        Ok(())
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# Network Speed Tester Configuration
#
# Values here are used as defaults and can be overridden by command-line
# arguments. Sizes are in bytes.

# Payload sizes, tested smallest first (comma-separated)
# SPEEDTEST_DOWNLOAD_SIZES=100000,1000000,5000000,10000000,25000000
# SPEEDTEST_UPLOAD_SIZES=100000,1000000,5000000,10000000

# Latency probes per latency stage
# SPEEDTEST_LATENCY_SAMPLES=10

# Parallel connections per payload size
# SPEEDTEST_CONNECTIONS=4

# Request timeout in seconds
# SPEEDTEST_TIMEOUT_SECONDS=30

# Endpoints
# SPEEDTEST_DOWNLOAD_URL=https://speed.cloudflare.com/__down
# SPEEDTEST_UPLOAD_URL=https://speed.cloudflare.com/__up
# SPEEDTEST_LATENCY_URL=https://speed.cloudflare.com/__down

# User-Agent sent with every request
# SPEEDTEST_USER_AGENT=network-speed-tester

# Loaded latency: estimated (upload figures derived from download) or measured
# SPEEDTEST_LOADED_LATENCY=estimated

# Enable colored output (true/false)
# ENABLE_COLOR=true

# Quick test on a slow link:
# SPEEDTEST_DOWNLOAD_SIZES=100000,1000000
# SPEEDTEST_UPLOAD_SIZES=100000
# SPEEDTEST_CONNECTIONS=2
"#
        .to_string()
    }

    /// Save example .env file to disk
    pub fn save_example_env_file(path: &Path) -> Result<()> {
        let content = Self::create_example_env_content();
        std::fs::write(path, content)
            .map_err(|e| AppError::config(format!("Failed to write example .env file: {}", e)))?;

        Ok(())
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        match key {
            "SPEEDTEST_DOWNLOAD_SIZES" | "SPEEDTEST_UPLOAD_SIZES" => {
                for size in parse_size_list(key, value)? {
                    if size == 0 || size > MAX_PAYLOAD_BYTES {
                        return Err(AppError::config(format!(
                            "{} entries must be between 1 and {}, got: {}",
                            key, MAX_PAYLOAD_BYTES, size
                        )));
                    }
                }
            }
            "SPEEDTEST_LATENCY_SAMPLES" => {
                let samples: u32 = value
                    .trim()
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if samples == 0 || samples > 100 {
                    return Err(AppError::config(format!("{} must be between 1 and 100, got: {}", key, samples)));
                }
            }
            "SPEEDTEST_CONNECTIONS" => {
                let connections: u32 = value
                    .trim()
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if connections == 0 || connections > 32 {
                    return Err(AppError::config(format!("{} must be between 1 and 32, got: {}", key, connections)));
                }
            }
            "SPEEDTEST_TIMEOUT_SECONDS" => {
                let timeout: u64 = value
                    .trim()
                    .parse()
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if timeout == 0 || timeout > 300 {
                    return Err(AppError::config(format!("{} must be between 1 and 300, got: {}", key, timeout)));
                }
            }
            "SPEEDTEST_DOWNLOAD_URL" | "SPEEDTEST_UPLOAD_URL" | "SPEEDTEST_LATENCY_URL" => {
                let parsed = url::Url::parse(value.trim())
                    .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(AppError::config(format!("{} must use http or https: {}", key, value)));
                }
            }
            "SPEEDTEST_USER_AGENT" => {
                if value.trim().is_empty() {
                    return Err(AppError::config(format!("{} cannot be empty", key)));
                }
            }
            "SPEEDTEST_LOADED_LATENCY" => {
                value.parse::<LoadedLatencyMode>()?;
            }
            "ENABLE_COLOR" => {
                value
                    .trim()
                    .parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", value, e)))?;
            }
            _ => {
                // Unknown environment variable, ignore
            }
        }

        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("SPEEDTEST_DOWNLOAD_SIZES", "Comma-separated download payload sizes (bytes)", "100000,1000000,5000000"),
            ("SPEEDTEST_UPLOAD_SIZES", "Comma-separated upload payload sizes (bytes)", "100000,1000000"),
            ("SPEEDTEST_LATENCY_SAMPLES", "Latency probes per stage (1-100)", "10"),
            ("SPEEDTEST_CONNECTIONS", "Parallel connections per size (1-32)", "4"),
            ("SPEEDTEST_TIMEOUT_SECONDS", "Request timeout in seconds (1-300)", "30"),
            ("SPEEDTEST_DOWNLOAD_URL", "Download endpoint", "https://speed.cloudflare.com/__down"),
            ("SPEEDTEST_UPLOAD_URL", "Upload endpoint", "https://speed.cloudflare.com/__up"),
            ("SPEEDTEST_LATENCY_URL", "Latency probe endpoint", "https://speed.cloudflare.com/__down"),
            ("SPEEDTEST_USER_AGENT", "User-Agent header", "network-speed-tester"),
            ("SPEEDTEST_LOADED_LATENCY", "Loaded latency mode (estimated|measured)", "estimated"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in Self::get_supported_env_vars() {
            help.push_str(&format!("  {:<26} {}\n", var, description));
            help.push_str(&format!("  {:<26} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Default values\n");

        help
    }

    /// Validate all currently set environment variables
    pub fn validate_current_env() -> Vec<String> {
        Self::get_supported_env_vars()
            .into_iter()
            .filter_map(|(var_name, _, _)| {
                let value = std::env::var(var_name).ok()?;
                Self::validate_env_var(var_name, &value)
                    .err()
                    .map(|e| format!("Warning: {}", e))
            })
            .collect()
    }

    /// Validate the lines of an env file. `None` when the file is missing.
    pub fn check_env_file(path: &Path) -> Result<Option<Vec<String>>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Failed to read {}: {}", path.display(), e)))?;

        let mut warnings = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                if let Err(e) = Self::validate_env_var(key.trim(), value.trim()) {
                    warnings.push(format!("Line '{}': {}", line, e));
                }
            }
        }

        Ok(Some(warnings))
    }
}
