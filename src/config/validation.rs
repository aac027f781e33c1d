//! Advisory configuration checks
//!
//! `TestConfiguration::validate` rejects configurations the engine cannot
//! run. The checks here only produce warnings about configurations that run
//! but may give misleading or slow results.

use crate::{
    error::Result,
    models::{Config, TestConfiguration},
    stats::bytes_to_megabits,
    types::LoadedLatencyMode,
};
use colored::*;

/// Payloads above this size trigger a warning
pub const LARGE_PAYLOAD_BYTES: u64 = 100_000_000;

/// Configuration validator with advisory rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Hard validation followed by advisory checks
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        config.validate()?;

        let test = &config.test;
        let mut warnings = Vec::new();
        warnings.extend(Self::validate_endpoints(test));
        warnings.extend(Self::validate_sizes(test));
        warnings.extend(Self::validate_performance_settings(test));
        if test.loaded_latency_mode == LoadedLatencyMode::Estimated {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "Loaded upload latency will be estimated from the loaded download latency".to_string(),
            ));
        }

        Ok(warnings)
    }

    fn validate_endpoints(test: &TestConfiguration) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        let endpoints = [
            ("Download", &test.download_url),
            ("Upload", &test.upload_url),
            ("Latency", &test.latency_url),
        ];

        for (name, url) in endpoints {
            let Ok(parsed) = url::Url::parse(url) else {
                continue;
            };

            if parsed.scheme() == "http" {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!("{} endpoint '{}' uses HTTP instead of HTTPS", name, url),
                ));
            }

            let local = match parsed.host() {
                Some(url::Host::Ipv4(ip)) => ip.is_private() || ip.is_loopback(),
                Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
                Some(url::Host::Domain(domain)) => domain == "localhost",
                None => false,
            };
            if local {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!("{} endpoint '{}' targets a private/local network", name, url),
                ));
            }
        }

        warnings
    }

    fn validate_sizes(test: &TestConfiguration) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        for (direction, sizes) in [("Download", &test.download_sizes), ("Upload", &test.upload_sizes)] {
            if sizes.is_empty() {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    format!("{} size list is empty; the {} stage will report 0", direction, direction.to_lowercase()),
                ));
                continue;
            }

            if sizes.windows(2).any(|pair| pair[0] > pair[1]) {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Info,
                    format!("{} sizes will be tested in ascending order", direction),
                ));
            }

            if let Some(&largest) = sizes.iter().max() {
                if largest > LARGE_PAYLOAD_BYTES {
                    warnings.push(ValidationWarning::new(
                        ValidationLevel::Warning,
                        format!(
                            "{} payload of {} bytes uses a lot of data per connection",
                            direction, largest
                        ),
                    ));
                }

                // Throughput each connection needs to finish its largest payload in time
                let required_bps = largest as f64 / test.timeout_seconds.max(1) as f64;
                let required_mbps = bytes_to_megabits(required_bps);
                if required_mbps > 100.0 {
                    warnings.push(ValidationWarning::new(
                        ValidationLevel::Warning,
                        format!(
                            "{}s timeout needs {:.0} Mbps per connection for the largest {} payload",
                            test.timeout_seconds,
                            required_mbps,
                            direction.to_lowercase()
                        ),
                    ));
                }
            }
        }

        warnings
    }

    fn validate_performance_settings(test: &TestConfiguration) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if test.latency_samples < 3 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "{} latency samples may not give a meaningful jitter figure (recommended: >= 3)",
                    test.latency_samples
                ),
            ));
        }

        if test.concurrent_connections > 16 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "{} concurrent connections may saturate the client before the link",
                    test.concurrent_connections
                ),
            ));
        }

        if test.timeout_seconds > 60 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("Long timeout of {}s will slow down failure detection", test.timeout_seconds),
            ));
        }

        warnings
    }
}

/// Validation warning levels
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationLevel {
    Info,
    Warning,
    Error,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        let tag = format!("[{}]", self.level.as_str());
        if !use_color {
            return format!("{} {}", tag, self.message);
        }

        let tag = match self.level {
            ValidationLevel::Info => tag.blue(),
            ValidationLevel::Warning => tag.yellow(),
            ValidationLevel::Error => tag.red(),
        };
        format!("{} {}", tag, self.message)
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}
