//! Command-line interface

pub mod help;

pub use help::HelpSystem;

use crate::models::config::parse_size_list;
use crate::types::LoadedLatencyMode;
use clap::Parser;

/// Comma-separated payload sizes given as a single argument.
///
/// An empty string is an empty list, which skips that transfer stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizeList(pub Vec<u64>);

impl SizeList {
    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<u64> {
        self.0
    }
}

/// Network Speed Tester - measure latency, throughput and responsiveness over HTTP
#[derive(Parser, Debug, Clone)]
#[command(name = "nst")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Download payload sizes in bytes (comma-separated)
    #[arg(long, value_name = "BYTES", value_parser = parse_sizes)]
    pub download_sizes: Option<SizeList>,

    /// Upload payload sizes in bytes (comma-separated)
    #[arg(long, value_name = "BYTES", value_parser = parse_sizes)]
    pub upload_sizes: Option<SizeList>,

    /// Latency probes per latency stage
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub samples: Option<u32>,

    /// Parallel connections per payload size
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=32))]
    pub connections: Option<u32>,

    /// Request timeout in seconds
    #[arg(short, long, value_parser = parse_duration)]
    pub timeout: Option<u64>,

    /// Download endpoint
    #[arg(long, value_name = "URL")]
    pub download_url: Option<String>,

    /// Upload endpoint
    #[arg(long, value_name = "URL")]
    pub upload_url: Option<String>,

    /// Latency probe endpoint
    #[arg(long, value_name = "URL")]
    pub latency_url: Option<String>,

    /// Loaded latency mode: estimated or measured
    #[arg(long, value_name = "MODE", value_parser = parse_loaded_latency)]
    pub loaded_latency: Option<LoadedLatencyMode>,

    /// Network type to attach to the result (e.g. wifi, ethernet)
    #[arg(long)]
    pub network_type: Option<String>,

    /// ISP name to attach to the result
    #[arg(long)]
    pub isp: Option<String>,

    /// Print the final result as JSON
    #[arg(long)]
    pub json: bool,

    /// Show speeds in bytes per second (MB/s) instead of bits (Mbps)
    #[arg(long)]
    pub bytes: bool,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Show help for a specific topic (config, env, aim, output)
    #[arg(long, value_name = "TOPIC")]
    pub help_topic: Option<String>,
}

impl Cli {
    /// Validate CLI arguments for conflicts
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if self.json && self.color {
            return Err("Cannot specify --color together with --json".to_string());
        }

        let no_sizes = |sizes: &Option<SizeList>| sizes.as_ref().is_some_and(|s| s.is_empty());
        if no_sizes(&self.download_sizes) && no_sizes(&self.upload_sizes) {
            return Err("At least one download or upload size is required".to_string());
        }

        Ok(())
    }

    pub fn should_show_topic_help(&self) -> bool {
        self.help_topic.is_some()
    }

    pub fn get_help_topic(&self) -> Option<&str> {
        self.help_topic.as_deref()
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.json {
            false
        } else if self.color {
            true
        } else if self.no_color {
            false
        } else {
            supports_color()
        }
    }

    /// Display help for the specified topic or main help
    pub fn display_help(&self) -> String {
        let help_system = HelpSystem::new();
        let use_colors = self.use_colors();

        match &self.help_topic {
            Some(topic) => help_system.display_topic_help(topic, use_colors).unwrap_or_else(|| {
                format!(
                    "Unknown help topic: '{}'\n\nAvailable topics: {}\n\n{}",
                    topic,
                    HelpSystem::TOPICS.join(", "),
                    help_system.display_main_help(use_colors)
                )
            }),
            None => help_system.display_main_help(use_colors),
        }
    }

    /// Get configuration summary for display
    pub fn get_config_summary(&self) -> String {
        let mut summary = String::new();

        summary.push_str("Configuration Summary:\n");
        if let Some(ref sizes) = self.download_sizes {
            summary.push_str(&format!("  Download sizes: {:?}\n", sizes.as_slice()));
        }
        if let Some(ref sizes) = self.upload_sizes {
            summary.push_str(&format!("  Upload sizes: {:?}\n", sizes.as_slice()));
        }
        if let Some(samples) = self.samples {
            summary.push_str(&format!("  Latency samples: {}\n", samples));
        }
        if let Some(connections) = self.connections {
            summary.push_str(&format!("  Connections: {}\n", connections));
        }
        if let Some(timeout) = self.timeout {
            summary.push_str(&format!("  Timeout: {}s\n", timeout));
        }
        if let Some(mode) = self.loaded_latency {
            summary.push_str(&format!("  Loaded latency: {}\n", mode));
        }
        summary.push_str(&format!("  Colored output: {}\n", self.use_colors()));
        summary.push_str(&format!("  JSON output: {}\n", self.json));
        summary.push_str(&format!("  Verbose mode: {}\n", self.verbose));
        summary.push_str(&format!("  Debug mode: {}\n", self.debug));

        summary
    }
}

fn parse_sizes(s: &str) -> Result<SizeList, String> {
    let sizes = parse_size_list("size list", s).map_err(|e| e.to_string())?;
    if sizes.contains(&0) {
        return Err("Payload sizes must be greater than 0".to_string());
    }
    Ok(SizeList(sizes))
}

fn parse_loaded_latency(s: &str) -> Result<LoadedLatencyMode, String> {
    s.parse().map_err(|e: crate::error::AppError| e.to_string())
}

/// Parse duration from seconds string
fn parse_duration(s: &str) -> Result<u64, String> {
    // Reject strings with leading + sign or other invalid formats
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid duration: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid duration: {}", s))
        .and_then(|secs| {
            if secs == 0 {
                Err("Duration must be greater than 0".to_string())
            } else if secs > 300 {
                Err("Duration cannot exceed 300 seconds".to_string())
            } else {
                Ok(secs)
            }
        })
}

/// Check if the terminal supports color output
fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(target_os = "windows")]
    {
        if std::env::var("ANSICON").is_ok() || std::env::var("ConEmuANSI").is_ok() {
            return true;
        }
    }

    // Default to true on Unix-like systems, false on Windows
    #[cfg(unix)]
    {
        true
    }
    #[cfg(not(unix))]
    {
        false
    }
}
