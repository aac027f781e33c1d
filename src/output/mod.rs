//! Output formatting and display system
//!
//! Renders speed test records as plain text, colored text or JSON, and
//! formats the one-line live progress display.

mod colored;
mod formatter;
pub mod units;

pub use colored::{aim_color, latency_color, ColorScheme, ColoredFormatter};
pub use formatter::{Alignment, Column, FormattingOptions, OutputFormatter, PlainFormatter, RowData, TableFormat};
pub use units::{format_data_usage, format_latency, format_percentage, format_speed};

use crate::{
    error::Result,
    models::{Config, LiveMetrics, SpeedTestRecord},
};

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool, verbose: bool, use_bits: bool) -> Box<dyn OutputFormatter> {
        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
            use_bits,
            ..FormattingOptions::default()
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Formatter matching the host configuration
    pub fn from_config(config: &Config) -> Box<dyn OutputFormatter> {
        Self::create_formatter(config.enable_color, config.verbose, !config.show_bytes)
    }

    /// Create a plain text formatter for scripts/logs
    pub fn create_plain_formatter() -> Box<dyn OutputFormatter> {
        Self::create_formatter(false, true, true)
    }
}

/// Main output coordinator that handles all result display
pub struct OutputCoordinator {
    formatter: Box<dyn OutputFormatter>,
    verbose: bool,
}

impl OutputCoordinator {
    pub fn new(formatter: Box<dyn OutputFormatter>, verbose: bool) -> Self {
        Self { formatter, verbose }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(OutputFormatterFactory::from_config(config), config.verbose)
    }

    /// Full report for a completed run
    pub fn display_record(&self, record: &SpeedTestRecord) -> Result<String> {
        let mut sections = vec![
            self.formatter.format_header("Network Speed Test Results")?,
            self.formatter.format_summary(record)?,
            self.formatter.format_loaded_latency(&record.result)?,
            self.formatter.format_aim_scores(&record.aim_scores)?,
        ];

        if self.verbose {
            sections.push(self.formatter.format_transfer_breakdown(&record.result.download)?);
            sections.push(self.formatter.format_transfer_breakdown(&record.result.upload)?);
        }

        Ok(sections.join("\n\n"))
    }

    pub fn display_progress(&self, metrics: &LiveMetrics) -> String {
        self.formatter.format_progress(metrics)
    }

    pub fn display_error(&self, message: &str) -> Result<String> {
        self.formatter.format_error(message)
    }

    pub fn display_warning(&self, message: &str) -> Result<String> {
        self.formatter.format_warning(message)
    }

    pub fn display_success(&self, message: &str) -> Result<String> {
        self.formatter.format_success(message)
    }
}

/// Pretty-printed JSON of a record
pub fn format_json(record: &SpeedTestRecord) -> Result<String> {
    Ok(serde_json::to_string_pretty(record)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{fixtures, NetworkContext};

    fn record() -> SpeedTestRecord {
        SpeedTestRecord::new(fixtures::result(2_000_000.0, 1_000_000.0, 30.0, 3.0), NetworkContext::default())
    }

    #[test]
    fn test_report_sections() {
        let coordinator = OutputCoordinator::new(OutputFormatterFactory::create_formatter(false, false, true), false);
        let report = coordinator.display_record(&record()).unwrap();

        assert!(report.contains("Network Speed Test Results"));
        assert!(report.contains("Summary:"));
        assert!(report.contains("Loaded Latency (estimated):"));
        assert!(report.contains("AIM Scores:"));
        assert!(!report.contains("breakdown"));
    }

    #[test]
    fn test_verbose_report_has_breakdowns() {
        let coordinator = OutputCoordinator::new(OutputFormatterFactory::create_plain_formatter(), true);
        let report = coordinator.display_record(&record()).unwrap();

        assert!(report.contains("Download breakdown:"));
        assert!(report.contains("Upload breakdown:"));
    }

    #[test]
    fn test_json_record() {
        let json = format_json(&record()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["result"]["download_speed_bps"], 2_000_000.0);
        assert_eq!(value["result"]["loaded_latency_mode"], "estimated");
        assert_eq!(value["result"]["download"]["direction"], "download");
        assert!(value["aim_scores"]["streaming"].is_string());
        assert!(value["network"]["isp_name"].is_null());
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_from_config_respects_bytes_flag() {
        let config = Config {
            enable_color: false,
            show_bytes: true,
            ..Config::default()
        };
        let coordinator = OutputCoordinator::from_config(&config);
        let report = coordinator.display_record(&record()).unwrap();
        assert!(report.contains("2.00 MB/s"));
    }
}
