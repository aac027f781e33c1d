//! Colored formatter implementation with terminal color support
//!
//! Wraps the plain formatter and adds ANSI colors keyed to AIM levels,
//! latency bands and packet loss.

use super::formatter::{
    capitalize, progress_bar, write_err, FormattingOptions, OutputFormatter, PlainFormatter,
};
use super::units::{format_latency, format_percentage};
use crate::{
    error::Result,
    models::{LiveMetrics, SpeedTestRecord, TestResult, TransferReport},
    stats::aim::{AimLevel, AimScores},
};
use colored::*;
use std::fmt::Write as _;

/// Color for an AIM level
pub fn aim_color(level: AimLevel) -> Color {
    match level {
        AimLevel::Excellent => Color::Green,
        AimLevel::Good => Color::Cyan,
        AimLevel::Fair => Color::Yellow,
        AimLevel::Poor => Color::Magenta,
        AimLevel::VeryPoor => Color::Red,
    }
}

/// Color band for a latency in milliseconds
pub fn latency_color(latency_ms: f64) -> Color {
    if latency_ms < 20.0 {
        Color::Green
    } else if latency_ms < 50.0 {
        Color::Cyan
    } else if latency_ms < 100.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub highlight: Color,
    pub muted: Color,
    pub border: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            highlight: Color::Magenta,
            muted: Color::BrightBlack,
            border: Color::BrightBlack,
        }
    }
}

/// Colored formatter implementation
pub struct ColoredFormatter {
    plain_formatter: PlainFormatter,
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    /// Create a new colored formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self::with_color_scheme(options, ColorScheme::default())
    }

    /// Create a colored formatter with custom color scheme
    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        let plain_formatter = PlainFormatter::new(options.clone());
        Self {
            plain_formatter,
            options,
            color_scheme,
        }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    /// Apply bold formatting if colors are enabled
    fn bold(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.bold()
        } else {
            text.normal()
        }
    }

    /// Bold and colored, or plain when colors are disabled
    fn strong(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.bold().color(color)
        } else {
            text.normal()
        }
    }

    fn dimmed(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.dimmed()
        } else {
            text.normal()
        }
    }

    fn latency_colored(&self, latency_ms: f64) -> ColoredString {
        self.colorize(&format_latency(latency_ms), latency_color(latency_ms))
    }

    fn loss_colored(&self, loss_percent: f64) -> ColoredString {
        let color = if loss_percent <= 0.0 {
            self.color_scheme.success
        } else if loss_percent < 5.0 {
            self.color_scheme.warning
        } else {
            self.color_scheme.error
        };
        self.colorize(&format_percentage(loss_percent), color)
    }

    fn aim_colored(&self, level: AimLevel) -> ColoredString {
        self.colorize(level.label(), aim_color(level))
    }

    /// Create a colored section header
    fn create_section_header(&self, title: &str) -> String {
        let underline = "─".repeat(title.chars().count());
        format!(
            "{}\n{}",
            self.strong(title, self.color_scheme.header),
            self.colorize(&underline, self.color_scheme.border)
        )
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "═".repeat(title.chars().count() + 4);

        writeln!(output, "{}", self.colorize(&border, self.color_scheme.border)).map_err(write_err)?;
        writeln!(output, "  {}  ", self.strong(title, self.color_scheme.header)).map_err(write_err)?;
        write!(output, "{}", self.colorize(&border, self.color_scheme.border)).map_err(write_err)?;

        Ok(output)
    }

    fn format_summary(&self, record: &SpeedTestRecord) -> Result<String> {
        let result = &record.result;
        let mut output = String::new();

        writeln!(output, "{}", self.create_section_header("Summary")).map_err(write_err)?;
        writeln!(
            output,
            "↓ Download:    {}",
            self.strong(&self.plain_formatter.speed(result.download_speed_bps), self.color_scheme.success)
        )
        .map_err(write_err)?;
        writeln!(
            output,
            "↑ Upload:      {}",
            self.strong(&self.plain_formatter.speed(result.upload_speed_bps), self.color_scheme.info)
        )
        .map_err(write_err)?;
        writeln!(output, "  Latency:     {}", self.latency_colored(result.latency_ms)).map_err(write_err)?;
        writeln!(output, "  Jitter:      {}", format_latency(result.jitter_ms)).map_err(write_err)?;
        writeln!(output, "  Packet Loss: {}", self.loss_colored(result.packet_loss_percent)).map_err(write_err)?;
        writeln!(
            output,
            "  Network:     {} {}",
            record.network.network_type_or_unknown(),
            self.dimmed(&format!("({})", record.network.isp_name_or_unknown()))
        )
        .map_err(write_err)?;
        write!(
            output,
            "  Tested at:   {}",
            self.dimmed(&record.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        )
        .map_err(write_err)?;

        Ok(output)
    }

    fn format_loaded_latency(&self, result: &TestResult) -> Result<String> {
        let mut output = String::new();
        let title = format!("Loaded Latency ({})", result.loaded_latency_mode);

        writeln!(output, "{}", self.create_section_header(&title)).map_err(write_err)?;
        writeln!(
            output,
            "  Download:    {} (jitter {})",
            self.latency_colored(result.loaded_download_latency_ms),
            format_latency(result.loaded_download_jitter_ms)
        )
        .map_err(write_err)?;
        write!(
            output,
            "  Upload:      {} (jitter {})",
            self.latency_colored(result.loaded_upload_latency_ms),
            format_latency(result.loaded_upload_jitter_ms)
        )
        .map_err(write_err)?;
        if result.loaded_upload_is_estimated() {
            write!(output, " {}", self.colorize("*estimated", self.color_scheme.muted)).map_err(write_err)?;
        }

        Ok(output)
    }

    fn format_aim_scores(&self, scores: &AimScores) -> Result<String> {
        let mut output = String::new();

        writeln!(output, "{}", self.create_section_header("AIM Scores")).map_err(write_err)?;
        writeln!(output, "  Streaming:   {}", self.aim_colored(scores.streaming)).map_err(write_err)?;
        writeln!(output, "  Gaming:      {}", self.aim_colored(scores.gaming)).map_err(write_err)?;
        writeln!(output, "  Video Calls: {}", self.aim_colored(scores.rtc)).map_err(write_err)?;
        write!(output, "  Overall:     {}", self.strong(scores.overall().label(), aim_color(scores.overall())))
            .map_err(write_err)?;

        Ok(output)
    }

    fn format_transfer_breakdown(&self, report: &TransferReport) -> Result<String> {
        let mut output = String::new();
        let title = format!("{} breakdown", capitalize(&report.direction.to_string()));

        writeln!(output, "{}", self.create_section_header(&title)).map_err(write_err)?;
        if report.per_size.is_empty() {
            write!(output, "{}", self.dimmed(&format!("No {} sizes configured.", report.direction))).map_err(write_err)?;
            return Ok(output);
        }

        let table = self
            .plain_formatter
            .create_table(&self.plain_formatter.breakdown_format(), &self.plain_formatter.breakdown_rows(report))?;
        for line in table.lines() {
            if line.contains("failed") {
                writeln!(output, "{}", self.colorize(line, self.color_scheme.error)).map_err(write_err)?;
            } else if line.starts_with('+') {
                writeln!(output, "{}", self.colorize(line, self.color_scheme.border)).map_err(write_err)?;
            } else {
                writeln!(output, "{}", line).map_err(write_err)?;
            }
        }

        Ok(output.trim_end().to_string())
    }

    fn format_progress(&self, metrics: &LiveMetrics) -> String {
        let bar = progress_bar(metrics.progress, 20, '█', '░');
        format!(
            "{} {:>3.0}% {:<26} | ↓ {} | ↑ {} | {}",
            self.colorize(&bar, self.color_scheme.info),
            metrics.progress * 100.0,
            self.bold(metrics.stage.label()),
            self.colorize(&self.plain_formatter.speed(metrics.download_bps), self.color_scheme.success),
            self.colorize(&self.plain_formatter.speed(metrics.upload_bps), self.color_scheme.info),
            self.latency_colored(metrics.latency_ms)
        )
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("✗ {}", self.colorize(error, self.color_scheme.error)))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("! {}", self.colorize(warning, self.color_scheme.warning)))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("✓ {}", self.colorize(message, self.color_scheme.success)))
    }
}
