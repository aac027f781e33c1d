//! Core formatting traits and implementations
//!
//! This module defines the output formatting interface and provides
//! a plain text implementation with table formatting capabilities.

use super::units::{format_data_usage, format_latency, format_percentage, format_speed};
use crate::{
    error::{AppError, Result},
    models::{LiveMetrics, SpeedTestRecord, TestResult, TransferReport},
    stats::aim::AimScores,
};
use std::fmt::Write as _;

/// Main trait for output formatting
pub trait OutputFormatter: Send + Sync {
    /// Format a header section
    fn format_header(&self, title: &str) -> Result<String>;

    /// Headline figures of a run plus the network it ran on
    fn format_summary(&self, record: &SpeedTestRecord) -> Result<String>;

    /// Loaded latency figures, marking estimated values
    fn format_loaded_latency(&self, result: &TestResult) -> Result<String>;

    fn format_aim_scores(&self, scores: &AimScores) -> Result<String>;

    /// Per-size breakdown of a transfer stage
    fn format_transfer_breakdown(&self, report: &TransferReport) -> Result<String>;

    /// One-line live progress display
    fn format_progress(&self, metrics: &LiveMetrics) -> String;

    /// Format error messages
    fn format_error(&self, error: &str) -> Result<String>;

    /// Format warning messages
    fn format_warning(&self, warning: &str) -> Result<String>;

    /// Format success messages
    fn format_success(&self, message: &str) -> Result<String>;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    /// Enable colored output
    pub enable_color: bool,
    /// Enable verbose mode with the per-size breakdown
    pub verbose_mode: bool,
    /// Show speeds in bits per second instead of bytes per second
    pub use_bits: bool,
    /// Show table borders
    pub table_borders: bool,
    /// Maximum output width
    pub max_width: usize,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            use_bits: true,
            table_borders: true,
            max_width: 120,
        }
    }
}

/// Table formatting configuration
#[derive(Debug, Clone)]
pub struct TableFormat {
    /// Column definitions
    pub columns: Vec<Column>,
    /// Show borders around table
    pub show_borders: bool,
    /// Show header row
    pub show_header: bool,
    /// Minimum column width
    pub min_column_width: usize,
    /// Maximum column width
    pub max_column_width: usize,
}

/// Column definition for table formatting
#[derive(Debug, Clone)]
pub struct Column {
    pub header: String,
    pub alignment: Alignment,
    pub min_width: usize,
    pub max_width: usize,
}

impl Column {
    pub fn new(header: &str, alignment: Alignment, min_width: usize, max_width: usize) -> Self {
        Self {
            header: header.to_string(),
            alignment,
            min_width,
            max_width,
        }
    }
}

/// Text alignment options
#[derive(Debug, Clone)]
pub enum Alignment {
    Left,
    Right,
    Center,
}

/// Row data for table formatting
pub type RowData = Vec<String>;

pub(crate) fn write_err(e: std::fmt::Error) -> AppError {
    AppError::io(format!("Failed to format output: {}", e))
}

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    /// Create a new plain formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FormattingOptions {
        &self.options
    }

    pub(crate) fn speed(&self, bytes_per_sec: f64) -> String {
        format_speed(bytes_per_sec, self.options.use_bits)
    }

    /// Rows of the per-size table: size, successful connections, mean speed, slowest/fastest
    pub(crate) fn breakdown_rows(&self, report: &TransferReport) -> Vec<RowData> {
        report
            .per_size
            .iter()
            .map(|measurement| {
                let speeds = &measurement.connection_speeds_bps;
                let fastest = speeds.iter().copied().fold(0.0_f64, f64::max);
                let slowest = speeds.iter().copied().filter(|&s| s > 0.0).fold(f64::INFINITY, f64::min);
                let range = if slowest.is_finite() {
                    format!("{} / {}", self.speed(slowest), self.speed(fastest))
                } else {
                    "N/A".to_string()
                };

                vec![
                    format_data_usage(measurement.size_bytes as f64),
                    format!("{}/{}", measurement.successful_connections(), speeds.len()),
                    measurement.mean_bps.map(|m| self.speed(m)).unwrap_or_else(|| "failed".to_string()),
                    range,
                ]
            })
            .collect()
    }

    pub(crate) fn breakdown_format(&self) -> TableFormat {
        TableFormat {
            columns: vec![
                Column::new("Size", Alignment::Right, 8, 12),
                Column::new("Connections", Alignment::Center, 11, 11),
                Column::new("Mean", Alignment::Right, 12, 14),
                Column::new("Slowest / Fastest", Alignment::Right, 17, 30),
            ],
            show_borders: self.options.table_borders,
            show_header: true,
            min_column_width: 8,
            max_column_width: 40,
        }
    }

    /// Create a table with the given format and data
    pub(crate) fn create_table(&self, format: &TableFormat, rows: &[RowData]) -> Result<String> {
        if rows.is_empty() {
            return Ok(String::new());
        }

        let column_widths = self.calculate_column_widths(format, rows);
        let mut output = String::new();

        if format.show_header && !format.columns.is_empty() {
            if format.show_borders {
                writeln!(output, "{}", self.create_horizontal_border(&column_widths)).map_err(write_err)?;
            }

            let headers: Vec<String> = format.columns.iter().map(|c| c.header.clone()).collect();
            writeln!(output, "{}", self.create_row(&headers, &column_widths, format)).map_err(write_err)?;

            if format.show_borders {
                writeln!(output, "{}", self.create_horizontal_border(&column_widths)).map_err(write_err)?;
            }
        }

        for row in rows {
            writeln!(output, "{}", self.create_row(row, &column_widths, format)).map_err(write_err)?;
        }

        if format.show_borders {
            output.push_str(&self.create_horizontal_border(&column_widths));
        }

        Ok(output)
    }

    /// Calculate optimal column widths
    fn calculate_column_widths(&self, format: &TableFormat, rows: &[RowData]) -> Vec<usize> {
        let num_columns = format
            .columns
            .len()
            .max(rows.iter().map(|r| r.len()).max().unwrap_or(0));

        (0..num_columns)
            .map(|col_idx| {
                let column = format.columns.get(col_idx);
                let mut width = column
                    .map(|c| c.min_width.max(c.header.chars().count()))
                    .unwrap_or(format.min_column_width);

                for row in rows {
                    if let Some(cell) = row.get(col_idx) {
                        width = width.max(cell.chars().count());
                    }
                }

                width.min(column.map(|c| c.max_width).unwrap_or(format.max_column_width))
            })
            .collect()
    }

    /// Create a table row
    fn create_row(&self, data: &[String], widths: &[usize], format: &TableFormat) -> String {
        let mut row = String::new();

        if format.show_borders {
            row.push('|');
        }

        for (idx, (cell, &width)) in data.iter().zip(widths.iter()).enumerate() {
            let alignment = format.columns.get(idx).map(|c| &c.alignment).unwrap_or(&Alignment::Left);
            let padded_cell = align_text(cell, width, alignment);

            if format.show_borders {
                row.push(' ');
                row.push_str(&padded_cell);
                row.push_str(" |");
            } else {
                row.push_str(&padded_cell);
                row.push_str("  ");
            }
        }

        row.trim_end().to_string()
    }

    /// Create horizontal border for table
    fn create_horizontal_border(&self, widths: &[usize]) -> String {
        let mut border = String::new();

        if !widths.is_empty() {
            border.push('+');
            for &width in widths {
                border.push_str(&"-".repeat(width + 2));
                border.push('+');
            }
        }

        border
    }
}

/// Align text within specified width
pub(crate) fn align_text(text: &str, width: usize, alignment: &Alignment) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.chars().take(width).collect();
    }

    let padding = width - len;
    match alignment {
        Alignment::Left => format!("{}{}", text, " ".repeat(padding)),
        Alignment::Right => format!("{}{}", " ".repeat(padding), text),
        Alignment::Center => {
            let left_pad = padding / 2;
            let right_pad = padding - left_pad;
            format!("{}{}{}", " ".repeat(left_pad), text, " ".repeat(right_pad))
        }
    }
}

/// Text progress bar of `width` cells for a progress in [0, 1]
pub(crate) fn progress_bar(progress: f64, width: usize, filled: char, empty: char) -> String {
    let cells = ((progress.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    let mut bar = String::with_capacity(width + 2);
    bar.push('[');
    bar.extend(std::iter::repeat(filled).take(cells));
    bar.extend(std::iter::repeat(empty).take(width - cells));
    bar.push(']');
    bar
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "=".repeat(title.len() + 4);

        writeln!(output, "{}", border).map_err(write_err)?;
        writeln!(output, "  {}  ", title).map_err(write_err)?;
        write!(output, "{}", border).map_err(write_err)?;

        Ok(output)
    }

    fn format_summary(&self, record: &SpeedTestRecord) -> Result<String> {
        let result = &record.result;
        let mut output = String::new();

        writeln!(output, "Summary:").map_err(write_err)?;
        writeln!(output, "--------").map_err(write_err)?;
        writeln!(output, "Download:     {}", self.speed(result.download_speed_bps)).map_err(write_err)?;
        writeln!(output, "Upload:       {}", self.speed(result.upload_speed_bps)).map_err(write_err)?;
        writeln!(output, "Latency:      {}", format_latency(result.latency_ms)).map_err(write_err)?;
        writeln!(output, "Jitter:       {}", format_latency(result.jitter_ms)).map_err(write_err)?;
        writeln!(output, "Packet Loss:  {}", format_percentage(result.packet_loss_percent)).map_err(write_err)?;
        writeln!(output, "Network:      {}", record.network.network_type_or_unknown()).map_err(write_err)?;
        writeln!(output, "ISP:          {}", record.network.isp_name_or_unknown()).map_err(write_err)?;
        write!(output, "Tested at:    {}", record.timestamp.format("%Y-%m-%d %H:%M:%S UTC")).map_err(write_err)?;

        Ok(output)
    }

    fn format_loaded_latency(&self, result: &TestResult) -> Result<String> {
        let mut output = String::new();

        writeln!(output, "Loaded Latency ({}):", result.loaded_latency_mode).map_err(write_err)?;
        writeln!(output, "---------------").map_err(write_err)?;
        writeln!(
            output,
            "Download:     {} (jitter {})",
            format_latency(result.loaded_download_latency_ms),
            format_latency(result.loaded_download_jitter_ms)
        )
        .map_err(write_err)?;
        write!(
            output,
            "Upload:       {} (jitter {})",
            format_latency(result.loaded_upload_latency_ms),
            format_latency(result.loaded_upload_jitter_ms)
        )
        .map_err(write_err)?;
        if result.loaded_upload_is_estimated() {
            write!(output, " *estimated").map_err(write_err)?;
        }

        Ok(output)
    }

    fn format_aim_scores(&self, scores: &AimScores) -> Result<String> {
        let mut output = String::new();

        writeln!(output, "AIM Scores:").map_err(write_err)?;
        writeln!(output, "-----------").map_err(write_err)?;
        writeln!(output, "Streaming:    {}", scores.streaming).map_err(write_err)?;
        writeln!(output, "Gaming:       {}", scores.gaming).map_err(write_err)?;
        writeln!(output, "Video Calls:  {}", scores.rtc).map_err(write_err)?;
        write!(output, "Overall:      {}", scores.overall()).map_err(write_err)?;

        Ok(output)
    }

    fn format_transfer_breakdown(&self, report: &TransferReport) -> Result<String> {
        let mut output = String::new();
        let title = format!("{} breakdown:", capitalize(&report.direction.to_string()));

        writeln!(output, "{}", title).map_err(write_err)?;
        if report.per_size.is_empty() {
            write!(output, "No {} sizes configured.", report.direction).map_err(write_err)?;
            return Ok(output);
        }

        output.push_str(&self.create_table(&self.breakdown_format(), &self.breakdown_rows(report))?);
        Ok(output)
    }

    fn format_progress(&self, metrics: &LiveMetrics) -> String {
        format!(
            "{} {:>3.0}% {:<26} | down {} | up {} | {}",
            progress_bar(metrics.progress, 20, '#', '-'),
            metrics.progress * 100.0,
            metrics.stage.label(),
            self.speed(metrics.download_bps),
            self.speed(metrics.upload_bps),
            format_latency(metrics.latency_ms)
        )
    }

    fn format_error(&self, error: &str) -> Result<String> {
        Ok(format!("ERROR: {}", error))
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("WARNING: {}", warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("SUCCESS: {}", message))
    }
}

pub(crate) fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
