//! Structured logging for the speed test engine and host
//!
//! This module provides:
//! - Structured logging with multiple levels and contexts
//! - Correlated operations (one correlation ID per run)
//! - A domain logger for stages, probes and transfers
//! - JSON structured output for integration with log aggregators
//!
//! All output goes to stderr so results printed on stdout stay parseable.

use crate::error::{AppError, Result};
use crate::models::{Config, LatencyReport, TransferReport};
use crate::types::{RunStatus, TestStage, TransferDirection};
use chrono::{DateTime, Utc};
use colored::{Color, Colorize};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    fn color(&self) -> Color {
        match self {
            LogLevel::Trace => Color::White,
            LogLevel::Debug => Color::Cyan,
            LogLevel::Info => Color::Green,
            LogLevel::Warn => Color::Yellow,
            LogLevel::Error => Color::Red,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(AppError::parse(format!("Invalid log level: {}", s))),
        }
    }
}

/// One structured log record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub component: String,
    pub message: String,

    /// Run the entry belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// Timestamped lines for a terminal
    Console,
    /// One JSON object per line
    Json,
    /// `HH:MM:SS L component: message`
    Compact,
}

/// Fields shared by every entry of one logger
#[derive(Debug, Default)]
struct LogContext {
    session_id: Option<String>,
    correlation_id: Option<String>,
    fields: BTreeMap<String, serde_json::Value>,
}

/// Structured logger writing to stderr
pub struct Logger {
    component: String,
    min_level: LogLevel,
    format: LogFormat,
    use_color: bool,
    include_location: bool,
    context: Arc<RwLock<LogContext>>,
}

impl Logger {
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_string(),
            min_level: LogLevel::Info,
            format: LogFormat::Console,
            use_color: false,
            include_location: false,
            context: Arc::new(RwLock::new(LogContext::default())),
        }
    }

    /// Level and format follow the host flags: `--debug` gives JSON at
    /// Debug with source locations, `--verbose` Info, otherwise Warn.
    pub fn with_config(component: &str, config: &Config) -> Self {
        let min_level = match (config.debug, config.verbose) {
            (true, _) => LogLevel::Debug,
            (false, true) => LogLevel::Info,
            (false, false) => LogLevel::Warn,
        };

        Self {
            min_level,
            format: if config.debug { LogFormat::Json } else { LogFormat::Console },
            use_color: config.enable_color,
            include_location: config.debug,
            ..Self::new(component)
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn level(&self) -> LogLevel {
        self.min_level
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    pub fn set_format(&mut self, format: LogFormat) {
        self.format = format;
    }

    pub fn set_color(&mut self, use_color: bool) {
        self.use_color = use_color;
    }

    pub async fn set_session_id(&self, session_id: &str) {
        self.context.write().await.session_id = Some(session_id.to_string());
    }

    /// Attach `key` to every later entry
    pub async fn add_context_field<T: Serialize>(&self, key: &str, value: T) {
        if let Ok(value) = serde_json::to_value(value) {
            self.context.write().await.fields.insert(key.to_string(), value);
        }
    }

    pub async fn current_correlation_id(&self) -> Option<String> {
        self.context.read().await.correlation_id.clone()
    }

    /// Open a correlated operation; entries logged until `end_operation`
    /// carry its ID
    pub async fn start_operation(&self, operation: &str) -> String {
        let correlation_id = Uuid::new_v4().to_string();
        self.context.write().await.correlation_id = Some(correlation_id.clone());

        self.debug(&format!("{} started", operation))
            .correlation_id(&correlation_id)
            .field("operation", operation)
            .log()
            .await;

        correlation_id
    }

    pub async fn end_operation(&self, correlation_id: &str, operation: &str, success: bool) {
        self.debug(&format!("{} ended", operation))
            .correlation_id(correlation_id)
            .field("operation", operation)
            .field("success", success)
            .log()
            .await;

        let mut context = self.context.write().await;
        if context.correlation_id.as_deref() == Some(correlation_id) {
            context.correlation_id = None;
        }
    }

    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, level, message)
    }

    pub fn trace(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Trace, message)
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    pub fn would_log(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    async fn write_entry(&self, mut entry: LogEntry) {
        if !self.would_log(entry.level) {
            return;
        }

        {
            let context = self.context.read().await;
            if let Some(session_id) = &context.session_id {
                entry.fields.insert("session_id".to_string(), session_id.clone().into());
            }
            if entry.correlation_id.is_none() {
                entry.correlation_id = context.correlation_id.clone();
            }
            for (key, value) in &context.fields {
                entry.fields.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }

        let line = self.render(&entry);
        // Logging never fails a run
        let _ = writeln!(io::stderr().lock(), "{}", line);
    }

    /// Render an entry in the logger's format
    pub fn render(&self, entry: &LogEntry) -> String {
        match self.format {
            LogFormat::Console => self.render_console(entry),
            LogFormat::Json => serde_json::to_string(entry)
                .unwrap_or_else(|e| format!("{{\"level\":\"error\",\"message\":\"unserializable log entry: {}\"}}", e)),
            LogFormat::Compact => format!(
                "{} {} {}: {}",
                entry.timestamp.format("%H:%M:%S"),
                &entry.level.as_str()[..1],
                entry.component,
                entry.message
            ),
        }
    }

    fn render_console(&self, entry: &LogEntry) -> String {
        let level = format!("{:>5}", entry.level.as_str());
        let level = if self.use_color {
            level.color(entry.level.color()).to_string()
        } else {
            level
        };

        let mut line = format!(
            "{} {} [{}] {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            level,
            entry.component,
            entry.message
        );

        if let Some(id) = &entry.correlation_id {
            line.push_str(&format!(" [{}]", id.get(..8).unwrap_or(id)));
        }
        for (key, value) in &entry.fields {
            line.push_str(&format!(" {}={}", key, value));
        }
        if self.include_location {
            if let Some(location) = &entry.location {
                line.push_str(&format!(" @ {}", location));
            }
        }

        line
    }
}

/// Collects fields for one entry; nothing is written until `log()`
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: &str) -> Self {
        Self {
            logger,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                component: logger.component.clone(),
                message: message.to_string(),
                correlation_id: None,
                fields: BTreeMap::new(),
                location: None,
            },
        }
    }

    pub fn correlation_id(mut self, id: &str) -> Self {
        self.entry.correlation_id = Some(id.to_string());
        self
    }

    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), value);
        }
        self
    }

    pub fn location(mut self, file: &str, line: u32) -> Self {
        self.entry.location = Some(format!("{}:{}", file, line));
        self
    }

    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_recoverable", error.is_recoverable())
            .field("error", error.message())
    }

    pub fn build(self) -> LogEntry {
        self.entry
    }

    pub async fn log(self) {
        self.logger.write_entry(self.entry).await;
    }
}

/// Domain logger for speed test runs
pub struct SpeedTestLogger {
    logger: Logger,
}

impl SpeedTestLogger {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    /// Warn-level console logger for engines built without a factory
    pub fn quiet() -> Self {
        let mut logger = Logger::new("ENGINE");
        logger.set_level(LogLevel::Warn);
        Self { logger }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Log the start of a run and return its correlation ID
    pub async fn log_run_started(&self, sizes_down: usize, sizes_up: usize, connections: u32) -> String {
        let correlation_id = self.logger.start_operation("speed_test").await;
        self.logger.info("Speed test run started")
            .correlation_id(&correlation_id)
            .field("download_sizes", sizes_down)
            .field("upload_sizes", sizes_up)
            .field("connections", connections)
            .log()
            .await;
        correlation_id
    }

    pub async fn log_run_finished(&self, correlation_id: &str, status: RunStatus, duration: Duration) {
        let level = match status {
            RunStatus::Completed | RunStatus::Cancelled => LogLevel::Info,
            RunStatus::Failed => LogLevel::Error,
        };
        self.logger.log(level, &format!("Speed test run {} in {:.2}s", status.as_str(), duration.as_secs_f64()))
            .correlation_id(correlation_id)
            .field("status", status.as_str())
            .field("duration_ms", duration.as_secs_f64() * 1000.0)
            .log()
            .await;
        self.logger.end_operation(correlation_id, "speed_test", status == RunStatus::Completed).await;
    }

    pub async fn log_stage_started(&self, stage: TestStage) {
        crate::log_info!(self.logger, "Stage started: {}", stage.label())
            .field("stage", stage.label())
            .log()
            .await;
    }

    pub async fn log_latency_report(&self, stage: &str, report: &LatencyReport) {
        self.logger.info(&format!(
            "{} latency: mean={:.1}ms jitter={:.1}ms loss={:.1}%",
            stage, report.mean_ms, report.jitter_ms, report.packet_loss_percent
        ))
            .field("stage", stage)
            .field("mean_ms", report.mean_ms)
            .field("jitter_ms", report.jitter_ms)
            .field("packet_loss_percent", report.packet_loss_percent)
            .field("attempts", report.attempts)
            .log()
            .await;
    }

    pub async fn log_transfer_report(&self, report: &TransferReport) {
        self.logger.info(&format!(
            "{} stage speed: {:.0} B/s over {} sizes",
            report.direction, report.speed_bps, report.per_size.len()
        ))
            .field("direction", report.direction)
            .field("speed_bps", report.speed_bps)
            .field("sizes", report.per_size.len())
            .log()
            .await;
    }

    /// Log one latency probe; failures are warnings
    pub async fn log_probe(&self, attempt: u32, rtt_ms: Option<f64>, failure: Option<&AppError>) {
        match (rtt_ms, failure) {
            (Some(rtt), _) => {
                self.logger.debug(&format!("Probe {} rtt={:.1}ms", attempt, rtt))
                    .field("attempt", attempt)
                    .field("rtt_ms", rtt)
                    .log()
                    .await;
            }
            (None, Some(error)) => {
                crate::log_warn!(self.logger, "Probe {} lost", attempt)
                    .field("attempt", attempt)
                    .error_info(error)
                    .log()
                    .await;
            }
            (None, None) => {
                self.logger.warn(&format!("Probe {} lost", attempt))
                    .field("attempt", attempt)
                    .log()
                    .await;
            }
        }
    }

    /// Log one connection of a transfer wave
    pub async fn log_connection(
        &self,
        direction: TransferDirection,
        size: u64,
        connection: u32,
        speed_bps: f64,
        failure: Option<&AppError>,
    ) {
        let mut builder = match failure {
            None => self.logger.debug(&format!(
                "{} {} bytes on connection {}: {:.0} B/s",
                direction, size, connection, speed_bps
            )),
            Some(error) => self.logger.warn(&format!(
                "{} {} bytes on connection {} failed",
                direction, size, connection
            )).error_info(error),
        };
        builder = builder
            .field("direction", direction)
            .field("size_bytes", size)
            .field("connection", connection)
            .field("speed_bps", speed_bps);
        builder.log().await;
    }

    /// Log an application error with context
    pub async fn log_error(&self, error: &AppError, context: Option<&str>) {
        let message = match context {
            Some(ctx) => format!("{}: {}", ctx, error),
            None => error.to_string(),
        };

        let mut builder = self.logger.error(&message).error_info(error);
        if let Some(ctx) = context {
            builder = builder.field("context", ctx);
        }
        builder.log().await;
    }
}

impl Default for SpeedTestLogger {
    fn default() -> Self {
        Self::quiet()
    }
}

/// Builds loggers sharing one session ID
pub struct LoggerFactory {
    config: Config,
    session_id: String,
}

impl LoggerFactory {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    /// Logger for `component`, tagged with the session ID and the
    /// configured network context
    pub async fn create_logger(&self, component: &str) -> Logger {
        let logger = Logger::with_config(component, &self.config);
        logger.set_session_id(&self.session_id).await;
        if let Some(network_type) = &self.config.network_type {
            logger.add_context_field("network_type", network_type).await;
        }
        if let Some(isp) = &self.config.isp_name {
            logger.add_context_field("isp", isp).await;
        }
        logger
    }

    /// Create the engine's domain logger
    pub async fn create_speed_test_logger(&self) -> SpeedTestLogger {
        SpeedTestLogger::new(self.create_logger("ENGINE").await)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// Entry builders stamped with the caller's source location. Finish them
/// with `.log().await`, adding `.field(..)` calls in between as needed.
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(&format!($($arg)*)).location(file!(), line!())
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.info(&format!($($arg)*)).location(file!(), line!())
    };
}

#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.warn(&format!($($arg)*)).location(file!(), line!())
    };
}
