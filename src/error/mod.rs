//! Error handling for the network speed tester

use colored::{Color, Colorize};
use thiserror::Error;

/// Everything that can go wrong in a speed test or its host
#[derive(Error, Debug)]
pub enum AppError {
    /// Bad configuration values, from any source
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection refused, reset or unreachable
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP request error: {0}")]
    HttpRequest(String),

    /// Server answered with a non-success status
    #[error("HTTP status error: {0}")]
    HttpStatus(String),

    /// A request exceeded the configured timeout
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Invalid command-line input
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(String),

    /// Malformed sizes, URLs, JSON or log levels
    #[error("Parsing error: {0}")]
    Parse(String),

    /// A run was requested while another one is in progress
    #[error("Engine busy: {0}")]
    Busy(String),

    /// The current run was cancelled. Used to unwind stages; `run_test`
    /// reports cancellation as `RunOutcome::Cancelled` instead.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// A stage could not run at all
    #[error("Test execution error: {0}")]
    TestExecution(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network(message.into())
    }

    pub fn http_request<S: Into<String>>(message: S) -> Self {
        Self::HttpRequest(message.into())
    }

    pub fn http_status<S: Into<String>>(message: S) -> Self {
        Self::HttpStatus(message.into())
    }

    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout(message.into())
    }

    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io(message.into())
    }

    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse(message.into())
    }

    /// Another run holds the engine
    pub fn busy<S: Into<String>>(message: S) -> Self {
        Self::Busy(message.into())
    }

    /// Marker used to unwind a cancelled run
    pub fn cancelled<S: Into<String>>(message: S) -> Self {
        Self::Cancelled(message.into())
    }

    pub fn test_execution<S: Into<String>>(message: S) -> Self {
        Self::TestExecution(message.into())
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::Network(_) => "NETWORK",
            Self::HttpRequest(_) => "HTTP",
            Self::HttpStatus(_) => "STATUS",
            Self::Timeout(_) => "TIMEOUT",
            Self::Validation(_) => "VALIDATION",
            Self::Io(_) => "IO",
            Self::Parse(_) => "PARSE",
            Self::Busy(_) => "BUSY",
            Self::Cancelled(_) => "CANCELLED",
            Self::TestExecution(_) => "TEST",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// The message without the category prefix
    pub fn message(&self) -> &str {
        match self {
            Self::Config(m)
            | Self::Network(m)
            | Self::HttpRequest(m)
            | Self::HttpStatus(m)
            | Self::Timeout(m)
            | Self::Validation(m)
            | Self::Io(m)
            | Self::Parse(m)
            | Self::Busy(m)
            | Self::Cancelled(m)
            | Self::TestExecution(m)
            | Self::Internal(m) => m,
        }
    }

    /// Same kind of error with `context` prepended to the message
    pub fn prefixed(self, context: &str) -> Self {
        let message = format!("{}: {}", context, self.message());
        match self {
            Self::Config(_) => Self::Config(message),
            Self::Network(_) => Self::Network(message),
            Self::HttpRequest(_) => Self::HttpRequest(message),
            Self::HttpStatus(_) => Self::HttpStatus(message),
            Self::Timeout(_) => Self::Timeout(message),
            Self::Validation(_) => Self::Validation(message),
            Self::Io(_) => Self::Io(message),
            Self::Parse(_) => Self::Parse(message),
            Self::Busy(_) => Self::Busy(message),
            Self::Cancelled(_) => Self::Cancelled(message),
            Self::TestExecution(_) => Self::TestExecution(message),
            Self::Internal(_) => Self::Internal(message),
        }
    }

    /// Whether running the test again may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::HttpRequest(_) | Self::HttpStatus(_) | Self::Timeout(_) | Self::Busy(_) | Self::Cancelled(_)
        )
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// What the user can do about it
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Config(_) => Some("Check your .env file or command line arguments."),
            Self::Network(_) => Some("Check your internet connection and try again."),
            Self::HttpRequest(_) => {
                Some("The speed test server may be down or blocking requests. Try a different endpoint.")
            }
            Self::HttpStatus(_) => Some("Check the endpoint URLs and payload sizes accepted by the server."),
            Self::Timeout(_) => Some("Increase the timeout value using --timeout or use smaller payload sizes."),
            Self::Validation(_) => Some("Check the format of your URLs, sizes, or other configuration values."),
            Self::Io(_) => Some("Check file permissions and disk space."),
            Self::Parse(_) => Some("Check the format of your input data or configuration files."),
            Self::Busy(_) => Some("Wait for the running test to finish or cancel it first."),
            Self::Cancelled(_) => None,
            Self::TestExecution(_) => Some("This may be a temporary issue. Try running the test again."),
            Self::Internal(_) => Some("This is likely a bug. Please report it with the error details."),
        }
    }

    /// Error text followed by the suggestion, if any
    pub fn user_friendly_message(&self) -> String {
        match self.suggestion() {
            Some(hint) => format!("{}\n\nSuggestion: {}", self, hint),
            None => self.to_string(),
        }
    }

    /// Get exit code for this error type
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => 1,
            Self::Network(_) | Self::HttpRequest(_) | Self::HttpStatus(_) => 2,
            Self::Timeout(_) => 3,
            Self::Io(_) => 5,
            Self::TestExecution(_) | Self::Busy(_) => 6,
            Self::Cancelled(_) => 130,
            Self::Internal(_) => 99,
        }
    }

    fn console_color(&self) -> Color {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => Color::Red,
            Self::Network(_) | Self::HttpRequest(_) | Self::HttpStatus(_) => Color::Yellow,
            Self::Timeout(_) => Color::Blue,
            Self::Busy(_) | Self::Cancelled(_) => Color::Magenta,
            Self::Io(_) | Self::TestExecution(_) => Color::Cyan,
            Self::Internal(_) => Color::BrightRed,
        }
    }

    /// `[CATEGORY] message`, colored by category when `use_color` is set
    pub fn format_for_console(&self, use_color: bool) -> String {
        if !use_color {
            return format!("[{}] {}", self.category(), self);
        }
        let color = self.console_color();
        format!(
            "[{}] {}",
            self.category().color(color).bold(),
            self.to_string().color(color)
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(error: url::ParseError) -> Self {
        Self::parse(format!("URL parse error: {}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {}", error))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::timeout(error.to_string())
        } else if error.is_connect() || error.is_request() {
            Self::network(error.to_string())
        } else if let Some(status) = error.status() {
            Self::http_status(format!("{}: {}", status, error))
        } else {
            Self::http_request(error.to_string())
        }
    }
}

impl From<dotenv::Error> for AppError {
    fn from(error: dotenv::Error) -> Self {
        Self::config(format!("Environment file error: {}", error))
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::parse(format!("Integer parse error: {}", error))
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(error: tokio::task::JoinError) -> Self {
        if error.is_cancelled() {
            Self::cancelled("task aborted")
        } else {
            Self::internal(format!("Task panicked: {}", error))
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::internal(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Prepend context to an error while keeping its category
pub trait ErrorContext<T> {
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    fn context(self, message: &'static str) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<AppError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().prefixed(&f()))
    }

    fn context(self, message: &'static str) -> Result<T> {
        self.with_context(|| message.to_string())
    }
}

/// Error reporter for user feedback in the host application
pub struct ErrorReporter {
    pub use_color: bool,
    pub verbose: bool,
}

impl ErrorReporter {
    /// Create a new error reporter
    pub fn new(use_color: bool, verbose: bool) -> Self {
        Self { use_color, verbose }
    }

    /// Render an error report without printing it
    pub fn render(&self, error: &AppError) -> String {
        let mut report = error.format_for_console(self.use_color);

        if self.verbose {
            report.push_str("\n\n");
            report.push_str(&error.user_friendly_message());

            if error.is_recoverable() {
                report.push_str("\n\n");
                let hint = "This error might be temporary. You can try running the test again.";
                if self.use_color {
                    report.push_str(&hint.green().to_string());
                } else {
                    report.push_str(hint);
                }
            }
        }

        report
    }

    /// Report an error to the user
    pub fn report_error(&self, error: &AppError) {
        eprintln!("{}", self.render(error));
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}
