//! Scripted transport for tests, benches and offline demos
//!
//! Behaviour is configured per request kind. Every call is recorded so tests
//! can assert on the URLs and payloads the engine produced.

use super::{SpeedTestTransport, TransferResponse};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Kind of request issued against the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Latency,
    Download,
    Upload,
}

/// Which calls (0-based, per request kind) fail
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FailurePattern {
    #[default]
    Never,
    Always,
    /// Every n-th call fails (n = 3 fails calls 2, 5, 8, ...)
    EveryNth(usize),
    /// Exactly these call indices fail
    Calls(Vec<usize>),
}

impl FailurePattern {
    pub fn fails(&self, call: usize) -> bool {
        match self {
            Self::Never => false,
            Self::Always => true,
            Self::EveryNth(0) => false,
            Self::EveryNth(n) => (call + 1) % n == 0,
            Self::Calls(calls) => calls.contains(&call),
        }
    }
}

/// How a failing call fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Transport error (connection refused and the like)
    Error,
    /// Response with this non-2xx status
    Status(u16),
    /// Request timeout
    Timeout,
}

/// Scripted behaviour for one request kind
#[derive(Debug, Clone)]
pub struct MockBehavior {
    /// Reported elapsed times, cycled by call index
    pub elapsed: Vec<Duration>,

    /// Status code of successful calls
    pub status_code: u16,

    /// Bytes reported for downloads; `None` echoes the requested `bytes=`
    pub bytes_override: Option<u64>,

    /// Real time each call waits before answering
    pub delay: Duration,

    pub failures: FailurePattern,
    pub failure_kind: FailureKind,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            elapsed: vec![Duration::from_millis(100)],
            status_code: 200,
            bytes_override: None,
            delay: Duration::ZERO,
            failures: FailurePattern::Never,
            failure_kind: FailureKind::Error,
        }
    }
}

impl MockBehavior {
    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed = vec![elapsed];
        self
    }

    pub fn with_elapsed_sequence(mut self, elapsed: Vec<Duration>) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self
    }

    pub fn with_bytes(mut self, bytes: u64) -> Self {
        self.bytes_override = Some(bytes);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_failures(mut self, failures: FailurePattern, kind: FailureKind) -> Self {
        self.failures = failures;
        self.failure_kind = kind;
        self
    }

    fn elapsed_for(&self, call: usize) -> Duration {
        if self.elapsed.is_empty() {
            Duration::ZERO
        } else {
            self.elapsed[call % self.elapsed.len()]
        }
    }
}

/// A request the mock received
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub kind: RequestKind,
    pub url: String,
    pub payload_len: usize,
}

/// Deterministic in-memory transport
#[derive(Debug, Default)]
pub struct MockTransport {
    latency: MockBehavior,
    download: MockBehavior,
    upload: MockBehavior,
    latency_calls: AtomicUsize,
    download_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, behavior: MockBehavior) -> Self {
        self.latency = behavior;
        self
    }

    pub fn with_download(mut self, behavior: MockBehavior) -> Self {
        self.download = behavior;
        self
    }

    pub fn with_upload(mut self, behavior: MockBehavior) -> Self {
        self.upload = behavior;
        self
    }

    /// All requests received so far, in arrival order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn request_count(&self, kind: RequestKind) -> usize {
        self.requests().iter().filter(|r| r.kind == kind).count()
    }

    /// Forget recorded requests and restart failure patterns
    pub fn reset(&self) {
        self.latency_calls.store(0, Ordering::SeqCst);
        self.download_calls.store(0, Ordering::SeqCst);
        self.upload_calls.store(0, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.clear();
        }
    }

    fn record(&self, kind: RequestKind, url: &str, payload_len: usize) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                kind,
                url: url.to_string(),
                payload_len,
            });
        }
    }

    async fn respond(&self, kind: RequestKind, url: &str, sent: Option<u64>) -> Result<TransferResponse> {
        let (behavior, counter) = match kind {
            RequestKind::Latency => (&self.latency, &self.latency_calls),
            RequestKind::Download => (&self.download, &self.download_calls),
            RequestKind::Upload => (&self.upload, &self.upload_calls),
        };
        let call = counter.fetch_add(1, Ordering::SeqCst);
        self.record(kind, url, sent.unwrap_or(0) as usize);

        if !behavior.delay.is_zero() {
            tokio::time::sleep(behavior.delay).await;
        }

        let elapsed = behavior.elapsed_for(call);
        if behavior.failures.fails(call) {
            return match behavior.failure_kind {
                FailureKind::Error => Err(AppError::network(format!("mock {:?} call {} refused", kind, call))),
                FailureKind::Timeout => Err(AppError::timeout(format!("mock {:?} call {} timed out", kind, call))),
                FailureKind::Status(code) => Ok(TransferResponse::new(code, 0, elapsed)),
            };
        }

        let bytes = match kind {
            RequestKind::Latency => 0,
            RequestKind::Download => behavior.bytes_override.unwrap_or_else(|| requested_bytes(url)),
            RequestKind::Upload => behavior.bytes_override.or(sent).unwrap_or(0),
        };

        Ok(TransferResponse::new(behavior.status_code, bytes, elapsed))
    }
}

/// The `bytes=` query value of a URL, 0 when absent
fn requested_bytes(url: &str) -> u64 {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "bytes")
                .and_then(|(_, v)| v.parse().ok())
        })
        .unwrap_or(0)
}

#[async_trait]
impl SpeedTestTransport for MockTransport {
    async fn probe_latency(&self, url: &str) -> Result<TransferResponse> {
        self.respond(RequestKind::Latency, url, None).await
    }

    async fn download(&self, url: &str) -> Result<TransferResponse> {
        self.respond(RequestKind::Download, url, None).await
    }

    async fn upload(&self, url: &str, payload: Vec<u8>) -> Result<TransferResponse> {
        self.respond(RequestKind::Upload, url, Some(payload.len() as u64)).await
    }
}
