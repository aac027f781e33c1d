//! HTTP transport for speed test requests and timing measurements

pub mod mock;


pub use mock::{FailureKind, FailurePattern, MockBehavior, MockTransport, RecordedRequest, RequestKind};

use crate::{
    error::{AppError, Result},
    models::TestConfiguration,
};
use async_trait::async_trait;
use futures::StreamExt;
use rand::{Rng, RngCore};
use reqwest::{header, Client, Url};
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// Transport seam between the engine and the network.
///
/// Implementations own request timing: `elapsed` is wall-clock from dispatch
/// until the full response has been received.
#[async_trait]
pub trait SpeedTestTransport: Send + Sync {
    /// Minimal request used to sample round-trip time
    async fn probe_latency(&self, url: &str) -> Result<TransferResponse>;

    /// Download the body at `url`, counting received bytes
    async fn download(&self, url: &str) -> Result<TransferResponse>;

    /// Post `payload` to `url`
    async fn upload(&self, url: &str, payload: Vec<u8>) -> Result<TransferResponse>;
}

/// Outcome of a single transport request
#[derive(Debug, Clone, PartialEq)]
pub struct TransferResponse {
    pub status_code: u16,

    /// Bytes received (download, probe) or sent (upload)
    pub bytes: u64,

    pub elapsed: Duration,
}

impl TransferResponse {
    pub fn new(status_code: u16, bytes: u64, elapsed: Duration) -> Self {
        Self {
            status_code,
            bytes,
            elapsed,
        }
    }

    /// Check if the response indicates success
    pub fn is_success(&self) -> bool {
        self.status_code >= 200 && self.status_code < 300
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }
}

/// reqwest-backed transport sharing one connection pool
pub struct ReqwestTransport {
    client: Client,
    request_timeout: Duration,
}

impl ReqwestTransport {
    /// Create a transport with the configuration's timeout and User-Agent
    pub fn new(config: &TestConfiguration) -> Result<Self> {
        Self::with_timeout(config.request_timeout(), &config.user_agent)
    }

    /// Create a transport with an explicit timeout and User-Agent
    pub fn with_timeout(request_timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| AppError::network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            request_timeout,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    async fn timed<F>(&self, what: &str, request: F) -> Result<TransferResponse>
    where
        F: std::future::Future<Output = Result<(u16, u64)>>,
    {
        let start = Instant::now();
        let (status_code, bytes) = timeout(self.request_timeout, request)
            .await
            .map_err(|_| {
                AppError::timeout(format!(
                    "{} timed out after {}s",
                    what,
                    self.request_timeout.as_secs()
                ))
            })??;

        Ok(TransferResponse::new(status_code, bytes, start.elapsed()))
    }
}

#[async_trait]
impl SpeedTestTransport for ReqwestTransport {
    async fn probe_latency(&self, url: &str) -> Result<TransferResponse> {
        let request = async {
            let response = self
                .client
                .head(url)
                .header(header::CACHE_CONTROL, "no-cache")
                .header(header::PRAGMA, "no-cache")
                .send()
                .await?;
            let status = response.status().as_u16();
            let body = response.bytes().await?;
            Ok::<_, AppError>((status, body.len() as u64))
        };

        self.timed("Latency probe", request).await
    }

    async fn download(&self, url: &str) -> Result<TransferResponse> {
        let request = async {
            let response = self.client.get(url).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Ok::<_, AppError>((status.as_u16(), 0));
            }

            let mut received: u64 = 0;
            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| AppError::network(format!("Download stream error: {}", e)))?;
                received += chunk.len() as u64;
            }
            Ok::<_, AppError>((status.as_u16(), received))
        };

        self.timed("Download", request).await
    }

    async fn upload(&self, url: &str, payload: Vec<u8>) -> Result<TransferResponse> {
        let size = payload.len() as u64;
        let request = async {
            let response = self
                .client
                .post(url)
                .header(header::CONTENT_TYPE, "application/octet-stream")
                .body(payload)
                .send()
                .await?;
            let status = response.status().as_u16();
            // Drain so the timing covers the full response
            let _ = response.bytes().await?;
            Ok::<_, AppError>((status, size))
        };

        self.timed("Upload", request).await
    }
}

/// URL and payload helpers for speed test requests
pub struct HttpUtils;

impl HttpUtils {
    /// Random cache-busting value
    pub fn cache_buster() -> String {
        rand::thread_rng().gen::<u64>().to_string()
    }

    /// `{base}?bytes={size}&r={random}`
    pub fn download_url(base: &str, size: u64) -> Result<String> {
        Self::with_query(base, &[("bytes", size.to_string()), ("r", Self::cache_buster())])
    }

    /// `{base}?bytes=0&r={random}`
    pub fn latency_url(base: &str) -> Result<String> {
        Self::with_query(base, &[("bytes", "0".to_string()), ("r", Self::cache_buster())])
    }

    /// Append query pairs, keeping any already present
    pub fn with_query(base: &str, pairs: &[(&str, String)]) -> Result<String> {
        let mut url = Url::parse(base)?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in pairs {
                query.append_pair(key, value);
            }
        }
        Ok(url.to_string())
    }

    /// `size` random bytes for an upload body
    pub fn random_payload(size: u64) -> Vec<u8> {
        let mut payload = vec![0u8; size as usize];
        rand::thread_rng().fill_bytes(&mut payload);
        payload
    }
}
