//! Background load for measuring latency under a bulk transfer

use super::{latency::measure_latency, StageContext};
use crate::client::HttpUtils;
use crate::error::Result;
use crate::models::LatencyReport;
use crate::types::TransferDirection;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Pause between transfers of one load connection
const LOAD_REST: Duration = Duration::from_millis(5);

/// Transfers completed by the load connections
#[derive(Debug, Default)]
struct LoadStats {
    transfers: AtomicU64,
    failures: AtomicU64,
}

impl LoadStats {
    fn record(&self, success: bool) {
        if success {
            self.transfers.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Probe latency while `concurrent_connections` tasks repeatedly transfer the
/// largest configured payload in `direction`. The load stops as soon as the
/// probes finish, and never feeds the live speed metrics.
pub(crate) async fn measure_under_load(
    ctx: &StageContext,
    direction: TransferDirection,
    range: (f64, f64),
) -> Result<LatencyReport> {
    let label = match direction {
        TransferDirection::Download => "Loaded (download)",
        TransferDirection::Upload => "Loaded (upload)",
    };
    let largest = match direction {
        TransferDirection::Download => ctx.config.download_sizes.iter().max(),
        TransferDirection::Upload => ctx.config.upload_sizes.iter().max(),
    };
    let Some(&size) = largest else {
        return measure_latency(ctx, label, range).await;
    };

    let stop = ctx.signal.child();
    let load_ctx = ctx.with_signal(stop.clone());
    let stats = Arc::new(LoadStats::default());
    let payload = match direction {
        TransferDirection::Download => None,
        TransferDirection::Upload => Some(HttpUtils::random_payload(size)),
    };

    // Dropping the set aborts the load if this stage is abandoned
    let mut load = JoinSet::new();
    for _ in 0..ctx.config.concurrent_connections {
        load.spawn(load_connection(load_ctx.clone(), size, payload.clone(), Arc::clone(&stats)));
    }

    let report = measure_latency(ctx, label, range).await;

    stop.cancel();
    while load.join_next().await.is_some() {}

    crate::log_debug!(ctx.logger.logger(), "{} load stopped", direction)
        .field("direction", direction)
        .field("transfers", stats.transfers.load(Ordering::Relaxed))
        .field("failures", stats.failures.load(Ordering::Relaxed))
        .log()
        .await;

    report
}

async fn load_connection(ctx: StageContext, size: u64, payload: Option<Vec<u8>>, stats: Arc<LoadStats>) {
    while !ctx.signal.is_cancelled() {
        let outcome = match &payload {
            Some(body) => {
                ctx.signal
                    .run_or_cancel(ctx.transport.upload(&ctx.config.upload_url, body.clone()))
                    .await
            }
            None => match HttpUtils::download_url(&ctx.config.download_url, size) {
                Ok(url) => ctx.signal.run_or_cancel(ctx.transport.download(&url)).await,
                Err(e) => Err(e),
            },
        };

        match outcome {
            Ok(response) => stats.record(response.is_success()),
            Err(e) if e.is_cancellation() => break,
            Err(_) => stats.record(false),
        }

        if ctx.signal.sleep(LOAD_REST).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockBehavior, MockTransport, RequestKind};
    use crate::engine::test_support::context;

    #[tokio::test(start_paused = true)]
    async fn test_probes_run_alongside_download_load() {
        let mock = MockTransport::new()
            .with_latency(MockBehavior::default().with_elapsed(Duration::from_millis(80)))
            .with_download(MockBehavior::default().with_delay(Duration::from_millis(50)));
        let (ctx, mock) = context(mock, |c| {
            c.latency_samples = 4;
            c.concurrent_connections = 2;
            c.download_sizes = vec![1_000, 9_000];
        });

        let report = measure_under_load(&ctx, TransferDirection::Download, (0.90, 0.95))
            .await
            .unwrap();

        assert_eq!(report.mean_ms, 80.0);
        assert_eq!(mock.request_count(RequestKind::Latency), 4);

        let downloads: Vec<_> = mock
            .requests()
            .into_iter()
            .filter(|r| r.kind == RequestKind::Download)
            .collect();
        assert!(downloads.len() >= 2);
        assert!(downloads.iter().all(|r| r.url.contains("bytes=9000")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_stops_with_probes() {
        let mock = MockTransport::new().with_upload(MockBehavior::default().with_delay(Duration::from_millis(20)));
        let (ctx, mock) = context(mock, |c| {
            c.latency_samples = 2;
            c.concurrent_connections = 1;
            c.upload_sizes = vec![4_096];
        });

        measure_under_load(&ctx, TransferDirection::Upload, (0.95, 1.0)).await.unwrap();
        let uploads = mock.request_count(RequestKind::Upload);
        assert!(uploads >= 1);
        assert!(mock.requests().iter().filter(|r| r.kind == RequestKind::Upload).all(|r| r.payload_len == 4_096));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(mock.request_count(RequestKind::Upload), uploads);
        assert!(!ctx.signal.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_sizes_means_no_load() {
        let (ctx, mock) = context(MockTransport::new(), |c| {
            c.latency_samples = 2;
            c.download_sizes = Vec::new();
        });

        measure_under_load(&ctx, TransferDirection::Download, (0.90, 0.95)).await.unwrap();
        assert_eq!(mock.request_count(RequestKind::Download), 0);
        assert_eq!(mock.request_count(RequestKind::Latency), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_stage_stops_load() {
        let mock = MockTransport::new().with_download(MockBehavior::default().with_delay(Duration::from_millis(20)));
        let (ctx, mock) = context(mock, |c| {
            c.latency_samples = 20;
            c.concurrent_connections = 2;
        });

        let stage = measure_under_load(&ctx, TransferDirection::Download, (0.90, 0.95));
        assert!(tokio::time::timeout(Duration::from_millis(500), stage).await.is_err());
        tokio::time::sleep(Duration::from_millis(50)).await;
        let downloads = mock.request_count(RequestKind::Download);
        assert!(downloads >= 2);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(mock.request_count(RequestKind::Download), downloads);
    }
}
