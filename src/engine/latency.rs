//! Latency stage: sequential HEAD probes with running statistics

use super::StageContext;
use crate::client::HttpUtils;
use crate::error::{AppError, Result};
use crate::models::LatencyReport;
use crate::stats::{duration_ms, RollingLatencyStats};

/// Probe the latency endpoint `latency_samples` times.
///
/// Lost probes (transport error, timeout, non-2xx) count towards packet loss
/// and never end the stage. Live latency, jitter and loss are published after
/// every probe; progress moves linearly across `range`.
pub(crate) async fn measure_latency(ctx: &StageContext, label: &str, range: (f64, f64)) -> Result<LatencyReport> {
    let attempts = ctx.config.latency_samples;
    let interval = ctx.config.latency_interval();
    let (start, end) = range;

    let mut rolling = RollingLatencyStats::new();
    let mut samples = Vec::with_capacity(attempts as usize);

    for attempt in 1..=attempts {
        ctx.signal.check()?;

        let url = HttpUtils::latency_url(&ctx.config.latency_url)?;
        match ctx.signal.run_or_cancel(ctx.transport.probe_latency(&url)).await {
            Ok(response) if response.is_success() => {
                let rtt = duration_ms(response.elapsed);
                rolling.add_sample(rtt);
                samples.push(rtt);
                ctx.logger.log_probe(attempt, Some(rtt), None).await;
            }
            Ok(response) => {
                rolling.add_loss();
                let error = AppError::http_status(format!("Latency probe returned HTTP {}", response.status_code));
                ctx.logger.log_probe(attempt, None, Some(&error)).await;
            }
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => {
                rolling.add_loss();
                ctx.logger.log_probe(attempt, None, Some(&e)).await;
            }
        }

        ctx.store.record_latency(rolling.average(), rolling.jitter(), rolling.loss_percent());
        ctx.store.advance(start + (end - start) * f64::from(attempt) / f64::from(attempts));

        if attempt < attempts {
            ctx.signal.sleep(interval).await?;
        }
    }

    let report = LatencyReport::from_samples(attempts, samples);
    ctx.logger.log_latency_report(label, &report).await;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{FailureKind, FailurePattern, MockBehavior, MockTransport, RequestKind};
    use crate::engine::test_support::context;
    use std::time::Duration;

    fn probes(millis: &[u64]) -> MockBehavior {
        MockBehavior::default().with_elapsed_sequence(millis.iter().map(|&m| Duration::from_millis(m)).collect())
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_statistics() {
        let mock = MockTransport::new().with_latency(probes(&[10, 20, 30, 40]));
        let (ctx, mock) = context(mock, |c| c.latency_samples = 4);

        let report = measure_latency(&ctx, "Unloaded", (0.0, 0.1)).await.unwrap();

        assert_eq!(report.attempts, 4);
        assert_eq!(report.samples_ms, vec![10.0, 20.0, 30.0, 40.0]);
        assert_eq!(report.mean_ms, 25.0);
        assert!((report.jitter_ms - 125f64.sqrt()).abs() < 1e-9);
        assert_eq!(report.packet_loss_percent, 0.0);
        assert_eq!(mock.request_count(RequestKind::Latency), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_probes_count_as_loss() {
        let mock = MockTransport::new().with_latency(
            probes(&[50]).with_failures(FailurePattern::Calls(vec![1, 3]), FailureKind::Status(503)),
        );
        let (ctx, _) = context(mock, |c| c.latency_samples = 4);

        let report = measure_latency(&ctx, "Unloaded", (0.0, 0.1)).await.unwrap();
        assert_eq!(report.success_count(), 2);
        assert_eq!(report.packet_loss_percent, 50.0);
        assert_eq!(report.jitter_ms, 0.0);

        let metrics = ctx.store.snapshot();
        assert_eq!(metrics.packet_loss_percent, 50.0);
        assert_eq!(metrics.latency_ms, 50.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_probes_lost() {
        let mock = MockTransport::new()
            .with_latency(MockBehavior::default().with_failures(FailurePattern::Always, FailureKind::Timeout));
        let (ctx, _) = context(mock, |c| c.latency_samples = 3);

        let report = measure_latency(&ctx, "Unloaded", (0.0, 0.1)).await.unwrap();
        assert_eq!(report.mean_ms, 0.0);
        assert_eq!(report.jitter_ms, 0.0);
        assert_eq!(report.packet_loss_percent, 100.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_sample_has_zero_jitter() {
        let mock = MockTransport::new().with_latency(probes(&[33]));
        let (ctx, _) = context(mock, |c| c.latency_samples = 1);

        let report = measure_latency(&ctx, "Unloaded", (0.0, 0.1)).await.unwrap();
        assert_eq!(report.mean_ms, 33.0);
        assert_eq!(report.jitter_ms, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_spans_range() {
        let mock = MockTransport::new();
        let (ctx, _) = context(mock, |c| c.latency_samples = 5);
        let mut rx = ctx.store.subscribe();

        measure_latency(&ctx, "Loaded", (0.9, 1.0)).await.unwrap();

        let progress = rx.borrow_and_update().progress;
        assert!((progress - 1.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_urls_are_cache_busted() {
        let mock = MockTransport::new();
        let (ctx, mock) = context(mock, |c| c.latency_samples = 3);

        measure_latency(&ctx, "Unloaded", (0.0, 0.1)).await.unwrap();

        let urls: std::collections::HashSet<String> = mock.requests().into_iter().map(|r| r.url).collect();
        assert_eq!(urls.len(), 3);
        assert!(urls.iter().all(|u| u.contains("bytes=0")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_probe() {
        let mock = MockTransport::new();
        let (ctx, mock) = context(mock, |c| c.latency_samples = 3);
        ctx.signal.cancel();

        let err = measure_latency(&ctx, "Unloaded", (0.0, 0.1)).await.unwrap_err();
        assert!(err.is_cancellation());
        assert_eq!(mock.request_count(RequestKind::Latency), 0);
    }
}
