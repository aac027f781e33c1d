//! Download and upload stages
//!
//! Sizes run sequentially, smallest first. Each size is one wave of
//! `concurrent_connections` tasks in a `JoinSet`, joined before the next size
//! starts and aborted if the stage is dropped.
//! A failed connection contributes a zero speed and never aborts the wave;
//! only cancellation unwinds the stage.

use super::StageContext;
use crate::client::{HttpUtils, TransferResponse};
use crate::error::{AppError, Result};
use crate::models::{SizeMeasurement, TransferReport};
use crate::stats::throughput_bps;
use crate::types::TransferDirection;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Completed-connection counter that maps onto a progress range
#[derive(Debug)]
struct WaveProgress {
    done: AtomicUsize,
    total: usize,
    range: (f64, f64),
}

impl WaveProgress {
    fn new(total: usize, range: (f64, f64)) -> Self {
        Self {
            done: AtomicUsize::new(0),
            total,
            range,
        }
    }

    fn complete_one(&self) -> f64 {
        let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        let (start, end) = self.range;
        if self.total == 0 {
            return end;
        }
        start + (end - start) * (done.min(self.total) as f64 / self.total as f64)
    }
}

/// Run one transfer stage over `sizes` (already sorted ascending)
pub(crate) async fn measure_transfer(
    ctx: &StageContext,
    direction: TransferDirection,
    sizes: &[u64],
    range: (f64, f64),
) -> Result<TransferReport> {
    let connections = ctx.config.concurrent_connections;
    let progress = Arc::new(WaveProgress::new(sizes.len() * connections as usize, range));
    let mut per_size = Vec::with_capacity(sizes.len());

    for (index, &size) in sizes.iter().enumerate() {
        ctx.signal.check()?;
        per_size.push(run_wave(ctx, direction, size, &progress).await?);

        if index + 1 < sizes.len() {
            ctx.signal.sleep(ctx.config.inter_size_delay()).await?;
        }
    }

    ctx.store.advance(range.1);
    let report = TransferReport::from_sizes(direction, per_size);
    ctx.logger.log_transfer_report(&report).await;
    Ok(report)
}

/// One size: C parallel connections, joined before returning
async fn run_wave(
    ctx: &StageContext,
    direction: TransferDirection,
    size: u64,
    progress: &Arc<WaveProgress>,
) -> Result<SizeMeasurement> {
    let connections = ctx.config.concurrent_connections;
    let payload = match direction {
        TransferDirection::Download => None,
        TransferDirection::Upload => Some(HttpUtils::random_payload(size)),
    };

    // Dropping the set aborts every connection still in flight
    let mut wave = JoinSet::new();
    for connection in 0..connections {
        let url = match direction {
            TransferDirection::Download => HttpUtils::download_url(&ctx.config.download_url, size)?,
            TransferDirection::Upload => ctx.config.upload_url.clone(),
        };
        let body = payload.clone();
        let task_ctx = ctx.clone();
        let progress = Arc::clone(progress);

        wave.spawn(async move {
            let speed = run_connection(&task_ctx, direction, size, connection, url, body).await;
            if speed.is_ok() {
                task_ctx.store.advance(progress.complete_one());
            }
            (connection, speed)
        });
    }

    // Indexed by connection so results keep their order; a panicked task stays 0
    let mut speeds = vec![0.0; connections as usize];
    let mut cancelled = None;
    while let Some(joined) = wave.join_next().await {
        match joined {
            Ok((connection, Ok(speed))) => speeds[connection as usize] = speed,
            Ok((_, Err(e))) if e.is_cancellation() => cancelled = Some(e),
            Ok((_, Err(e))) => {
                ctx.logger.log_error(&e, Some("transfer connection")).await;
            }
            Err(join_error) => {
                let e = AppError::from(join_error);
                if e.is_cancellation() {
                    cancelled = Some(e);
                } else {
                    ctx.logger.log_error(&e, Some("transfer connection task")).await;
                }
            }
        }
    }

    if let Some(e) = cancelled {
        return Err(e);
    }
    ctx.signal.check()?;
    Ok(SizeMeasurement::new(size, speeds))
}

/// A single request. `Ok(0.0)` for a failed connection, `Err` only when cancelled.
async fn run_connection(
    ctx: &StageContext,
    direction: TransferDirection,
    size: u64,
    connection: u32,
    url: String,
    payload: Option<Vec<u8>>,
) -> Result<f64> {
    let outcome = match payload {
        Some(body) => ctx.signal.run_or_cancel(ctx.transport.upload(&url, body)).await,
        None => ctx.signal.run_or_cancel(ctx.transport.download(&url)).await,
    };

    match outcome {
        Ok(response) if response.is_success() => {
            let speed = connection_speed(direction, size, &response);
            ctx.store.record_speed(direction, speed);
            ctx.logger.log_connection(direction, size, connection, speed, None).await;
            Ok(speed)
        }
        Ok(response) => {
            let error = AppError::http_status(format!("{} returned HTTP {}", direction, response.status_code));
            ctx.logger.log_connection(direction, size, connection, 0.0, Some(&error)).await;
            Ok(0.0)
        }
        Err(e) if e.is_cancellation() => Err(e),
        Err(e) => {
            ctx.logger.log_connection(direction, size, connection, 0.0, Some(&e)).await;
            Ok(0.0)
        }
    }
}

/// Downloads are timed on bytes received, uploads on the payload size
fn connection_speed(direction: TransferDirection, size: u64, response: &TransferResponse) -> f64 {
    match direction {
        TransferDirection::Download => throughput_bps(response.bytes, response.elapsed),
        TransferDirection::Upload => throughput_bps(size, response.elapsed),
    }
}
