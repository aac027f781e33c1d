//! Engine-owned live metrics with subscription and snapshot reads

use crate::models::{LiveMetrics, TestResult};
use crate::stats::{bytes_to_megabytes, sanitize_speed};
use crate::types::{RunStatus, TestStage, TransferDirection};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;

/// Writer side of the live metrics.
///
/// Every mutation runs inside the watch channel's write lock, so concurrent
/// connection tasks never tear a history buffer and sealing is atomic with
/// respect to late writers.
#[derive(Debug)]
pub struct LiveMetricsStore {
    tx: watch::Sender<LiveMetrics>,
    sealed: AtomicBool,
    history_capacity: usize,
}

impl LiveMetricsStore {
    pub fn new(history_capacity: usize) -> Self {
        let (tx, _rx) = watch::channel(LiveMetrics::default());
        Self {
            tx,
            sealed: AtomicBool::new(false),
            history_capacity,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LiveMetrics> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> LiveMetrics {
        self.tx.borrow().clone()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::SeqCst)
    }

    /// Reset for a new run and accept writes again
    pub fn begin_run(&self) {
        self.tx.send_modify(|metrics| {
            self.sealed.store(false, Ordering::SeqCst);
            *metrics = LiveMetrics {
                is_running: true,
                ..LiveMetrics::default()
            };
        });
    }

    /// Apply `change` unless the store is sealed. Returns whether it applied.
    pub fn update<F>(&self, change: F) -> bool
    where
        F: FnOnce(&mut LiveMetrics),
    {
        self.tx.send_if_modified(|metrics| {
            if self.sealed.load(Ordering::SeqCst) {
                return false;
            }
            change(metrics);
            true
        })
    }

    pub fn enter_stage(&self, stage: TestStage) {
        let (start, _) = stage.progress_range();
        self.update(|m| {
            m.stage = stage;
            m.progress = m.progress.max(start);
        });
    }

    /// Raise progress; lower values are ignored
    pub fn advance(&self, progress: f64) {
        let progress = progress.clamp(0.0, 1.0);
        self.update(|m| {
            if progress > m.progress {
                m.progress = progress;
            }
        });
    }

    /// Publish a completed connection's speed and append it to the history
    pub fn record_speed(&self, direction: TransferDirection, speed_bps: f64) {
        let speed_bps = sanitize_speed(speed_bps);
        let capacity = self.history_capacity;
        self.update(|m| {
            let history = match direction {
                TransferDirection::Download => {
                    m.download_bps = speed_bps;
                    &mut m.download_history
                }
                TransferDirection::Upload => {
                    m.upload_bps = speed_bps;
                    &mut m.upload_history
                }
            };
            history.push_back(bytes_to_megabytes(speed_bps));
            while history.len() > capacity {
                history.pop_front();
            }
        });
    }

    pub fn record_latency(&self, latency_ms: f64, jitter_ms: f64, packet_loss_percent: f64) {
        self.update(|m| {
            m.latency_ms = latency_ms;
            m.jitter_ms = jitter_ms;
            m.packet_loss_percent = packet_loss_percent;
        });
    }

    /// Publish the final values of a successful run
    pub fn finish_completed(&self, result: &TestResult) {
        self.update(|m| {
            m.download_bps = result.download_speed_bps;
            m.upload_bps = result.upload_speed_bps;
            m.latency_ms = result.latency_ms;
            m.jitter_ms = result.jitter_ms;
            m.packet_loss_percent = result.packet_loss_percent;
            m.progress = 1.0;
            m.is_running = false;
            m.stage = TestStage::Idle;
            m.last_outcome = Some(RunStatus::Completed);
        });
    }

    pub fn finish_failed(&self) {
        self.update(|m| {
            m.is_running = false;
            m.stage = TestStage::Idle;
            m.last_outcome = Some(RunStatus::Failed);
        });
    }

    /// Mark the run cancelled and drop every later write until `begin_run`.
    /// Returns false if the store was already sealed.
    pub fn seal_cancelled(&self) -> bool {
        self.tx.send_if_modified(|m| {
            if self.sealed.swap(true, Ordering::SeqCst) {
                return false;
            }
            m.is_running = false;
            m.stage = TestStage::Idle;
            m.last_outcome = Some(RunStatus::Cancelled);
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures;
    use std::sync::Arc;

    #[test]
    fn test_begin_run_resets_state() {
        let store = LiveMetricsStore::new(10);
        store.record_speed(TransferDirection::Download, 1_000_000.0);
        store.advance(0.7);
        store.finish_failed();

        store.begin_run();
        let metrics = store.snapshot();
        assert!(metrics.is_running);
        assert_eq!(metrics.progress, 0.0);
        assert!(metrics.download_history.is_empty());
        assert_eq!(metrics.download_bps, 0.0);
        assert_eq!(metrics.last_outcome, None);
    }

    #[test]
    fn test_progress_never_decreases() {
        let store = LiveMetricsStore::new(10);
        store.begin_run();
        store.advance(0.4);
        store.advance(0.2);
        assert_eq!(store.snapshot().progress, 0.4);

        store.enter_stage(TestStage::MeasuringDownload);
        assert_eq!(store.snapshot().progress, 0.4);
        store.enter_stage(TestStage::MeasuringUpload);
        assert_eq!(store.snapshot().progress, 0.5);

        store.advance(3.0);
        assert_eq!(store.snapshot().progress, 1.0);
    }

    #[test]
    fn test_history_is_bounded_oldest_first() {
        let store = LiveMetricsStore::new(3);
        store.begin_run();
        for mb in 1..=5 {
            store.record_speed(TransferDirection::Upload, mb as f64 * 1_000_000.0);
        }

        let metrics = store.snapshot();
        assert_eq!(metrics.upload_history, vec![3.0, 4.0, 5.0]);
        assert_eq!(metrics.upload_bps, 5_000_000.0);
        assert!(metrics.download_history.is_empty());
    }

    #[test]
    fn test_invalid_speed_is_clamped() {
        let store = LiveMetricsStore::new(3);
        store.record_speed(TransferDirection::Download, f64::NAN);
        store.record_speed(TransferDirection::Download, -5.0);

        let metrics = store.snapshot();
        assert_eq!(metrics.download_bps, 0.0);
        assert_eq!(metrics.download_history, vec![0.0, 0.0]);
    }

    #[test]
    fn test_sealed_store_drops_writes() {
        let store = LiveMetricsStore::new(10);
        store.begin_run();
        store.advance(0.3);

        assert!(store.seal_cancelled());
        assert!(!store.seal_cancelled());
        store.advance(0.9);
        store.record_speed(TransferDirection::Download, 42.0);
        assert!(!store.update(|m| m.latency_ms = 1.0));

        let metrics = store.snapshot();
        assert!(!metrics.is_running);
        assert_eq!(metrics.progress, 0.3);
        assert_eq!(metrics.last_outcome, Some(RunStatus::Cancelled));
        assert!(metrics.download_history.is_empty());

        store.begin_run();
        assert!(!store.is_sealed());
        store.advance(0.1);
        assert_eq!(store.snapshot().progress, 0.1);
    }

    #[test]
    fn test_finish_completed_publishes_final_values() {
        let store = LiveMetricsStore::new(10);
        store.begin_run();
        store.record_latency(80.0, 9.0, 10.0);

        let result = fixtures::result(3_000_000.0, 1_000_000.0, 25.0, 2.0);
        store.finish_completed(&result);

        let metrics = store.snapshot();
        assert_eq!(metrics.progress, 1.0);
        assert_eq!(metrics.latency_ms, 25.0);
        assert_eq!(metrics.download_bps, 3_000_000.0);
        assert_eq!(metrics.stage, TestStage::Idle);
        assert_eq!(metrics.last_outcome, Some(RunStatus::Completed));
        assert!(!metrics.is_running);
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let store = LiveMetricsStore::new(10);
        let mut rx = store.subscribe();
        store.begin_run();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_running);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_respect_capacity() {
        let store = Arc::new(LiveMetricsStore::new(16));
        store.begin_run();

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    for i in 0..100 {
                        store.record_speed(TransferDirection::Download, i as f64);
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(store.snapshot().download_history.len(), 16);
    }
}
