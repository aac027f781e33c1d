//! Speed test engine
//!
//! Owns the live metrics and runs one test at a time:
//! unloaded latency → download → upload → loaded latency. Stages receive a
//! [`StageContext`] carrying the transport, the live store and the run's
//! cancellation signal.

pub mod cancel;
pub mod live;

mod latency;
mod load;
mod transfer;

pub use cancel::CancelSignal;
pub use live::LiveMetricsStore;

use crate::client::{ReqwestTransport, SpeedTestTransport};
use crate::error::{AppError, Result};
use crate::logging::SpeedTestLogger;
use crate::models::{LatencyReport, LiveMetrics, TestConfiguration, TestResult};
use crate::stats::aim::{self, AimScores};
use crate::types::{LoadedLatencyMode, RunStatus, TestStage, TransferDirection};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Offsets applied to the loaded-download figures when the loaded-upload
/// latency is estimated rather than measured
pub const ESTIMATED_UPLOAD_LATENCY_OFFSET_MS: f64 = crate::defaults::LOADED_UPLOAD_LATENCY_OFFSET_MS;
pub const ESTIMATED_UPLOAD_JITTER_OFFSET_MS: f64 = crate::defaults::LOADED_UPLOAD_JITTER_OFFSET_MS;

/// How a run ended when it did not fail
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(TestResult),
    Cancelled,
}

impl RunOutcome {
    pub fn status(&self) -> RunStatus {
        match self {
            Self::Completed(_) => RunStatus::Completed,
            Self::Cancelled => RunStatus::Cancelled,
        }
    }

    pub fn result(&self) -> Option<&TestResult> {
        match self {
            Self::Completed(result) => Some(result),
            Self::Cancelled => None,
        }
    }

    pub fn into_result(self) -> Option<TestResult> {
        match self {
            Self::Completed(result) => Some(result),
            Self::Cancelled => None,
        }
    }
}

/// Everything a stage needs, cheap to clone into connection tasks
#[derive(Clone)]
pub(crate) struct StageContext {
    pub config: Arc<TestConfiguration>,
    pub transport: Arc<dyn SpeedTestTransport>,
    pub store: Arc<LiveMetricsStore>,
    pub logger: Arc<SpeedTestLogger>,
    pub signal: CancelSignal,
}

impl StageContext {
    /// Same context, different cancellation signal
    pub fn with_signal(&self, signal: CancelSignal) -> Self {
        Self {
            signal,
            ..self.clone()
        }
    }
}

/// Holds the busy flag for one run.
///
/// A run whose future is dropped before it settles (a caller-side timeout, an
/// aborted `spawn_test` handle) is cancelled here and its live metrics sealed,
/// so nothing it spawned keeps publishing.
struct RunGuard {
    busy: Arc<AtomicBool>,
    current: Arc<Mutex<Option<CancelSignal>>>,
    store: Arc<LiveMetricsStore>,
    signal: CancelSignal,
    settled: bool,
}

impl RunGuard {
    fn acquire(engine: &SpeedTestEngine) -> Result<Self> {
        engine
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| AppError::busy("a speed test is already running"))?;

        let signal = CancelSignal::new();
        *lock_signal(&engine.current) = Some(signal.clone());
        Ok(Self {
            busy: Arc::clone(&engine.busy),
            current: Arc::clone(&engine.current),
            store: Arc::clone(&engine.store),
            signal,
            settled: false,
        })
    }

    /// The live metrics now hold the run's final state
    fn settle(&mut self) {
        self.settled = true;
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        lock_signal(&self.current).take();
        if !self.settled {
            self.signal.cancel();
            self.store.seal_cancelled();
        }
        self.busy.store(false, Ordering::SeqCst);
    }
}

fn lock_signal(slot: &Mutex<Option<CancelSignal>>) -> MutexGuard<'_, Option<CancelSignal>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// HTTP speed test engine
pub struct SpeedTestEngine {
    config: Arc<TestConfiguration>,
    transport: Arc<dyn SpeedTestTransport>,
    logger: Arc<SpeedTestLogger>,
    store: Arc<LiveMetricsStore>,
    busy: Arc<AtomicBool>,
    current: Arc<Mutex<Option<CancelSignal>>>,
}

impl SpeedTestEngine {
    pub fn new(config: TestConfiguration, transport: Arc<dyn SpeedTestTransport>) -> Self {
        Self::with_logger(config, transport, SpeedTestLogger::quiet())
    }

    pub fn with_logger(
        config: TestConfiguration,
        transport: Arc<dyn SpeedTestTransport>,
        logger: SpeedTestLogger,
    ) -> Self {
        let store = Arc::new(LiveMetricsStore::new(config.history_capacity.max(1)));
        Self {
            config: Arc::new(config),
            transport,
            logger: Arc::new(logger),
            store,
            busy: Arc::new(AtomicBool::new(false)),
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// Engine backed by a reqwest transport built from `config`
    pub fn with_reqwest(config: TestConfiguration) -> Result<Self> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn config(&self) -> &TestConfiguration {
        &self.config
    }

    /// Receiver that observes every live update
    pub fn subscribe(&self) -> watch::Receiver<LiveMetrics> {
        self.store.subscribe()
    }

    /// Snapshot of the live metrics
    pub fn metrics(&self) -> LiveMetrics {
        self.store.snapshot()
    }

    /// True from the start of a run until it has fully unwound.
    ///
    /// After `cancel()` the live metrics report the run as stopped at once,
    /// but this stays true (and `run_test` answers `Busy`) until the
    /// cancelled run has returned.
    pub fn is_running(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn calculate_aim_scores(&self, result: &TestResult) -> AimScores {
        aim::calculate_aim_scores(result)
    }

    /// Run a test on the tokio worker pool
    pub fn spawn_test(self: &Arc<Self>) -> JoinHandle<Result<RunOutcome>> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.run_test().await })
    }

    /// Signal the current run to stop. Returns true when a run was signalled.
    ///
    /// Live metrics show the run as stopped immediately; writes from requests
    /// still unwinding are discarded.
    pub fn cancel(&self) -> bool {
        let Some(signal) = lock_signal(&self.current).take() else {
            return false;
        };
        signal.cancel();
        self.store.seal_cancelled();
        true
    }

    /// Run a complete test.
    ///
    /// Returns `Err(Busy)` without touching the live metrics when another run
    /// is in progress. Cancellation is reported as `RunOutcome::Cancelled`.
    pub async fn run_test(&self) -> Result<RunOutcome> {
        let mut guard = RunGuard::acquire(self)?;
        let signal = guard.signal.clone();
        self.store.begin_run();

        let started = Instant::now();
        let correlation_id = self
            .logger
            .log_run_started(
                self.config.download_sizes.len(),
                self.config.upload_sizes.len(),
                self.config.concurrent_connections,
            )
            .await;

        let outcome = match self.config.validate() {
            Ok(()) => self.execute(&signal).await,
            Err(e) => Err(e),
        };
        lock_signal(&self.current).take();

        let outcome = match outcome {
            Ok(_) if signal.is_cancelled() => Err(AppError::cancelled("speed test cancelled")),
            other => other,
        };

        match outcome {
            Ok(result) => {
                self.store.finish_completed(&result);
                guard.settle();
                self.logger
                    .log_run_finished(&correlation_id, RunStatus::Completed, started.elapsed())
                    .await;
                Ok(RunOutcome::Completed(result))
            }
            Err(e) if e.is_cancellation() => {
                self.store.seal_cancelled();
                guard.settle();
                self.logger
                    .log_run_finished(&correlation_id, RunStatus::Cancelled, started.elapsed())
                    .await;
                Ok(RunOutcome::Cancelled)
            }
            Err(e) => {
                self.store.finish_failed();
                guard.settle();
                self.logger.log_error(&e, Some("speed test run")).await;
                self.logger
                    .log_run_finished(&correlation_id, RunStatus::Failed, started.elapsed())
                    .await;
                Err(e)
            }
        }
    }

    async fn execute(&self, signal: &CancelSignal) -> Result<TestResult> {
        let ctx = StageContext {
            config: Arc::clone(&self.config),
            transport: Arc::clone(&self.transport),
            store: Arc::clone(&self.store),
            logger: Arc::clone(&self.logger),
            signal: signal.clone(),
        };

        let unloaded = self.stage(&ctx, TestStage::MeasuringUnloadedLatency).await;
        let unloaded = latency::measure_latency(&ctx, "Unloaded", unloaded).await?;

        let range = self.stage(&ctx, TestStage::MeasuringDownload).await;
        let sizes = self.config.sorted_download_sizes();
        let download = transfer::measure_transfer(&ctx, TransferDirection::Download, &sizes, range).await?;

        let range = self.stage(&ctx, TestStage::MeasuringUpload).await;
        let sizes = self.config.sorted_upload_sizes();
        let upload = transfer::measure_transfer(&ctx, TransferDirection::Upload, &sizes, range).await?;

        let (start, end) = self.stage(&ctx, TestStage::MeasuringLoadedLatency).await;
        let (loaded_download, loaded_upload) = match self.config.loaded_latency_mode {
            LoadedLatencyMode::Estimated => {
                let measured = latency::measure_latency(&ctx, "Loaded", (start, end)).await?;
                let estimated = estimate_upload_latency(&measured);
                (measured, estimated)
            }
            LoadedLatencyMode::Measured => {
                let middle = (start + end) / 2.0;
                let down = load::measure_under_load(&ctx, TransferDirection::Download, (start, middle)).await?;
                ctx.signal.check()?;
                let up = load::measure_under_load(&ctx, TransferDirection::Upload, (middle, end)).await?;
                (down, up)
            }
        };

        ctx.signal.check()?;
        Ok(TestResult {
            download_speed_bps: download.speed_bps,
            upload_speed_bps: upload.speed_bps,
            latency_ms: unloaded.mean_ms,
            jitter_ms: unloaded.jitter_ms,
            packet_loss_percent: unloaded.packet_loss_percent,
            loaded_download_latency_ms: loaded_download.mean_ms,
            loaded_upload_latency_ms: loaded_upload.mean_ms,
            loaded_download_jitter_ms: loaded_download.jitter_ms,
            loaded_upload_jitter_ms: loaded_upload.jitter_ms,
            loaded_latency_mode: self.config.loaded_latency_mode,
            download,
            upload,
        })
    }

    /// Enter `stage` and return its progress range
    async fn stage(&self, ctx: &StageContext, stage: TestStage) -> (f64, f64) {
        ctx.store.enter_stage(stage);
        self.logger.log_stage_started(stage).await;
        stage.progress_range()
    }
}

/// Loaded-upload figures derived from the loaded-download measurement
fn estimate_upload_latency(loaded_download: &LatencyReport) -> LatencyReport {
    LatencyReport {
        mean_ms: loaded_download.mean_ms + ESTIMATED_UPLOAD_LATENCY_OFFSET_MS,
        jitter_ms: loaded_download.jitter_ms + ESTIMATED_UPLOAD_JITTER_OFFSET_MS,
        packet_loss_percent: loaded_download.packet_loss_percent,
        attempts: 0,
        samples_ms: Vec::new(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockBehavior, MockTransport, RequestKind};
    use std::time::Duration;

    fn small_config() -> TestConfiguration {
        TestConfiguration {
            download_sizes: vec![1_000_000, 100_000],
            upload_sizes: vec![100_000],
            latency_samples: 2,
            concurrent_connections: 2,
            ..TestConfiguration::default()
        }
    }

    fn engine(mock: MockTransport, config: TestConfiguration) -> (Arc<SpeedTestEngine>, Arc<MockTransport>) {
        let mock = Arc::new(mock);
        (Arc::new(SpeedTestEngine::new(config, mock.clone())), mock)
    }

    #[test]
    fn test_estimated_upload_latency_offsets() {
        let measured = LatencyReport::from_samples(2, vec![40.0, 60.0]);
        let estimated = estimate_upload_latency(&measured);
        assert_eq!(estimated.mean_ms, 55.0);
        assert_eq!(estimated.jitter_ms, 11.0);
        assert_eq!(estimated.attempts, 0);
    }

    #[test]
    fn test_run_outcome_accessors() {
        assert_eq!(RunOutcome::Cancelled.status(), RunStatus::Cancelled);
        assert!(RunOutcome::Cancelled.result().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_run_publishes_final_metrics() {
        let mock = MockTransport::new()
            .with_latency(MockBehavior::default().with_elapsed(Duration::from_millis(30)))
            .with_download(MockBehavior::default().with_elapsed(Duration::from_millis(500)))
            .with_upload(MockBehavior::default().with_elapsed(Duration::from_millis(100)));
        let (engine, _) = engine(mock, small_config());

        let outcome = engine.run_test().await.unwrap();
        let result = outcome.into_result().unwrap();

        assert_eq!(result.download_speed_bps, 2_000_000.0);
        assert_eq!(result.upload_speed_bps, 1_000_000.0);
        assert_eq!(result.latency_ms, 30.0);
        assert_eq!(result.loaded_upload_latency_ms, 35.0);
        assert_eq!(result.loaded_upload_jitter_ms, 1.0);
        assert!(result.loaded_upload_is_estimated());
        // Ascending order regardless of configuration order
        assert_eq!(result.download.per_size[0].size_bytes, 100_000);

        let metrics = engine.metrics();
        assert_eq!(metrics.progress, 1.0);
        assert!(!metrics.is_running);
        assert_eq!(metrics.stage, TestStage::Idle);
        assert_eq!(metrics.last_outcome, Some(RunStatus::Completed));
        assert_eq!(metrics.download_bps, result.download_speed_bps);
        assert!(!engine.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_config_fails_run() {
        let config = TestConfiguration {
            concurrent_connections: 0,
            ..small_config()
        };
        let (engine, mock) = engine(MockTransport::new(), config);

        let err = engine.run_test().await.unwrap_err();
        assert_eq!(err.category(), "CONFIG");
        assert!(mock.requests().is_empty());

        let metrics = engine.metrics();
        assert_eq!(metrics.last_outcome, Some(RunStatus::Failed));
        assert!(!metrics.is_running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_measured_mode_probes_under_both_loads() {
        let config = TestConfiguration {
            loaded_latency_mode: LoadedLatencyMode::Measured,
            ..small_config()
        };
        let mock = MockTransport::new()
            .with_download(MockBehavior::default().with_delay(Duration::from_millis(10)))
            .with_upload(MockBehavior::default().with_delay(Duration::from_millis(10)));
        let (engine, mock) = engine(mock, config);

        let result = engine.run_test().await.unwrap().into_result().unwrap();

        assert_eq!(result.loaded_latency_mode, LoadedLatencyMode::Measured);
        assert!(!result.loaded_upload_is_estimated());
        assert_eq!(result.loaded_upload_latency_ms, 100.0);
        // unloaded + loaded-under-download + loaded-under-upload
        assert_eq!(mock.request_count(RequestKind::Latency), 6);
    }

    #[tokio::test]
    async fn test_cancel_during_download() {
        let mock = MockTransport::new()
            .with_latency(MockBehavior::default().with_elapsed(Duration::from_millis(20)))
            .with_download(MockBehavior::default().with_delay(Duration::from_secs(3600)));
        let config = TestConfiguration {
            latency_interval_ms: 0,
            ..small_config()
        };
        let (engine, mock) = engine(mock, config);
        let mut rx = engine.subscribe();

        let run = engine.spawn_test();
        rx.wait_for(|m| m.stage == TestStage::MeasuringDownload).await.unwrap();
        assert!(engine.cancel());
        assert!(!engine.metrics().is_running);

        let outcome = run.await.unwrap().unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled);
        assert!(!engine.is_running());
        assert_eq!(mock.request_count(RequestKind::Upload), 0);

        let metrics = engine.metrics();
        assert_eq!(metrics.last_outcome, Some(RunStatus::Cancelled));
        assert_eq!(metrics.stage, TestStage::Idle);
    }

    #[tokio::test]
    async fn test_busy_while_running() {
        let mock = MockTransport::new().with_latency(MockBehavior::default().with_delay(Duration::from_secs(3600)));
        let (engine, _) = engine(mock, small_config());
        let mut rx = engine.subscribe();

        let run = engine.spawn_test();
        rx.wait_for(|m| m.is_running).await.unwrap();

        let err = engine.run_test().await.unwrap_err();
        assert_eq!(err.category(), "BUSY");
        assert!(engine.is_running());

        engine.cancel();
        assert_eq!(run.await.unwrap().unwrap(), RunOutcome::Cancelled);
        assert!(!engine.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_run_is_busy_until_it_returns() {
        let mock = MockTransport::new().with_download(MockBehavior::default().with_delay(Duration::from_secs(3600)));
        let (engine, _) = engine(mock, small_config());
        let mut rx = engine.subscribe();

        let run = engine.spawn_test();
        rx.wait_for(|m| m.stage == TestStage::MeasuringDownload).await.unwrap();
        assert!(engine.cancel());

        // Stopped for observers, still unwinding for the engine
        assert!(!engine.metrics().is_running);
        assert!(engine.is_running());
        assert_eq!(engine.run_test().await.unwrap_err().category(), "BUSY");

        assert_eq!(run.await.unwrap().unwrap(), RunOutcome::Cancelled);
        assert!(!engine.is_running());
        assert!(matches!(engine.run_test().await.unwrap(), RunOutcome::Completed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_run_stops_its_connections() {
        let mock = MockTransport::new().with_download(MockBehavior::default().with_delay(Duration::from_secs(5)));
        let (engine, mock) = engine(mock, small_config());

        let timed_out = tokio::time::timeout(Duration::from_secs(1), engine.run_test()).await;
        assert!(timed_out.is_err());
        assert_eq!(mock.request_count(RequestKind::Download), 2);

        let metrics = engine.metrics();
        assert!(!engine.is_running());
        assert!(!metrics.is_running);
        assert_eq!(metrics.stage, TestStage::Idle);
        assert_eq!(metrics.last_outcome, Some(RunStatus::Cancelled));

        // The abandoned wave never finishes or publishes
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(engine.metrics(), metrics);
        assert!(engine.metrics().download_history.is_empty());
        assert_eq!(mock.request_count(RequestKind::Download), 2);
        assert!(!engine.cancel());

        // A fresh run only sees its own connections
        engine.run_test().await.unwrap();
        assert_eq!(engine.metrics().download_history.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_spawned_run_is_sealed() {
        let mock = MockTransport::new().with_download(MockBehavior::default().with_delay(Duration::from_secs(5)));
        let (engine, mock) = engine(mock, small_config());
        let mut rx = engine.subscribe();

        let run = engine.spawn_test();
        rx.wait_for(|m| m.stage == TestStage::MeasuringDownload).await.unwrap();
        run.abort();
        assert!(run.await.unwrap_err().is_cancelled());

        assert!(!engine.is_running());
        assert_eq!(engine.metrics().last_outcome, Some(RunStatus::Cancelled));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(engine.metrics().download_history.is_empty());
        assert!(mock.request_count(RequestKind::Download) <= 2);
    }
}
