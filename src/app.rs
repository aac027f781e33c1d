//! Main application orchestration and execution
//!
//! Embeds the engine in a terminal host: configuration, live progress on
//! stderr, Ctrl+C cancellation and the final report on stdout.

use crate::{
    cli::Cli,
    client::{ReqwestTransport, SpeedTestTransport},
    config::{display_config_summary, load_config, validate_config},
    engine::{RunOutcome, SpeedTestEngine},
    error::Result,
    logging::LoggerFactory,
    models::{Config, LiveMetrics, NetworkContext, SpeedTestRecord},
    output::{format_json, OutputCoordinator},
};
use std::io::{IsTerminal, Write};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Exit code of a run interrupted with Ctrl+C
pub const CANCELLED_EXIT_CODE: i32 = 130;

/// Main application struct that coordinates all components
pub struct App {
    config: Config,
    show_progress: bool,
}

impl App {
    /// Create a new application instance from CLI arguments, `.env` and the environment
    pub fn new(cli: Cli) -> Result<Self> {
        Ok(Self::from_config(load_config(cli)?))
    }

    pub fn from_config(config: Config) -> Self {
        let show_progress = !config.json_output && std::io::stderr().is_terminal();
        Self { config, show_progress }
    }

    /// Disable the live progress line
    pub fn without_progress(mut self) -> Self {
        self.show_progress = false;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one speed test against the configured endpoints
    pub async fn run(&self) -> Result<RunOutcome> {
        let transport = Arc::new(ReqwestTransport::new(&self.config.test)?);
        self.run_with_transport(transport).await
    }

    /// Run one speed test over the given transport and print the outcome
    pub async fn run_with_transport(&self, transport: Arc<dyn SpeedTestTransport>) -> Result<RunOutcome> {
        let config = &self.config;
        let coordinator = OutputCoordinator::from_config(config);

        let warnings = validate_config(config)?;
        if config.debug {
            eprintln!("{}", crate::build_info());
            eprintln!("\nConfiguration Summary:\n{}\n", display_config_summary(config));
        }
        if !config.json_output && (config.verbose || config.debug) {
            for warning in &warnings {
                eprintln!("{}", warning.format(config.enable_color));
            }
        }

        let logger = LoggerFactory::new(config.clone()).create_speed_test_logger().await;
        let engine = Arc::new(SpeedTestEngine::with_logger(config.test.clone(), transport, logger));

        let progress = self.show_progress.then(|| spawn_progress_display(&engine, config));
        let interrupt = spawn_interrupt_handler(&engine);

        let outcome = engine.spawn_test().await;

        interrupt.abort();
        if let Some(progress) = progress {
            progress.abort();
            eprintln!();
        }

        let outcome = outcome??;
        match &outcome {
            RunOutcome::Completed(result) => {
                let network = NetworkContext::new(config.network_type.clone(), config.isp_name.clone());
                let record = SpeedTestRecord::new(result.clone(), network);
                println!("{}", self.render_record(&coordinator, &record)?);
            }
            RunOutcome::Cancelled => {
                eprintln!("{}", coordinator.display_warning("Speed test cancelled")?);
            }
        }

        Ok(outcome)
    }

    fn render_record(&self, coordinator: &OutputCoordinator, record: &SpeedTestRecord) -> Result<String> {
        if self.config.json_output {
            format_json(record)
        } else {
            coordinator.display_record(record)
        }
    }
}

/// Process exit code for a finished run
pub fn exit_code(outcome: &Result<RunOutcome>) -> i32 {
    match outcome {
        Ok(RunOutcome::Completed(_)) => 0,
        Ok(RunOutcome::Cancelled) => CANCELLED_EXIT_CODE,
        Err(e) => e.exit_code(),
    }
}

/// Redraw the progress line on every published metrics change
fn spawn_progress_display(engine: &Arc<SpeedTestEngine>, config: &Config) -> JoinHandle<()> {
    let mut rx = engine.subscribe();
    let coordinator = OutputCoordinator::from_config(config);

    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let metrics = rx.borrow_and_update().clone();
            draw_progress(&coordinator, &metrics);
        }
    })
}

fn draw_progress(coordinator: &OutputCoordinator, metrics: &LiveMetrics) {
    let mut stderr = std::io::stderr().lock();
    // Progress output is best effort
    let _ = write!(stderr, "\r\x1b[2K{}", coordinator.display_progress(metrics));
    let _ = stderr.flush();
}

/// Cancel the engine's run on Ctrl+C
fn spawn_interrupt_handler(engine: &Arc<SpeedTestEngine>) -> JoinHandle<()> {
    let engine = Arc::clone(engine);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            engine.cancel();
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MockBehavior, MockTransport, RequestKind};
    use crate::models::TestConfiguration;
    use crate::types::RunStatus;
    use std::time::Duration;

    fn config(json_output: bool) -> Config {
        Config {
            test: TestConfiguration {
                download_sizes: vec![100_000],
                upload_sizes: vec![100_000],
                latency_samples: 2,
                concurrent_connections: 2,
                ..TestConfiguration::default()
            },
            enable_color: false,
            json_output,
            network_type: Some("ethernet".to_string()),
            ..Config::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_prints_report_for_completed_run() {
        let mock = Arc::new(
            MockTransport::new()
                .with_download(MockBehavior::default().with_elapsed(Duration::from_millis(50))),
        );
        let app = App::from_config(config(false)).without_progress();

        let outcome = app.run_with_transport(mock.clone()).await;
        assert_eq!(exit_code(&outcome), 0);

        let outcome = outcome.unwrap();
        assert_eq!(outcome.status(), RunStatus::Completed);
        assert_eq!(outcome.result().unwrap().download_speed_bps, 2_000_000.0);
        assert_eq!(mock.request_count(RequestKind::Download), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_configuration_is_reported_before_running() {
        let mut config = config(true);
        config.test.latency_samples = 0;
        let mock = Arc::new(MockTransport::new());

        let outcome = App::from_config(config).run_with_transport(mock.clone()).await;
        assert_eq!(exit_code(&outcome), 1);
        assert!(mock.requests().is_empty());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&Ok(RunOutcome::Cancelled)), CANCELLED_EXIT_CODE);
        assert_eq!(exit_code(&Err(crate::error::AppError::timeout("slow"))), 3);
    }

    #[test]
    fn test_json_output_disables_progress() {
        assert!(!App::from_config(config(true)).show_progress);
    }
}
