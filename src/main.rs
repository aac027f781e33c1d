//! Network Speed Tester - command-line host
//!
//! Runs one HTTP speed test (latency, download, upload, loaded latency) and
//! prints the result as a report or JSON.

use clap::Parser;
use network_speed_tester::{
    app::{exit_code, App},
    cli::Cli,
    error::{AppError, ErrorReporter},
};
use std::process;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(99);
    }));

    let cli = Cli::parse();

    if cli.should_show_topic_help() {
        println!("{}", cli.display_help());
        return;
    }

    if let Err(message) = cli.validate() {
        let error = AppError::validation(message);
        ErrorReporter::new(cli.use_colors(), false).report_error(&error);
        process::exit(error.exit_code());
    }

    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose || cli.debug);

    let app = match App::new(cli) {
        Ok(app) => app,
        Err(e) => {
            reporter.report_error(&e);
            process::exit(e.exit_code());
        }
    };

    let outcome = app.run().await;
    if let Err(ref e) = outcome {
        reporter.report_error(e);
    }

    process::exit(exit_code(&outcome));
}
