//! Entry point for the `learnhub-admin` maintenance binary

use std::process::ExitCode;

use clap::Parser;
use learnhub_admin::Cli;
use learnhub_common::{CorrelationId, init_tracing, initialize_environment};
use learnhub_config::{ApplicationConfig, TelemetryConfig};
use tracing::Instrument;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize environment (load .env, etc.)
    initialize_environment();

    let cli = Cli::parse();

    // Keep the guard alive so buffered log lines are flushed on exit
    let _log_guard = init_tracing(&TelemetryConfig::from_env());

    // Loaded after logging is up: refused or enabled TLS relaxation is only
    // reported as a warning while the configuration is read
    let config = ApplicationConfig::from_env();

    let run_id = CorrelationId::new();
    let span = tracing::info_span!("admin", run_id = %run_id, command = cli.command.name());

    let mut stdout = std::io::stdout();
    match learnhub_admin::run(cli.command, config, &mut stdout)
        .instrument(span)
        .await
    {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(run_id = %run_id, "Command failed: {e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
