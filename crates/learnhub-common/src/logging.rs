//! Logging setup for maintenance binaries
//!
//! Logs go to stderr through a non-blocking writer so stdout stays free for
//! reports. `RUST_LOG` overrides the configured default level.

use learnhub_config::{LogFormat, TelemetryConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Build the env filter, preferring `RUST_LOG` over the configured level
fn build_filter(config: &TelemetryConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
}

/// Install the global tracing subscriber
///
/// The returned guard flushes buffered log lines when dropped; keep it alive
/// for the duration of `main()`. Calling this twice is harmless: the second
/// subscriber is silently rejected.
pub fn init_tracing(config: &TelemetryConfig) -> WorkerGuard {
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
    let filter = build_filter(config);

    let result = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_writer(writer)
            .with_env_filter(filter)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_writer(writer)
            .with_env_filter(filter)
            .with_target(false)
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }

    guard
}
