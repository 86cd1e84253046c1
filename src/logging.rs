//! Logging setup for spotify-inbox
//!
//! Everything goes to a daily rotating file; a second, quieter layer mirrors
//! progress to stderr so a one-shot run still shows what it did.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

const LOG_FILE_PREFIX: &str = "spotify-inbox";

/// Initialize the logging system.
///
/// Logs are written to `<log_dir>/spotify-inbox.YYYY-MM-DD.log` with daily rotation.
/// The file level can be controlled via the `RUST_LOG` environment variable.
///
/// Default file levels:
/// - `spotify_inbox` modules: DEBUG
/// - `rspotify`: INFO
/// - Other crates: WARN
///
/// The stderr level is INFO, DEBUG with one `-v`, TRACE with two or more.
/// The returned guard flushes the file writer when dropped and must be held
/// until the process exits.
pub fn init_logging(log_dir: &Path, verbosity: u8) -> anyhow::Result<WorkerGuard> {
    if !log_dir.exists() {
        std::fs::create_dir_all(log_dir)?;
    }

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("spotify_inbox=debug,rspotify=info,warn"));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(file_filter);

    let console_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(EnvFilter::new(format!("spotify_inbox={},warn", console_level)));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .init();

    tracing::debug!("Logging initialized - logs written to {}/", log_dir.display());

    Ok(guard)
}

/// Log a Spotify API request and its result
#[macro_export]
macro_rules! log_api_result {
    ($operation:expr, $result:expr) => {
        match &$result {
            Ok(_) => tracing::debug!(operation = $operation, "API request successful"),
            Err(e) => tracing::error!(operation = $operation, error = %e, "API request failed"),
        }
    };
}

/// Log a Spotify API request with additional context
#[macro_export]
macro_rules! log_api_request {
    ($operation:expr) => {
        tracing::debug!(operation = $operation, "API request started");
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::debug!(operation = $operation, $($field)*, "API request started");
    };
}
