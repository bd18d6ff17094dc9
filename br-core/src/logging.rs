//! Structured logging setup using the `tracing` ecosystem.
//!
//! Console output goes to stderr in compact form; file output rotates daily
//! and can be switched to JSON for ingestion.

use std::path::Path;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};
use tracing_appender::rolling;

use crate::config::LoggingConfig;
use crate::error::BrResult;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize the global tracing subscriber from the logging configuration.
///
/// `log_dir` is the already-resolved directory (see `AppConfig::effective_log_dir`).
/// An unparsable level falls back to `info`.
pub fn init_logging(config: &LoggingConfig, log_dir: &Path) -> BrResult<LogGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = rolling::daily(log_dir, "brigada.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer: BoxedLayer = if config.json_output {
        fmt::layer()
            .with_writer(non_blocking)
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(env_filter(&config.level))
            .boxed()
    } else {
        fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(env_filter(&config.level))
            .boxed()
    };

    tracing_subscriber::registry()
        .with(vec![file_layer, console_layer(&config.level)])
        .init();

    tracing::info!(level = %config.level, dir = %log_dir.display(), "logging initialized");

    Ok(LogGuard { _guard: guard })
}

/// Guard that keeps the non-blocking log writer alive.
/// Drop this to flush and close the log file.
pub struct LogGuard {
    _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Initialize a console-only logger for tests and simple CLI usage.
///
/// Safe to call repeatedly; only the first call installs a subscriber.
pub fn init_console_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(console_layer(level))
        .try_init();
}

fn console_layer(level: &str) -> BoxedLayer {
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .with_filter(env_filter(level))
        .boxed()
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_logging_is_idempotent() {
        init_console_logging("debug");
        init_console_logging("trace");
    }
}
