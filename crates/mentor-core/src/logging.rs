//! Tracing subscriber setup.

use std::fs;
use std::io;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LoggingConfig, paths};

/// Initializes the logging system.
///
/// Filter precedence: `RUST_LOG`, then the configured level. Log lines go
/// to stderr (stdout carries the chat) and to a daily-rolling file under
/// the logs directory. The returned guard must be held for the process
/// lifetime so buffered lines are flushed on exit.
pub fn init_logging(config: &LoggingConfig) -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let is_json = config.format.eq_ignore_ascii_case("json");

    let logs_dir = paths::logs_dir();
    if let Err(e) = fs::create_dir_all(&logs_dir) {
        eprintln!("Failed to create log directory {}: {e}", logs_dir.display());
    }
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "mentor.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = if is_json {
        fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer().with_writer(io::stderr).with_target(true).boxed()
    };

    let file_layer = if is_json {
        fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed()
    };

    Registry::default()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}
