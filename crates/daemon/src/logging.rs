//! Tracing setup for the `pathfs` binary.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "pathfs.log";

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log level {0:?}")]
    InvalidLevel(String),
    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Build the filter: `RUST_LOG` directives plus `level` as the default.
pub fn env_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    let level: tracing::Level = level
        .parse()
        .map_err(|_| LoggingError::InvalidLevel(level.to_string()))?;
    Ok(EnvFilter::from_default_env().add_directive(level.into()))
}

/// Install the global subscriber. Logs go to stderr and, with `log_dir`,
/// to a daily-rotated file as well.
///
/// The returned guard flushes the file writer on drop and must be held
/// for the life of the process.
pub fn init(level: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>, LoggingError> {
    let filter = env_filter(level)?;
    let stderr = fmt::layer().with_writer(std::io::stderr);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .try_init()?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .try_init()?;
            Ok(None)
        }
    }
}
