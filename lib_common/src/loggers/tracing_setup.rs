//! # Tracing Setup
//!
//! Installs the process-wide `tracing` subscriber: a human-readable console
//! layer plus a JSON layer written to a daily rolling file through a
//! non-blocking appender.
//!
//! The returned `WorkerGuard` flushes the file writer when dropped; keep it
//! alive in `main` for the whole run.

use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("cannot create log directory {path}: {source}")]
    LogDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid log filter `{0}`")]
    Filter(String),

    #[error("a global subscriber is already installed: {0}")]
    Init(String),
}

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub log_dir: PathBuf,
    /// Filter used when `RUST_LOG` is unset, e.g. `info` or `lib_common=debug,info`.
    pub level: String,
    /// Prefix of the rolling files, usually the executable basename.
    pub file_prefix: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            level: "info".to_string(),
            file_prefix: "price_sync".to_string(),
        }
    }
}

/// `RUST_LOG` when set and valid, otherwise the configured level.
pub fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|_| LoggingError::Filter(level.to_string()))
}

/// # Setup Logging
///
/// 1. Create the log directory.
/// 2. Open a daily rolling appender and wrap it in a non-blocking writer.
/// 3. Register console + JSON file layers behind the env filter.
pub fn setup_logging(settings: &LogSettings) -> Result<WorkerGuard, LoggingError> {
    std::fs::create_dir_all(&settings.log_dir).map_err(|source| LoggingError::LogDir {
        path: settings.log_dir.display().to_string(),
        source,
    })?;

    let file_appender = rolling::daily(&settings.log_dir, format!("{}.log", settings.file_prefix));
    let (writer, guard) = non_blocking(file_appender);

    let console_layer = fmt::layer().with_target(true).with_ansi(true);
    let file_layer = fmt::layer().with_ansi(false).with_writer(writer).json();

    tracing_subscriber::registry()
        .with(build_filter(&settings.level)?)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(guard)
}
