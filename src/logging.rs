/// Structured logging for the basin monitoring service
///
/// Provides context-rich logging tagged with the data source and the
/// station/area identifier. Events go through `tracing`; console output is
/// always on, file output is enabled with `BASIN_WATCH_LOG_FILE` for runs
/// launched by a scheduler.

use crate::model::FetchError;
use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Environment variable naming an append-only log file.
pub const LOG_FILE_ENV: &str = "BASIN_WATCH_LOG_FILE";

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    fn as_filter(&self) -> LevelFilter {
        match self {
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Regional sensor-station network (rt-data feed).
    Retemir,
    /// Regional civil-protection alert bulletin.
    Allerta,
    WeatherLink,
    Telegram,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Retemir => write!(f, "RETEMIR"),
            DataSource::Allerta => write!(f, "ALLERTA"),
            DataSource::WeatherLink => write!(f, "WEATHERLINK"),
            DataSource::Telegram => write!(f, "TELEGRAM"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Unexpected failure - indicates an API change or configuration issue
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Subscriber Setup
// ---------------------------------------------------------------------------

/// Keeps the non-blocking file writer alive; drop it only at process exit.
pub struct LoggerGuard {
    _file: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Install the global subscriber.
///
/// `RUST_LOG` directives override `min_level`. Calling this twice (as tests
/// may) keeps the first subscriber.
pub fn init_logger(min_level: LogLevel, log_file: Option<&Path>, console_timestamps: bool) -> LoggerGuard {
    let filter = EnvFilter::builder()
        .with_default_directive(min_level.as_filter().into())
        .from_env_lossy();

    let timed = console_timestamps.then(|| tracing_fmt::layer().with_target(false));
    let untimed = (!console_timestamps).then(|| tracing_fmt::layer().without_time().with_target(false));

    let (file_layer, guard) = match log_file {
        Some(path) => match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                let (writer, guard) = tracing_appender::non_blocking(file);
                let layer = tracing_fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(writer);
                (Some(layer), Some(guard))
            }
            Err(e) => {
                eprintln!("Failed to open log file {}: {}", path.display(), e);
                (None, None)
            }
        },
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(timed)
        .with(untimed)
        .with(file_layer)
        .try_init();

    LoggerGuard { _file: guard }
}

/// Initialize logging the way every binary does: INFO by default,
/// timestamps on, optional file from the environment.
pub fn init_from_env() -> LoggerGuard {
    let log_file = std::env::var(LOG_FILE_ENV).ok().filter(|p| !p.trim().is_empty());
    init_logger(LogLevel::Info, log_file.as_deref().map(Path::new), true)
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Log a general informational message
pub fn info(source: DataSource, site_id: Option<&str>, message: &str) {
    tracing::info!(source = %source, site = site_id.unwrap_or("-"), "{}", message);
}

/// Log a warning message
pub fn warn(source: DataSource, site_id: Option<&str>, message: &str) {
    tracing::warn!(source = %source, site = site_id.unwrap_or("-"), "{}", message);
}

/// Log an error message
pub fn error(source: DataSource, site_id: Option<&str>, message: &str) {
    tracing::error!(source = %source, site = site_id.unwrap_or("-"), "{}", message);
}

/// Log a debug message
pub fn debug(source: DataSource, site_id: Option<&str>, message: &str) {
    tracing::debug!(source = %source, site = site_id.unwrap_or("-"), "{}", message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a fetch failure.
///
/// Transport trouble (timeouts, refused connections) is common for the
/// regional endpoints and tells us nothing about our configuration; an HTTP
/// error or a body we cannot read usually means the API moved or changed.
pub fn classify_fetch_failure(err: &FetchError) -> FailureType {
    match err {
        FetchError::Timeout { .. } | FetchError::Connect { .. } => FailureType::Unknown,
        FetchError::HttpStatus { status, .. } if *status >= 500 => FailureType::Unknown,
        FetchError::HttpStatus { .. } => FailureType::Unexpected,
        FetchError::InvalidJson { .. } | FetchError::UnexpectedShape(_) => FailureType::Unexpected,
        FetchError::Request { .. } => FailureType::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a fetch failure with automatic classification
pub fn log_fetch_failure(source: DataSource, site_id: Option<&str>, operation: &str, err: &FetchError) {
    let failure_type = classify_fetch_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Unexpected => error(source, site_id, &message),
        FailureType::Unknown => warn(source, site_id, &message),
    }
}

// ---------------------------------------------------------------------------
// Run Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of a check run
pub fn log_run_summary(source: DataSource, readings: usize, with_threshold: usize, alerts: usize) {
    let message = format!(
        "Check complete: {} readings, {} with a threshold, {} exceeded",
        readings, with_threshold, alerts
    );

    if alerts == 0 {
        info(source, None, &message);
    } else {
        warn(source, None, &message);
    }
}
