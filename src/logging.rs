/// Structured logging for the fusion engine
///
/// All modules emit `tracing` events with `point_id`, `source` and
/// `pollutant` fields where they apply. This module installs the
/// subscriber for binaries and tests, and holds the batch summary
/// helpers shared by feed schedulers.

use std::fmt;

use tracing_subscriber::EnvFilter;

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
    /// Directive understood by `EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
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
// Subscriber
// ---------------------------------------------------------------------------

/// Installs the global fmt subscriber. `RUST_LOG` overrides `min_level`.
///
/// Returns `false` when a subscriber was already installed, which makes a
/// second call a no-op.
pub fn init_logger(min_level: LogLevel, console_timestamps: bool) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(min_level.as_filter()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let result = if console_timestamps {
        builder.try_init()
    } else {
        builder.without_time().try_init()
    };
    result.is_ok()
}

// ---------------------------------------------------------------------------
// Ingest Summary Logging
// ---------------------------------------------------------------------------

/// Severity of a batch summary: clean batches are informational, fully
/// rejected batches are errors, anything in between is a warning.
pub fn summary_level(accepted: usize, dropped: usize) -> LogLevel {
    if dropped == 0 {
        LogLevel::Info
    } else if accepted == 0 {
        LogLevel::Error
    } else {
        LogLevel::Warning
    }
}

/// Log a summary of one feed batch.
pub fn log_ingest_summary(source: &str, total: usize, accepted: usize, dropped: usize) {
    match summary_level(accepted, dropped) {
        LogLevel::Info | LogLevel::Debug => {
            tracing::info!(source = %source, total, accepted, dropped, "ingest batch complete")
        }
        LogLevel::Warning => {
            tracing::warn!(source = %source, total, accepted, dropped, "ingest batch complete")
        }
        LogLevel::Error => {
            tracing::error!(source = %source, total, accepted, dropped, "ingest batch complete")
        }
    }
}
