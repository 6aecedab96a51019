//! Logging initialisation for the `polystore` binary.
//!
//! The library only emits `tracing` events and `metrics` counters; it never
//! installs a subscriber or exporter. Binaries call [`init_logging`] once.

use crate::{Error, Result};
use std::io;
use std::str::FromStr;
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable consulted for the log filter before `RUST_LOG`.
pub const LOG_ENV: &str = "POLYSTORE_LOG";

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(Error::Configuration(format!("unknown log format: {other}"))),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive (`tracing_subscriber::EnvFilter` syntax).
    pub filter: String,
    /// Output format.
    pub format: LogFormat,
}

impl LoggingConfig {
    /// Resolves the filter from `POLYSTORE_LOG`, then `RUST_LOG`, then the
    /// verbosity default (`debug` when verbose, `warn` otherwise).
    #[must_use]
    pub fn from_env(verbose: bool, format: LogFormat) -> Self {
        let filter = std::env::var(LOG_ENV)
            .or_else(|_| std::env::var(EnvFilter::DEFAULT_ENV))
            .ok()
            .filter(|f| !f.trim().is_empty())
            .unwrap_or_else(|| default_filter(verbose).to_string());
        Self { filter, format }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(false).to_string(),
            format: LogFormat::default(),
        }
    }
}

const fn default_filter(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "warn" }
}

/// Installs the global `tracing` subscriber, writing to stderr.
///
/// # Errors
///
/// Returns an error if the filter is invalid or logging has already been
/// initialized.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    if LOGGING_INIT.get().is_some() {
        return Err(init_error("logging already initialized"));
    }

    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| Error::Configuration(format!("invalid log filter '{}': {e}", config.filter)))?;

    match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(io::stderr)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(true),
            )
            .with(filter)
            .try_init()
            .map_err(init_error)?,
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(io::stderr)
                    .with_target(true),
            )
            .with(filter)
            .try_init()
            .map_err(init_error)?,
    }

    LOGGING_INIT
        .set(())
        .map_err(|()| init_error("failed to mark logging initialized"))
}

#[allow(clippy::needless_pass_by_value)]
fn init_error(cause: impl ToString) -> Error {
    Error::OperationFailed {
        operation: "logging_init".to_string(),
        cause: cause.to_string(),
    }
}
