//! Logging bootstrap for the bridge
//!
//! Library code only emits `tracing` events; a process embedding the bridge
//! picks an output format once at startup.
//!
//! # Environment Variables
//!
//! - `LEAP_LOG_MODE`: `silent`, `development` (default), `debug` or `json`
//! - `LEAP_LOG_LEVEL`: filter directive such as `info` or `leap_connection=debug`;
//!   falls back to `RUST_LOG`, then to the mode's default level

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Output format for bridge logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No subscriber is installed
    Silent,
    /// Compact stderr output at `info`
    Development,
    /// Verbose output with source locations at `debug`
    Debug,
    /// One JSON object per line at `info`, for container log collectors
    Json,
}

impl LoggingMode {
    /// Parse a `LEAP_LOG_MODE` value.
    pub fn parse(value: &str) -> Result<Self, LoggingError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "silent" => Ok(LoggingMode::Silent),
            "development" | "dev" => Ok(LoggingMode::Development),
            "debug" => Ok(LoggingMode::Debug),
            "json" => Ok(LoggingMode::Json),
            other => Err(LoggingError::InvalidEnv(format!("LEAP_LOG_MODE={other}"))),
        }
    }

    fn default_level(&self) -> &'static str {
        match self {
            LoggingMode::Debug => "debug",
            _ => "info",
        }
    }
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid environment variable: {0}")]
    InvalidEnv(String),
}

/// Install a global subscriber for `mode`.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    if mode == LoggingMode::Silent {
        return Ok(());
    }

    let filter = create_env_filter(mode.default_level())?;
    let result = match mode {
        LoggingMode::Development => Registry::default()
            .with(fmt::layer().with_target(false).compact())
            .with(filter)
            .try_init(),
        LoggingMode::Debug => Registry::default()
            .with(
                fmt::layer()
                    .pretty()
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(filter)
            .try_init(),
        LoggingMode::Json => Registry::default()
            .with(fmt::layer().json().with_current_span(false))
            .with(filter)
            .try_init(),
        LoggingMode::Silent => Ok(()),
    };

    result.map_err(|e| LoggingError::TracingInit(e.to_string()))
}

/// Initialize logging from `LEAP_LOG_MODE`.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = match std::env::var("LEAP_LOG_MODE") {
        Ok(value) => LoggingMode::parse(&value)?,
        Err(_) => LoggingMode::Development,
    };

    init_logging(mode)
}

/// `LEAP_LOG_LEVEL`, then `RUST_LOG`, then `default_level`.
fn create_env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    let directive = std::env::var("LEAP_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default_level.to_string());

    EnvFilter::try_new(&directive)
        .map_err(|e| LoggingError::InvalidEnv(format!("log filter {directive:?}: {e}")))
}

/// True once any global subscriber is installed.
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}
