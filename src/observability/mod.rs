//! Observability Infrastructure
//!
//! Structured logging setup and security-event audit records. Application
//! code uses the standard `tracing` macros plus [`security_event!`] and does
//! not know which output format is configured.
//!
//! # Usage
//!
//! ```ignore
//! use portaria::observability::{ObservabilityConfig, init};
//!
//! let config = ObservabilityConfig::from_env();
//! init(&config)?;
//! ```

mod events;

pub use events::{security_event, SecurityEvent, Severity};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line format for development
    #[default]
    Pretty,
    /// JSON lines for production log aggregation
    Json,
    /// Compact single-line format
    Compact,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Output format
    pub log_format: LogFormat,
    /// Filter directive used when `RUST_LOG` is unset (e.g. "info",
    /// "portaria=debug,tower_http=info")
    pub log_filter: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl ObservabilityConfig {
    /// Load from environment variables.
    ///
    /// - `LOG_FORMAT`: "pretty", "json", or "compact" (default: "pretty")
    /// - `RUST_LOG`: filter directive (default: "info")
    pub fn from_env() -> Self {
        let log_format = match std::env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("compact") => LogFormat::Compact,
            _ => LogFormat::Pretty,
        };
        let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
        Self {
            log_format,
            log_filter,
        }
    }
}

/// Observability initialization errors.
#[derive(Debug, thiserror::Error)]
pub enum ObservabilityError {
    /// Invalid filter directive
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Subscriber already installed or failed to install
    #[error("failed to initialize tracing: {0}")]
    Init(String),
}

/// Install the tracing subscriber.
///
/// Call once at startup, before any logging occurs. `RUST_LOG` overrides the
/// configured filter.
pub fn init(config: &ObservabilityConfig) -> Result<(), ObservabilityError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .map_err(|e| ObservabilityError::Filter(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_target(true))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(true))
            .try_init(),
    }
    .map_err(|e| ObservabilityError::Init(e.to_string()))?;

    tracing::info!(
        log_format = ?config.log_format,
        "Observability initialized"
    );

    Ok(())
}
