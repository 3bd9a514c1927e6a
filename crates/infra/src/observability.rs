//! Logging setup and request outcome events
//!
//! The library itself only emits `tracing` events. Binaries and tests call
//! [`init_tracing`] once to install a subscriber.

use std::str::FromStr;
use std::time::Duration;

use hubwire_domain::{ApiResponse, ApiResult, HttpMethod};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "info";

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable single-line output
    #[default]
    Plain,
    /// Multi-line output with file and line numbers
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "text" | "" => Ok(Self::Plain),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Install a global subscriber filtered by `RUST_LOG` (default `info`)
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(format: LogFormat) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Plain => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_file(true)
                    .with_line_number(true)
                    .with_target(false),
            )
            .try_init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
    };
    result.is_ok()
}

/// Emit `request_completed` or `request_failed` for one pipeline call
pub fn log_request_outcome(
    method: HttpMethod,
    path: &str,
    result: &ApiResult<ApiResponse>,
    elapsed: Duration,
) {
    let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    match result {
        Ok(response) => info!(
            event = "request_completed",
            %method,
            path,
            status = response.meta.status,
            attempts = response.meta.attempts,
            from_cache = response.meta.from_cache,
            request_id = response.meta.request_id.as_deref().unwrap_or(""),
            elapsed_ms,
            "request_completed"
        ),
        Err(error) => warn!(
            event = "request_failed",
            %method,
            path,
            code = %error.code,
            status = ?error.status_code,
            attempts = error.attempts,
            retryable = error.is_retryable(),
            request_id = error.request_id.as_deref().unwrap_or(""),
            elapsed_ms,
            "request_failed"
        ),
    }
}
