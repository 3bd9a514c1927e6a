//! Shared error types and the classification interface
//!
//! [`CommonError`] covers failures of the runtime building blocks
//! themselves (bad configuration, background tasks). Request-level errors
//! live in the domain crate; both sides implement [`ErrorClassification`]
//! so retry and logging code can treat them alike.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type for the runtime building blocks
pub type CommonResult<T> = Result<T, CommonError>;

/// Failure of a cache, limiter or sweep operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommonError {
    /// A setting the component cannot run with
    #[error("Configuration error in field '{field}': {message}")]
    Config { field: String, message: String },

    /// A background task could not be started or was aborted
    #[error("Task '{task_id}' cancelled: {reason}")]
    TaskCancelled { task_id: String, reason: String },

    /// An operation did not finish in time
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout { operation: String, duration: Duration },
}

impl CommonError {
    /// Invalid setting named by `field`
    pub fn config_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config { field: field.into(), message: message.into() }
    }

    pub fn task_cancelled_with_reason(
        task_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::TaskCancelled { task_id: task_id.into(), reason: reason.into() }
    }

    /// `operation` ran past `duration`
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout { operation: operation.into(), duration }
    }
}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Config { .. } => ErrorSeverity::Error,
            Self::Timeout { .. } => ErrorSeverity::Warning,
            Self::TaskCancelled { .. } => ErrorSeverity::Info,
        }
    }

    fn is_critical(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Standard classification interface for every error in the pipeline
pub trait ErrorClassification {
    /// Whether a later attempt may succeed
    fn is_retryable(&self) -> bool;

    fn severity(&self) -> ErrorSeverity;

    /// Whether the error points at a broken invariant rather than bad input
    fn is_critical(&self) -> bool;

    /// Suggested wait before retrying, when known (server `Retry-After`,
    /// local rate-limit window)
    fn retry_after(&self) -> Option<Duration>;
}

/// Severity used to pick a log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "INFO",
            Self::Warning => "WARN",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        })
    }
}
