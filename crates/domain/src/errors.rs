//! Error types returned by the request pipeline
//!
//! Every failure surfaced to callers is an [`ApiError`] carrying a stable
//! [`ErrorCode`]. Non-2xx responses are mapped by [`ApiError::from_status`],
//! which also reads the server's `{ code, message, details }` error envelope.

use std::fmt;
use std::time::Duration;

use hubwire_common::error::{ErrorClassification, ErrorSeverity};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

/// Stable machine-readable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Transport-level failure (connection refused, DNS, reset)
    NetworkError,
    /// A single attempt exceeded its timeout
    RequestTimeout,
    /// Local limiter rejection or server 429
    RateLimitExceeded,
    /// HTTP 401
    Unauthorized,
    /// HTTP 403
    Forbidden,
    /// HTTP 404
    NotFound,
    /// HTTP 422
    ValidationError,
    /// HTTP 5xx
    ServerError,
    /// Any other non-2xx status
    ApiError,
    /// A 401 could not be recovered by refreshing credentials
    AuthenticationRequired,
    /// A download could not be fetched or written
    DownloadFailed,
    /// The response body did not match its content type
    InvalidResponseFormat,
    /// The client was used after `destroy()`
    SdkNotInitialized,
    /// Invalid client configuration
    ConfigurationError,
    /// The request could not be built (bad URL, body, or interceptor failure)
    InvalidRequest,
}

impl ErrorCode {
    /// Wire name, e.g. `RATE_LIMIT_EXCEEDED`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkError => "NETWORK_ERROR",
            Self::RequestTimeout => "REQUEST_TIMEOUT",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::ServerError => "SERVER_ERROR",
            Self::ApiError => "API_ERROR",
            Self::AuthenticationRequired => "AUTHENTICATION_REQUIRED",
            Self::DownloadFailed => "DOWNLOAD_FAILED",
            Self::InvalidResponseFormat => "INVALID_RESPONSE_FORMAT",
            Self::SdkNotInitialized => "SDK_NOT_INITIALIZED",
            Self::ConfigurationError => "CONFIGURATION_ERROR",
            Self::InvalidRequest => "INVALID_REQUEST",
        }
    }

    /// Code for a non-2xx HTTP status
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            422 => Self::ValidationError,
            429 => Self::RateLimitExceeded,
            500..=599 => Self::ServerError,
            _ => Self::ApiError,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rate-limit details attached to `RATE_LIMIT_EXCEEDED` errors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDetails {
    /// Whole seconds to wait
    pub retry_after: u64,
    /// Limit of the window that rejected the request
    pub limit: Option<u32>,
    /// Always 0 for local rejections
    pub remaining: u32,
    /// RFC 3339 reset timestamp
    pub reset: Option<String>,
    /// True when a burst window rejected the request
    pub burst: bool,
    /// True when rejected locally before any network traffic
    pub local: bool,
}

/// Error returned by every fallible pipeline operation
#[derive(Debug, Clone, PartialEq, Error)]
#[error("[{code}] {message}")]
pub struct ApiError {
    /// Stable error code
    pub code: ErrorCode,
    /// Human-readable message, from the server envelope when present
    pub message: String,
    /// HTTP status when a response was received
    pub status_code: Option<u16>,
    /// Server-specific error code from the response envelope
    pub server_code: Option<String>,
    /// Parsed error body or envelope `details`
    pub details: Option<Value>,
    /// `x-request-id` of the failing response
    pub request_id: Option<String>,
    /// Display text of the underlying cause
    pub original_error: Option<String>,
    /// Attempts made before giving up
    pub attempts: u32,
    /// Present on `RATE_LIMIT_EXCEEDED`
    pub rate_limit: Option<RateLimitDetails>,
}

/// Result type alias for pipeline operations
pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    /// Create an error with a code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status_code: None,
            server_code: None,
            details: None,
            request_id: None,
            original_error: None,
            attempts: 0,
            rate_limit: None,
        }
    }

    /// `CONFIGURATION_ERROR`
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigurationError, message)
    }

    /// `INVALID_REQUEST`
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// `NETWORK_ERROR`
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NetworkError, message)
    }

    /// `REQUEST_TIMEOUT` for an attempt that ran longer than `timeout`
    pub fn timeout(timeout: Duration) -> Self {
        Self::new(
            ErrorCode::RequestTimeout,
            format!("Request timed out after {}ms", timeout.as_millis()),
        )
    }

    /// `SDK_NOT_INITIALIZED`
    pub fn not_initialized() -> Self {
        Self::new(ErrorCode::SdkNotInitialized, "Client has been destroyed")
    }

    /// Map a non-2xx response to an error
    ///
    /// A JSON body shaped `{ code, message, details }` (optionally nested
    /// under `error`) fills `server_code`, `message` and `details`; any
    /// other body is kept verbatim in `details`.
    pub fn from_status(status: u16, body: Option<Value>, request_id: Option<String>) -> Self {
        let code = ErrorCode::from_status(status);
        let mut error =
            Self::new(code, format!("Request failed with status code {status}")).with_status(status);
        error.request_id = request_id;

        let Some(body) = body else {
            return error;
        };
        let envelope = match body.get("error") {
            Some(inner) if inner.is_object() => inner.clone(),
            _ => body.clone(),
        };
        if let Some(message) = envelope.get("message").and_then(Value::as_str) {
            error.message = message.to_string();
        }
        if let Some(server_code) = envelope.get("code").and_then(Value::as_str) {
            error.server_code = Some(server_code.to_string());
        }
        error.details = match envelope.get("details") {
            Some(details) if !details.is_null() => Some(details.clone()),
            _ if body.is_null() => None,
            _ => Some(body),
        };
        error
    }

    /// Set the HTTP status
    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    /// Set the request id
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Attach structured details
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Record the underlying cause
    pub fn with_original_error(mut self, cause: impl fmt::Display) -> Self {
        self.original_error = Some(cause.to_string());
        self
    }

    /// Record how many attempts were made
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Attach rate-limit details
    pub fn with_rate_limit(mut self, rate_limit: RateLimitDetails) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    /// Whether this came from the local limiter rather than the server
    pub fn is_local_rate_limit(&self) -> bool {
        self.rate_limit.as_ref().is_some_and(|r| r.local)
    }

    /// Whether the executor may retry the attempt that produced this error
    ///
    /// 401, 403, 404 and 422 are final. Timeouts, network failures, 429,
    /// 5xx and every other status are retried. Errors raised locally
    /// (configuration, request building, parsing, limiter rejections) are
    /// never retried.
    pub fn is_retryable(&self) -> bool {
        match self.code {
            ErrorCode::RequestTimeout | ErrorCode::NetworkError => true,
            ErrorCode::RateLimitExceeded => !self.is_local_rate_limit(),
            ErrorCode::Unauthorized
            | ErrorCode::Forbidden
            | ErrorCode::NotFound
            | ErrorCode::ValidationError
            | ErrorCode::AuthenticationRequired
            | ErrorCode::DownloadFailed
            | ErrorCode::InvalidResponseFormat
            | ErrorCode::SdkNotInitialized
            | ErrorCode::ConfigurationError
            | ErrorCode::InvalidRequest => false,
            ErrorCode::ServerError | ErrorCode::ApiError => self.status_code.is_some(),
        }
    }

    /// Server-suggested wait, from rate-limit details
    pub fn retry_after_hint(&self) -> Option<Duration> {
        self.rate_limit.as_ref().map(|r| Duration::from_secs(r.retry_after))
    }
}

impl Serialize for ApiError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ApiError", 10)?;
        state.serialize_field("code", &self.code)?;
        state.serialize_field("message", &self.message)?;
        state.serialize_field("statusCode", &self.status_code)?;
        state.serialize_field("serverCode", &self.server_code)?;
        state.serialize_field("details", &self.details)?;
        state.serialize_field("requestId", &self.request_id)?;
        state.serialize_field("originalError", &self.original_error)?;
        state.serialize_field("attempts", &self.attempts)?;
        state.serialize_field("rateLimit", &self.rate_limit)?;
        state.serialize_field("retryable", &self.is_retryable())?;
        state.end()
    }
}

impl ErrorClassification for ApiError {
    fn is_retryable(&self) -> bool {
        ApiError::is_retryable(self)
    }

    fn severity(&self) -> ErrorSeverity {
        match self.code {
            ErrorCode::ServerError | ErrorCode::NetworkError | ErrorCode::RequestTimeout => {
                ErrorSeverity::Error
            }
            ErrorCode::RateLimitExceeded | ErrorCode::NotFound | ErrorCode::ValidationError => {
                ErrorSeverity::Warning
            }
            ErrorCode::ConfigurationError | ErrorCode::SdkNotInitialized => {
                ErrorSeverity::Critical
            }
            _ => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self.code, ErrorCode::ConfigurationError)
    }

    fn retry_after(&self) -> Option<Duration> {
        self.retry_after_hint()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    /// Validates `ErrorCode::from_status` behavior for the status mapping
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms every listed status maps to its code.
    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorCode::from_status(401), ErrorCode::Unauthorized);
        assert_eq!(ErrorCode::from_status(403), ErrorCode::Forbidden);
        assert_eq!(ErrorCode::from_status(404), ErrorCode::NotFound);
        assert_eq!(ErrorCode::from_status(422), ErrorCode::ValidationError);
        assert_eq!(ErrorCode::from_status(429), ErrorCode::RateLimitExceeded);
        assert_eq!(ErrorCode::from_status(503), ErrorCode::ServerError);
        assert_eq!(ErrorCode::from_status(409), ErrorCode::ApiError);
    }

    /// Validates `ApiError::is_retryable` behavior for the classification
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures 401/403/404/422 are final.
    /// - Ensures 5xx, 429 and other statuses are retryable.
    /// - Ensures local limiter rejections are final.
    #[test]
    fn test_retry_classification() {
        for status in [401, 403, 404, 422] {
            assert!(!ApiError::from_status(status, None, None).is_retryable(), "{status}");
        }
        for status in [400, 409, 429, 500, 502, 503] {
            assert!(ApiError::from_status(status, None, None).is_retryable(), "{status}");
        }
        assert!(ApiError::timeout(Duration::from_secs(1)).is_retryable());
        assert!(ApiError::network("reset").is_retryable());

        let local = ApiError::new(ErrorCode::RateLimitExceeded, "slow down").with_rate_limit(
            RateLimitDetails {
                retry_after: 1,
                limit: Some(3),
                remaining: 0,
                reset: None,
                burst: false,
                local: true,
            },
        );
        assert!(!local.is_retryable());
        assert_eq!(local.retry_after_hint(), Some(Duration::from_secs(1)));
    }

    /// Validates `ApiError::from_status` behavior for the error envelope
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms server code, message and details are taken from the body.
    /// - Confirms nested `error` envelopes are understood.
    #[test]
    fn test_error_envelope_parsing() {
        let body = json!({
            "code": "BOOKING_SLOT_TAKEN",
            "message": "Slot no longer available",
            "details": { "slot": "10:00" }
        });
        let err = ApiError::from_status(409, Some(body), Some("req-1".into()));
        assert_eq!(err.code, ErrorCode::ApiError);
        assert_eq!(err.server_code.as_deref(), Some("BOOKING_SLOT_TAKEN"));
        assert_eq!(err.message, "Slot no longer available");
        assert_eq!(err.details, Some(json!({ "slot": "10:00" })));
        assert_eq!(err.request_id.as_deref(), Some("req-1"));
        assert_eq!(err.to_string(), "[API_ERROR] Slot no longer available");

        let nested = json!({ "error": { "code": "E1", "message": "nested" } });
        let err = ApiError::from_status(500, Some(nested), None);
        assert_eq!(err.server_code.as_deref(), Some("E1"));
        assert_eq!(err.message, "nested");
    }

    /// Validates `ApiError::from_status` behavior for a plain body.
    ///
    /// Assertions:
    /// - Ensures the default message is used and the body kept as details.
    #[test]
    fn test_plain_body_kept_as_details() {
        let err = ApiError::from_status(404, Some(Value::String("missing".into())), None);
        assert_eq!(err.message, "Request failed with status code 404");
        assert_eq!(err.details, Some(Value::String("missing".into())));
    }

    /// Validates `ApiError` serialization for the stable JSON shape
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms camelCase keys, the SCREAMING_SNAKE code and `retryable`.
    #[test]
    fn test_serialized_shape() {
        let err = ApiError::from_status(503, None, Some("abc".into())).with_attempts(4);
        let json = serde_json::to_value(&err).unwrap();

        assert_eq!(json["code"], "SERVER_ERROR");
        assert_eq!(json["statusCode"], 503);
        assert_eq!(json["requestId"], "abc");
        assert_eq!(json["attempts"], 4);
        assert_eq!(json["retryable"], true);
    }
}
