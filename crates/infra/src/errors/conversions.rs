//! Conversions from external infrastructure errors into domain errors.

use hubwire_common::rate_limit::RateLimitExceeded;
use hubwire_domain::{ApiError, ErrorCode, RateLimitDetails};
use reqwest::Error as HttpError;

use crate::http::TransportError;

/// Extension trait for foreign error types that cannot carry a `From` impl
/// for [`ApiError`] in this crate.
pub trait IntoApiError {
    fn into_api_error(self) -> ApiError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TransportError */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for TransportError {
    fn from(err: HttpError) -> Self {
        if err.is_timeout() {
            return TransportError::Timeout;
        }
        if err.is_builder() {
            return TransportError::InvalidRequest(err.to_string());
        }
        TransportError::Network(describe_http_error(&err))
    }
}

fn describe_http_error(err: &HttpError) -> String {
    let kind = if err.is_connect() {
        "connect"
    } else if err.is_body() || err.is_decode() {
        "body"
    } else if err.is_redirect() {
        "redirect"
    } else if err.is_request() {
        "request"
    } else {
        "http"
    };
    match err.url() {
        Some(url) => format!("{kind} error for {url}: {err}"),
        None => format!("{kind} error: {err}"),
    }
}

impl IntoApiError for HttpError {
    fn into_api_error(self) -> ApiError {
        TransportError::from(self).into()
    }
}

/* -------------------------------------------------------------------------- */
/* TransportError → ApiError */
/* -------------------------------------------------------------------------- */

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        let description = err.to_string();
        let mapped = match err {
            TransportError::Timeout | TransportError::Aborted => {
                ApiError::new(ErrorCode::RequestTimeout, "Request timed out")
            }
            TransportError::Network(message) => ApiError::network(message),
            TransportError::InvalidRequest(message) => ApiError::invalid_request(message),
        };
        mapped.with_original_error(description)
    }
}

/* -------------------------------------------------------------------------- */
/* RateLimitExceeded → ApiError */
/* -------------------------------------------------------------------------- */

impl IntoApiError for RateLimitExceeded {
    fn into_api_error(self) -> ApiError {
        let details = RateLimitDetails {
            retry_after: self.retry_after,
            limit: Some(self.limit),
            remaining: self.remaining,
            reset: Some(self.reset.to_rfc3339()),
            burst: self.burst,
            local: true,
        };
        let mut error = ApiError::new(ErrorCode::RateLimitExceeded, self.to_string())
            .with_status(self.status_code)
            .with_rate_limit(details);
        error.details = serde_json::to_value(&self).ok();
        error
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use hubwire_common::rate_limit::{RateLimitConfig, RateLimitManager, RateLimiter};
    use hubwire_common::resilience::MockClock;

    use super::*;

    #[test]
    fn transport_errors_map_to_codes() {
        let timeout: ApiError = TransportError::Timeout.into();
        assert_eq!(timeout.code, ErrorCode::RequestTimeout);
        assert!(timeout.is_retryable());

        let aborted: ApiError = TransportError::Aborted.into();
        assert_eq!(aborted.code, ErrorCode::RequestTimeout);

        let network: ApiError = TransportError::Network("connection reset".into()).into();
        assert_eq!(network.code, ErrorCode::NetworkError);
        assert_eq!(network.message, "connection reset");
        assert_eq!(network.original_error.as_deref(), Some("network error: connection reset"));

        let invalid: ApiError = TransportError::InvalidRequest("bad header".into()).into();
        assert_eq!(invalid.code, ErrorCode::InvalidRequest);
        assert!(!invalid.is_retryable());
    }

    #[test]
    fn local_rejection_is_not_retryable() {
        let clock = MockClock::starting_at_millis(10_000);
        let limiter = RateLimitManager::with_clock(
            RateLimitConfig::new(1, Duration::from_secs(1)),
            clock,
        );
        limiter.check_limit("/services").unwrap();
        let rejection = limiter.check_limit("/services").unwrap_err();

        let err = rejection.into_api_error();
        assert_eq!(err.code, ErrorCode::RateLimitExceeded);
        assert_eq!(err.status_code, Some(429));
        assert!(err.is_local_rate_limit());
        assert!(!err.is_retryable());

        let details = err.rate_limit.as_ref().unwrap();
        assert_eq!(details.retry_after, 1);
        assert_eq!(details.limit, Some(1));
        assert_eq!(details.remaining, 0);
        assert!(!details.burst);
        assert_eq!(err.details.as_ref().unwrap()["code"], "RATE_LIMIT_EXCEEDED");
    }
}
