//! Response model returned by the pipeline

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ApiError, ErrorCode};

/// Decoded response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ResponseBody {
    /// `application/json` and `+json` bodies
    Json(Value),
    /// `text/*` bodies
    Text(String),
    /// Anything else
    Bytes(Vec<u8>),
    /// Zero-length body
    Empty,
}

impl ResponseBody {
    /// Body as JSON, if it was decoded as JSON
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Body as text, if it was decoded as text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Raw bytes of the body in any representation
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Json(value) => serde_json::to_vec(value).unwrap_or_default(),
            Self::Text(text) => text.as_bytes().to_vec(),
            Self::Bytes(bytes) => bytes.clone(),
            Self::Empty => Vec::new(),
        }
    }

    /// Whether there is no body
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Rate-limit headers reported by the server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitMeta {
    /// `x-ratelimit-limit`
    pub limit: Option<u32>,
    /// `x-ratelimit-remaining`
    pub remaining: Option<u32>,
    /// `x-ratelimit-reset`, verbatim
    pub reset: Option<String>,
    /// `retry-after`, in seconds
    pub retry_after: Option<u64>,
}

impl RateLimitMeta {
    /// Whether no rate-limit header was present
    pub fn is_empty(&self) -> bool {
        self.limit.is_none()
            && self.remaining.is_none()
            && self.reset.is_none()
            && self.retry_after.is_none()
    }
}

/// Response metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    /// `x-request-id`, or a generated id when the server sent none
    pub request_id: Option<String>,
    /// Server rate-limit headers
    pub rate_limit: Option<RateLimitMeta>,
    /// HTTP status
    pub status: u16,
    /// Attempts used to obtain the response
    pub attempts: u32,
    /// Whether the response was served from cache
    pub from_cache: bool,
}

/// Successful response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Always true for values returned through `Ok`
    pub success: bool,
    /// Decoded body
    pub data: ResponseBody,
    /// Metadata
    pub meta: ResponseMeta,
    /// When the response was produced
    pub timestamp: DateTime<Utc>,
}

impl ApiResponse {
    /// Successful response stamped now
    pub fn new(data: ResponseBody, meta: ResponseMeta) -> Self {
        Self { success: true, data, meta, timestamp: Utc::now() }
    }

    /// Copy marked as served from cache
    pub fn cached(&self) -> Self {
        let mut response = self.clone();
        response.meta.from_cache = true;
        response
    }

    /// Deserialize the body into `T`
    ///
    /// Text bodies are tried as JSON; an empty body deserializes from
    /// `null`, so `Option<_>` and `()` targets work for 204 responses.
    ///
    /// # Errors
    ///
    /// Returns `INVALID_RESPONSE_FORMAT` when the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let result = match &self.data {
            ResponseBody::Json(value) => serde_json::from_value(value.clone()),
            ResponseBody::Text(text) => serde_json::from_str(text),
            ResponseBody::Bytes(bytes) => serde_json::from_slice(bytes),
            ResponseBody::Empty => serde_json::from_value(Value::Null),
        };
        result.map_err(|e| {
            let mut error = ApiError::new(
                ErrorCode::InvalidResponseFormat,
                format!("Response body could not be decoded: {e}"),
            )
            .with_status(self.meta.status)
            .with_original_error(&e);
            error.request_id = self.meta.request_id.clone();
            error
        })
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Service {
        id: u32,
        name: String,
    }

    fn response(data: ResponseBody) -> ApiResponse {
        ApiResponse::new(data, ResponseMeta { status: 200, attempts: 1, ..Default::default() })
    }

    /// Validates `ApiResponse::json` behavior for the typed decode scenario.
    ///
    /// Assertions:
    /// - Confirms JSON and text bodies decode into a struct.
    #[test]
    fn test_json_decode() {
        let body = json!({ "id": 1, "name": "Cut" });
        let decoded: Service = response(ResponseBody::Json(body)).json().unwrap();
        assert_eq!(decoded, Service { id: 1, name: "Cut".into() });

        let from_text: Service =
            response(ResponseBody::Text(r#"{"id":2,"name":"Dye"}"#.into())).json().unwrap();
        assert_eq!(from_text.id, 2);
    }

    /// Validates `ApiResponse::json` behavior for mismatched bodies.
    ///
    /// Assertions:
    /// - Ensures a mismatch yields `INVALID_RESPONSE_FORMAT`.
    /// - Ensures empty bodies decode into `Option`.
    #[test]
    fn test_json_decode_errors_and_empty() {
        let err = response(ResponseBody::Text("plain".into())).json::<Service>().unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidResponseFormat);
        assert_eq!(err.status_code, Some(200));

        let empty: Option<Service> = response(ResponseBody::Empty).json().unwrap();
        assert!(empty.is_none());
    }

    /// Validates `ApiResponse::cached` behavior for the cache flag scenario.
    ///
    /// Assertions:
    /// - Ensures the copy is flagged and the original untouched.
    #[test]
    fn test_cached_copy() {
        let original = response(ResponseBody::Empty);
        let cached = original.cached();
        assert!(cached.meta.from_cache);
        assert!(!original.meta.from_cache);
        assert!(cached.success);
    }
}
