//! Outgoing request model and per-call options

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Query parameters; arrays repeat the key and `null` values are omitted
pub type Params = BTreeMap<String, Value>;

/// Header map with lowercase names
pub type Headers = BTreeMap<String, String>;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl HttpMethod {
    /// Upper-case method name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the response body should be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Decide from `Content-Type`
    #[default]
    Auto,
    /// Always parse as JSON
    Json,
    /// Always decode as UTF-8 text
    Text,
    /// Keep raw bytes
    Bytes,
}

/// One file in a multipart upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Form field name
    pub field_name: String,
    /// File name reported to the server
    pub file_name: String,
    /// MIME type, `application/octet-stream` when absent
    pub content_type: Option<String>,
    /// File contents
    pub bytes: Vec<u8>,
}

impl FilePart {
    /// File part with no explicit content type
    pub fn new(field_name: impl Into<String>, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            field_name: field_name.into(),
            file_name: file_name.into(),
            content_type: None,
            bytes,
        }
    }

    /// Set the MIME type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Multipart form: text fields plus file parts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    /// Text fields in insertion order
    pub fields: Vec<(String, String)>,
    /// File parts in insertion order
    pub files: Vec<FilePart>,
}

impl MultipartForm {
    /// Empty form
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text field
    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Add a file part
    pub fn file(mut self, part: FilePart) -> Self {
        self.files.push(part);
        self
    }
}

/// Request payload
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Serialized as JSON with `content-type: application/json`
    Json(Value),
    /// Sent as-is with `content-type: text/plain` unless overridden
    Text(String),
    /// Sent as-is
    Bytes(Vec<u8>),
    /// Multipart form; the transport supplies the boundary header
    Multipart(MultipartForm),
}

impl RequestBody {
    /// Whether the default JSON content type must be left off
    pub fn suppresses_default_content_type(&self) -> bool {
        matches!(self, Self::Multipart(_))
    }
}

/// Per-call overrides; `None` fields inherit the client defaults
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    /// Per-attempt timeout
    pub timeout: Option<Duration>,
    /// Retries after the first attempt
    pub retries: Option<u32>,
    /// Base backoff delay
    pub retry_delay: Option<Duration>,
    /// Extra headers, unioned with the defaults
    pub headers: Headers,
    /// Query parameters
    pub params: Params,
    /// Bypass the response cache for this call
    pub skip_cache: bool,
    /// Cache TTL for this response, in place of the cache default
    pub cache_ttl: Option<Duration>,
    /// Body decoding
    pub response_type: Option<ResponseType>,
}

impl RequestOptions {
    /// Empty options
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the retry count
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Override the base backoff delay
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Add a header
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Add a query parameter
    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Skip the cache for this call
    pub fn skip_cache(mut self) -> Self {
        self.skip_cache = true;
        self
    }

    /// Cache this response for `ttl`
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Force a body decoding
    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }
}

/// Merge per-call options over client defaults
///
/// Per-call values win; header and parameter maps are unioned with per-call
/// entries replacing defaults of the same (case-insensitive) header name.
pub fn merge_options(defaults: &RequestOptions, overrides: &RequestOptions) -> RequestOptions {
    let mut headers: Headers =
        defaults.headers.iter().map(|(k, v)| (k.to_ascii_lowercase(), v.clone())).collect();
    headers.extend(overrides.headers.iter().map(|(k, v)| (k.to_ascii_lowercase(), v.clone())));

    let mut params = defaults.params.clone();
    params.extend(overrides.params.iter().map(|(k, v)| (k.clone(), v.clone())));

    RequestOptions {
        timeout: overrides.timeout.or(defaults.timeout),
        retries: overrides.retries.or(defaults.retries),
        retry_delay: overrides.retry_delay.or(defaults.retry_delay),
        headers,
        params,
        skip_cache: overrides.skip_cache || defaults.skip_cache,
        cache_ttl: overrides.cache_ttl.or(defaults.cache_ttl),
        response_type: overrides.response_type.or(defaults.response_type),
    }
}

/// A fully-resolved request, as seen by interceptors and the transport
///
/// Interceptors take a `Request` by value and return a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// HTTP method
    pub method: HttpMethod,
    /// Path relative to the base URL
    pub path: String,
    /// Query parameters
    pub params: Params,
    /// Optional payload
    pub body: Option<RequestBody>,
    /// Lowercase header names
    pub headers: Headers,
    /// Per-attempt timeout
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base backoff delay
    pub retry_delay: Duration,
    /// Bypass the response cache
    pub skip_cache: bool,
    /// Body decoding
    pub response_type: ResponseType,
}

impl Request {
    /// Build a request from resolved options
    ///
    /// Missing timeout/retry values fall back to the client defaults from
    /// [`crate::config`].
    pub fn from_options(
        method: HttpMethod,
        path: impl Into<String>,
        body: Option<RequestBody>,
        options: RequestOptions,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            params: options.params,
            body,
            headers: options.headers,
            timeout: options
                .timeout
                .unwrap_or(Duration::from_millis(crate::config::DEFAULT_TIMEOUT_MS)),
            max_retries: options.retries.unwrap_or(crate::config::DEFAULT_RETRIES),
            retry_delay: options
                .retry_delay
                .unwrap_or(Duration::from_millis(crate::config::DEFAULT_RETRY_DELAY_MS)),
            skip_cache: options.skip_cache,
            response_type: options.response_type.unwrap_or_default(),
        }
    }

    /// Return a copy with `name` set to `value`
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers.insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Return a copy without the header `name`
    pub fn without_header(mut self, name: &str) -> Self {
        self.headers.remove(&name.to_ascii_lowercase());
        self
    }

    /// Return a copy with query parameter `name` set
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Query pairs in key order; arrays repeat the key, `null` is omitted
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for (key, value) in &self.params {
            match value {
                Value::Null => {}
                Value::Array(items) => {
                    pairs.extend(
                        items
                            .iter()
                            .filter_map(scalar_to_query)
                            .map(|item| (key.clone(), item)),
                    );
                }
                other => {
                    if let Some(item) = scalar_to_query(other) {
                        pairs.push((key.clone(), item));
                    }
                }
            }
        }
        pairs
    }
}

fn scalar_to_query(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        nested => Some(nested.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    /// Validates `merge_options` behavior for the precedence scenario.
    ///
    /// Assertions:
    /// - Ensures per-call values win.
    /// - Ensures header maps are unioned case-insensitively.
    /// - Ensures unset per-call values inherit defaults.
    #[test]
    fn test_merge_options_precedence() {
        let defaults = RequestOptions::new()
            .timeout(Duration::from_secs(30))
            .retries(3)
            .header("Accept-Language", "pl")
            .header("X-Client", "hubwire");
        let call = RequestOptions::new().retries(0).header("x-client", "override");

        let merged = merge_options(&defaults, &call);
        assert_eq!(merged.timeout, Some(Duration::from_secs(30)));
        assert_eq!(merged.retries, Some(0));
        assert_eq!(merged.headers.len(), 2);
        assert_eq!(merged.headers["x-client"], "override");
        assert_eq!(merged.headers["accept-language"], "pl");
    }

    /// Validates `Request::query_pairs` behavior for arrays and nulls.
    ///
    /// Assertions:
    /// - Ensures arrays repeat the key.
    /// - Ensures null values and null array items are omitted.
    #[test]
    fn test_query_pairs() {
        let request = Request::from_options(
            HttpMethod::Get,
            "/services",
            None,
            RequestOptions::new()
                .param("ids", json!([1, 2, null]))
                .param("q", "hair cut")
                .param("deleted", Value::Null)
                .param("active", true),
        );

        assert_eq!(
            request.query_pairs(),
            vec![
                ("active".to_string(), "true".to_string()),
                ("ids".to_string(), "1".to_string()),
                ("ids".to_string(), "2".to_string()),
                ("q".to_string(), "hair cut".to_string()),
            ]
        );
    }

    /// Validates `Request::with_header` behavior for the builder scenario.
    ///
    /// Assertions:
    /// - Ensures header names are case-insensitive.
    /// - Ensures the builder returns a new value.
    #[test]
    fn test_request_builders() {
        let request = Request::from_options(HttpMethod::Post, "/x", None, RequestOptions::new());
        let updated = request.clone().with_header("Authorization", "Bearer t").with_param("a", 1);

        assert_eq!(updated.header("authorization"), Some("Bearer t"));
        assert_eq!(request.header("authorization"), None);
        assert_eq!(updated.params["a"], json!(1));
        assert_eq!(updated.without_header("AUTHORIZATION").header("authorization"), None);
    }

    /// Validates `Request::from_options` behavior for the fallback defaults
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms library defaults apply when options leave values unset.
    #[test]
    fn test_from_options_defaults() {
        let request = Request::from_options(HttpMethod::Get, "/", None, RequestOptions::new());
        assert_eq!(request.timeout, Duration::from_secs(30));
        assert_eq!(request.max_retries, 3);
        assert_eq!(request.response_type, ResponseType::Auto);
        assert_eq!(HttpMethod::Patch.to_string(), "PATCH");
    }
}
