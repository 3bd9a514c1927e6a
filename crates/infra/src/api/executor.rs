//! Request executor
//!
//! Turns a resolved [`Request`] into an [`ApiResponse`]:
//!
//! 1. per-call options are merged over the client defaults
//! 2. request interceptors run (auth header, static headers, custom)
//! 3. the transport is called under a per-attempt timeout
//! 4. failures are classified and retried with exponential backoff
//! 5. the body is decoded by `Content-Type`
//! 6. response interceptors run; a `401` first goes through one
//!    refresh-and-reissue cycle
//!
//! Rate limiting and caching happen one level up in
//! [`ApiClient`](super::client::ApiClient).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use hubwire_common::resilience::{BackoffSchedule, ExponentialBackoff, RetryDecision, RetryPolicy};
use hubwire_domain::{
    merge_options, ApiError, ApiResponse, ApiResult, ClientConfig, ErrorCode, HttpMethod,
    MultipartForm, RateLimitDetails, RateLimitMeta, Request, RequestBody, RequestOptions,
    ResponseBody, ResponseMeta, ResponseType,
};
use parking_lot::RwLock;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use super::auth::AuthProvider;
use super::interceptors::{
    AuthHeaderInterceptor, ErrorOutcome, Interceptor, InterceptorChain, AUTH_PRIORITY,
};
use crate::http::{Transport, TransportRequest, TransportResponse};

const DEFAULT_ACCEPT: &str = "application/json, text/plain, */*";

/// Longest server `Retry-After` a single call waits through
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Retry rule applied to every attempt
///
/// Stops once `max_retries` retries were spent or the error is final
/// (`401`, `403`, `404`, `422` and locally raised errors). A server
/// `Retry-After` longer than `max_retry_after` also stops the call so the
/// caller sees the `429` and its hint instead of blocking.
#[derive(Debug, Clone, Copy)]
pub struct StatusRetryPolicy {
    /// Retries allowed after the first attempt
    pub max_retries: u32,
    /// Longest server-requested wait the executor sleeps through
    pub max_retry_after: Duration,
}

impl StatusRetryPolicy {
    /// Policy with the default [`MAX_RETRY_AFTER`] ceiling
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries, max_retry_after: MAX_RETRY_AFTER }
    }
}

impl RetryPolicy<ApiError> for StatusRetryPolicy {
    fn should_retry(&self, error: &ApiError, attempt: u32) -> RetryDecision {
        if attempt >= self.max_retries || !error.is_retryable() {
            return RetryDecision::Stop;
        }
        match error.retry_after_hint() {
            Some(wait) if wait > self.max_retry_after => {
                warn!(
                    retry_after_secs = wait.as_secs(),
                    max_secs = self.max_retry_after.as_secs(),
                    "Server retry-after exceeds ceiling, giving up"
                );
                RetryDecision::Stop
            }
            Some(wait) if !wait.is_zero() => RetryDecision::RetryAfter(wait),
            _ => RetryDecision::Retry,
        }
    }
}

/// Executes requests against one base URL
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    auth: Option<Arc<dyn AuthProvider>>,
    interceptors: RwLock<InterceptorChain>,
    base_url: Url,
    defaults: RequestOptions,
    retry_jitter: Duration,
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("base_url", &self.base_url.as_str())
            .field("interceptors", &self.interceptors.read().len())
            .field("auth", &self.auth.is_some())
            .finish()
    }
}

impl RequestExecutor {
    /// Create an executor for `config.base_url`
    ///
    /// # Errors
    ///
    /// Returns `CONFIGURATION_ERROR` when the base URL does not parse.
    pub fn new(config: &ClientConfig, transport: Arc<dyn Transport>) -> ApiResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ApiError::configuration(format!("baseURL is invalid: {e}")))?;
        Ok(Self {
            transport,
            auth: None,
            interceptors: RwLock::new(InterceptorChain::new()),
            base_url,
            defaults: config.default_options(),
            retry_jitter: config.retry_jitter(),
        })
    }

    /// Attach bearer tokens from `provider` and enable the `401` refresh path
    pub fn with_auth(mut self, provider: Arc<dyn AuthProvider>) -> Self {
        self.interceptors.get_mut().add(
            AUTH_PRIORITY,
            Interceptor::RequestTransform(Arc::new(AuthHeaderInterceptor::new(Arc::clone(
                &provider,
            )))),
        );
        self.auth = Some(provider);
        self
    }

    /// Register an interceptor; lower priorities run first
    pub fn add_interceptor(&self, priority: i32, interceptor: Interceptor) {
        self.interceptors.write().add(priority, interceptor);
    }

    /// Root every relative path is joined onto
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Client-wide defaults every call is merged over
    pub fn defaults(&self) -> &RequestOptions {
        &self.defaults
    }

    /// Merge `options` over the defaults and build the request
    pub fn resolve(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<RequestBody>,
        options: &RequestOptions,
    ) -> Request {
        Request::from_options(method, path, body, merge_options(&self.defaults, options))
    }

    /// Execute one logical call
    ///
    /// # Errors
    ///
    /// Returns the final [`ApiError`] once retries are exhausted or a final
    /// error occurs.
    #[instrument(skip(self, body, options), fields(method = %method, path = %path))]
    pub async fn execute(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<RequestBody>,
        options: &RequestOptions,
    ) -> ApiResult<ApiResponse> {
        let request = self.resolve(method, path, body, options);
        self.dispatch(request).await
    }

    /// Execute an already-resolved request
    ///
    /// # Errors
    ///
    /// See [`RequestExecutor::execute`].
    pub async fn dispatch(&self, request: Request) -> ApiResult<ApiResponse> {
        let chain = self.interceptors.read().clone();

        let outcome = match self.issue(&chain, &request).await {
            Err(error) if error.code == ErrorCode::Unauthorized => {
                self.refresh_and_reissue(&chain, &request, error).await
            }
            other => other,
        };

        match outcome {
            Ok(response) => chain.run_response(response).await,
            Err(error) => match chain.run_error(&request, error).await {
                ErrorOutcome::Propagate(error) => Err(error),
                ErrorOutcome::Recover(response) => {
                    debug!(path = %request.path, "Error interceptor recovered the call");
                    Ok(response)
                }
            },
        }
    }

    /// Send a multipart form with `POST`
    ///
    /// The default JSON content type is dropped so the transport can set the
    /// multipart boundary.
    ///
    /// # Errors
    ///
    /// See [`RequestExecutor::execute`].
    #[instrument(skip(self, form, options), fields(path = %path, files = form.files.len()))]
    pub async fn upload(
        &self,
        path: &str,
        form: MultipartForm,
        options: &RequestOptions,
    ) -> ApiResult<ApiResponse> {
        let request = self.resolve(HttpMethod::Post, path, Some(RequestBody::Multipart(form)), options);
        self.dispatch(request).await
    }

    /// Fetch a binary resource, optionally writing it to `destination`
    ///
    /// # Errors
    ///
    /// Returns `DOWNLOAD_FAILED` for any failed fetch or write.
    #[instrument(skip(self, options), fields(path = %path))]
    pub async fn download(
        &self,
        path: &str,
        destination: Option<&Path>,
        options: &RequestOptions,
    ) -> ApiResult<ApiResponse> {
        let options = options.clone().response_type(ResponseType::Bytes);
        let request = self.resolve(HttpMethod::Get, path, None, &options);
        let response = self.dispatch(request).await.map_err(download_failed)?;

        if let Some(destination) = destination {
            let bytes = response.data.to_bytes();
            tokio::fs::write(destination, &bytes).await.map_err(|e| {
                let mut error = ApiError::new(
                    ErrorCode::DownloadFailed,
                    format!("Failed to write {}: {e}", destination.display()),
                )
                .with_status(response.meta.status)
                .with_attempts(response.meta.attempts)
                .with_original_error(&e);
                error.request_id = response.meta.request_id.clone();
                error
            })?;
            info!(destination = %destination.display(), bytes = bytes.len(), "Download saved");
        }
        Ok(response)
    }

    async fn refresh_and_reissue(
        &self,
        chain: &InterceptorChain,
        request: &Request,
        unauthorized: ApiError,
    ) -> ApiResult<ApiResponse> {
        let Some(auth) = &self.auth else {
            return Err(unauthorized);
        };

        info!(path = %request.path, "Received 401, refreshing credentials");
        if let Err(refresh_error) = auth.refresh().await {
            warn!(error = %refresh_error, "Credential refresh failed");
            return Err(authentication_required(&unauthorized, &refresh_error));
        }

        match self.issue(chain, request).await {
            Err(error) if error.code == ErrorCode::Unauthorized => {
                warn!(path = %request.path, "Request still unauthorized after refresh");
                Err(authentication_required(&error, &error))
            }
            other => other,
        }
    }

    /// Run request interceptors, then send with retries
    async fn issue(&self, chain: &InterceptorChain, request: &Request) -> ApiResult<ApiResponse> {
        let prepared = chain.run_request(request.clone()).await?;
        let outgoing = self.transport_request(&prepared)?;
        self.send_with_retry(&prepared, outgoing).await
    }

    async fn send_with_retry(
        &self,
        request: &Request,
        outgoing: TransportRequest,
    ) -> ApiResult<ApiResponse> {
        let policy = StatusRetryPolicy::new(request.max_retries);
        let mut schedule = BackoffSchedule::new(
            ExponentialBackoff::new(request.retry_delay)
                .with_max_jitter(self.retry_jitter)
                .with_max_delay(policy.max_retry_after),
        );
        let mut attempt: u32 = 0;

        loop {
            let attempts = attempt + 1;
            debug!(attempt = attempts, url = %outgoing.url, "Sending attempt");

            let error = match self.attempt(request, outgoing.clone(), attempts).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };

            let delay = match policy.should_retry(&error, attempt) {
                RetryDecision::Stop => return Err(finalize(error, attempts)),
                RetryDecision::Retry => schedule.next_delay(attempt, None),
                RetryDecision::RetryAfter(wait) => schedule.next_delay(attempt, Some(wait)),
            };

            warn!(
                attempt = attempts,
                code = %error.code,
                status = ?error.status_code,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Request failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn attempt(
        &self,
        request: &Request,
        outgoing: TransportRequest,
        attempts: u32,
    ) -> ApiResult<ApiResponse> {
        let cancel = CancellationToken::new();
        let exchange = self.transport.send(outgoing, cancel.clone());

        let response = match tokio::time::timeout(request.timeout, exchange).await {
            Ok(result) => result.map_err(ApiError::from)?,
            Err(_) => {
                cancel.cancel();
                debug!(attempt = attempts, timeout = ?request.timeout, "Attempt timed out");
                return Err(ApiError::timeout(request.timeout));
            }
        };

        into_api_response(request.response_type, response, attempts)
    }

    fn transport_request(&self, request: &Request) -> ApiResult<TransportRequest> {
        let url = self.build_url(&request.path, &request.query_pairs())?;

        let mut headers = request.headers.clone();
        let default_content_type = match &request.body {
            Some(body) if body.suppresses_default_content_type() => {
                headers.remove("content-type");
                None
            }
            Some(RequestBody::Json(_)) => Some("application/json"),
            Some(RequestBody::Text(_)) => Some("text/plain; charset=utf-8"),
            Some(RequestBody::Bytes(_)) => Some("application/octet-stream"),
            Some(RequestBody::Multipart(_)) | None => None,
        };
        if let Some(content_type) = default_content_type {
            headers.entry("content-type".to_string()).or_insert_with(|| content_type.to_string());
        }
        headers.entry("accept".to_string()).or_insert_with(|| DEFAULT_ACCEPT.to_string());

        Ok(TransportRequest { method: request.method, url, headers, body: request.body.clone() })
    }

    /// Join `path` onto the base URL and append the query
    ///
    /// Absolute `http(s)` paths are used as-is.
    pub fn build_url(&self, path: &str, query: &[(String, String)]) -> ApiResult<Url> {
        let parsed = if path.starts_with("http://") || path.starts_with("https://") {
            Url::parse(path)
        } else {
            let base = self.base_url.as_str().trim_end_matches('/');
            Url::parse(&format!("{base}/{}", path.trim_start_matches('/')))
        };
        let mut url = parsed
            .map_err(|e| ApiError::invalid_request(format!("Invalid URL for '{path}': {e}")))?;

        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }
}

fn into_api_response(
    response_type: ResponseType,
    response: TransportResponse,
    attempts: u32,
) -> ApiResult<ApiResponse> {
    let status = response.status;
    let request_id = response.header("x-request-id").map(str::to_string);
    let rate_limit = rate_limit_meta(&response);
    let content_type = response.header("content-type").map(str::to_string);

    if !(200..300).contains(&status) {
        let body = error_body(&response.body);
        let mut error = ApiError::from_status(status, body, request_id);
        if status == 429 {
            let meta = rate_limit.unwrap_or_default();
            error = error.with_rate_limit(RateLimitDetails {
                retry_after: meta.retry_after.unwrap_or(0),
                limit: meta.limit,
                remaining: meta.remaining.unwrap_or(0),
                reset: meta.reset,
                burst: false,
                local: false,
            });
        }
        return Err(error);
    }

    let data = parse_body(response_type, content_type.as_deref(), response.body).map_err(|e| {
        let mut error = e.with_status(status).with_attempts(attempts);
        error.request_id = request_id.clone();
        error
    })?;

    let meta = ResponseMeta {
        request_id: Some(request_id.unwrap_or_else(|| Uuid::new_v4().to_string())),
        rate_limit,
        status,
        attempts,
        from_cache: false,
    };
    Ok(ApiResponse::new(data, meta))
}

/// Decode a 2xx body
///
/// # Errors
///
/// Returns `INVALID_RESPONSE_FORMAT` when the body does not match the
/// declared or requested format.
pub fn parse_body(
    response_type: ResponseType,
    content_type: Option<&str>,
    body: Vec<u8>,
) -> ApiResult<ResponseBody> {
    if body.is_empty() {
        return Ok(ResponseBody::Empty);
    }

    let kind = match response_type {
        ResponseType::Auto => {
            let mime = content_type
                .and_then(|value| value.split(';').next())
                .map(|value| value.trim().to_ascii_lowercase())
                .unwrap_or_default();
            if mime == "application/json" || mime.ends_with("+json") {
                ResponseType::Json
            } else if mime.starts_with("text/") {
                ResponseType::Text
            } else {
                ResponseType::Bytes
            }
        }
        explicit => explicit,
    };

    match kind {
        ResponseType::Json => serde_json::from_slice(&body).map(ResponseBody::Json).map_err(|e| {
            ApiError::new(ErrorCode::InvalidResponseFormat, format!("Invalid JSON response: {e}"))
                .with_original_error(&e)
        }),
        ResponseType::Text => String::from_utf8(body).map(ResponseBody::Text).map_err(|e| {
            ApiError::new(ErrorCode::InvalidResponseFormat, "Response text is not valid UTF-8")
                .with_original_error(&e)
        }),
        ResponseType::Bytes | ResponseType::Auto => Ok(ResponseBody::Bytes(body)),
    }
}

fn error_body(body: &[u8]) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    serde_json::from_slice(body)
        .ok()
        .or_else(|| Some(Value::String(String::from_utf8_lossy(body).into_owned())))
}

/// Server rate-limit headers, `None` when none were sent
pub fn rate_limit_meta(response: &TransportResponse) -> Option<RateLimitMeta> {
    let meta = RateLimitMeta {
        limit: response.header("x-ratelimit-limit").and_then(|v| v.trim().parse().ok()),
        remaining: response.header("x-ratelimit-remaining").and_then(|v| v.trim().parse().ok()),
        reset: response.header("x-ratelimit-reset").map(str::to_string),
        retry_after: response.header("retry-after").and_then(parse_retry_after),
    };
    (!meta.is_empty()).then_some(meta)
}

/// `Retry-After` in whole seconds; fractional values round up
fn parse_retry_after(value: &str) -> Option<u64> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(secs);
    }
    let secs = value.parse::<f64>().ok().filter(|s| s.is_finite() && *s >= 0.0)?;
    Some(Duration::from_secs_f64(secs).as_millis().div_ceil(1000).try_into().unwrap_or(u64::MAX))
}

fn finalize(mut error: ApiError, attempts: u32) -> ApiError {
    if error.original_error.is_none() {
        error.original_error = Some(error.to_string());
    }
    if attempts > 1 {
        warn!(attempts, code = %error.code, "Request failed after retries");
    }
    error.with_attempts(attempts)
}

fn authentication_required(cause: &ApiError, refresh_error: &ApiError) -> ApiError {
    let mut error = ApiError::new(ErrorCode::AuthenticationRequired, "Authentication required")
        .with_status(401)
        .with_attempts(cause.attempts)
        .with_original_error(refresh_error);
    error.request_id = cause.request_id.clone();
    error
}

fn download_failed(cause: ApiError) -> ApiError {
    if cause.code == ErrorCode::DownloadFailed {
        return cause;
    }
    let mut error =
        ApiError::new(ErrorCode::DownloadFailed, format!("Download failed: {}", cause.message))
            .with_attempts(cause.attempts)
            .with_original_error(&cause);
    error.status_code = cause.status_code;
    error.request_id = cause.request_id;
    error.details = cause.details;
    error
}
