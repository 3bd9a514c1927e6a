//! API client: rate limiting, response caching and execution
//!
//! Every call runs the same pipeline:
//!
//! 1. admission control through the [`RateLimiter`] (may reject locally)
//! 2. cache lookup for `GET` requests (may short-circuit)
//! 3. [`RequestExecutor`] with interceptors, retry and backoff
//! 4. cache population for successful `GET` requests

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hubwire_common::cache::{CacheConfig, EvictionPolicy, MultiLevelCacheManager, MultiLevelStats};
use hubwire_common::rate_limit::{
    AdvancedRateLimitManager, BurstConfig, RateLimitConfig, RateLimitManager, RateLimitStatus,
    RateLimiter,
};
use hubwire_common::resilience::{SharedClock, SystemClock};
use hubwire_domain::{
    ApiError, ApiResponse, ApiResult, CacheSettings, CacheStrategy, ClientConfig, HttpMethod,
    MultipartForm, Params, RequestBody, RequestOptions,
};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::auth::AuthProvider;
use super::executor::RequestExecutor;
use super::interceptors::{Interceptor, StaticHeadersInterceptor, STATIC_HEADERS_PRIORITY};
use crate::errors::IntoApiError;
use crate::http::{ReqwestTransport, Transport};
use crate::observability::log_request_outcome;

/// Response cache keyed by `GET:<path>[?<params>]`
pub type ResponseCache = MultiLevelCacheManager<String, ApiResponse, SharedClock>;

/// Prefix of every response cache key
pub const CACHE_KEY_PREFIX: &str = "GET:";

/// Client facade over the request pipeline
pub struct ApiClient {
    config: ClientConfig,
    executor: RequestExecutor,
    rate_limiter: Arc<dyn RateLimiter>,
    cache: ResponseCache,
    destroyed: AtomicBool,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.config.base_url)
            .field("executor", &self.executor)
            .field("destroyed", &self.destroyed.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client with the default transport and system clock
    ///
    /// # Errors
    ///
    /// Returns `CONFIGURATION_ERROR` when the configuration is invalid or
    /// the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        Self::builder().config(config).build()
    }

    /// Create a builder for fluent configuration
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Active configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Register an interceptor; lower priorities run first
    pub fn add_interceptor(&self, priority: i32, interceptor: Interceptor) {
        self.executor.add_interceptor(priority, interceptor);
    }

    /// Run one call through the whole pipeline
    ///
    /// # Errors
    ///
    /// - `SDK_NOT_INITIALIZED` after [`ApiClient::destroy`]
    /// - `RATE_LIMIT_EXCEEDED` from the local limiter, before any I/O
    /// - any executor error
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<RequestBody>,
        options: &RequestOptions,
    ) -> ApiResult<ApiResponse> {
        self.ensure_active()?;
        let started = Instant::now();
        let result = self.run_pipeline(method, path, body, options).await;
        log_request_outcome(method, path, &result, started.elapsed());
        result
    }

    #[instrument(skip(self, body, options), fields(method = %method, path = %path))]
    async fn run_pipeline(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<RequestBody>,
        options: &RequestOptions,
    ) -> ApiResult<ApiResponse> {
        self.admit(path)?;

        let cache_key = (method == HttpMethod::Get && !options.skip_cache)
            .then(|| cache_key(path, &options.params));

        if let Some(key) = &cache_key {
            if let Some(cached) = self.cache.get(key) {
                debug!(key = %key, "Serving response from cache");
                return Ok(cached.cached());
            }
        }

        let response = self.executor.execute(method, path, body, options).await?;

        if let Some(key) = cache_key {
            self.cache.set(key, response.clone(), options.cache_ttl);
        }
        Ok(response)
    }

    /// `GET path`
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn get(&self, path: &str, options: &RequestOptions) -> ApiResult<ApiResponse> {
        self.request(HttpMethod::Get, path, None, options).await
    }

    /// `POST path` with a JSON body
    ///
    /// # Errors
    ///
    /// Returns `INVALID_REQUEST` when `body` does not serialize; otherwise see
    /// [`ApiClient::request`].
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: &RequestOptions,
    ) -> ApiResult<ApiResponse> {
        self.request(HttpMethod::Post, path, Some(json_body(body)?), options).await
    }

    /// `PUT path` with a JSON body
    ///
    /// # Errors
    ///
    /// See [`ApiClient::post`].
    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: &RequestOptions,
    ) -> ApiResult<ApiResponse> {
        self.request(HttpMethod::Put, path, Some(json_body(body)?), options).await
    }

    /// `PATCH path` with a JSON body
    ///
    /// # Errors
    ///
    /// See [`ApiClient::post`].
    pub async fn patch<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        options: &RequestOptions,
    ) -> ApiResult<ApiResponse> {
        self.request(HttpMethod::Patch, path, Some(json_body(body)?), options).await
    }

    /// `DELETE path`
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn delete(&self, path: &str, options: &RequestOptions) -> ApiResult<ApiResponse> {
        self.request(HttpMethod::Delete, path, None, options).await
    }

    /// Multipart upload; rate limited, never cached
    ///
    /// # Errors
    ///
    /// See [`ApiClient::request`].
    pub async fn upload(
        &self,
        path: &str,
        form: MultipartForm,
        options: &RequestOptions,
    ) -> ApiResult<ApiResponse> {
        self.ensure_active()?;
        self.admit(path)?;
        let started = Instant::now();
        let result = self.executor.upload(path, form, options).await;
        log_request_outcome(HttpMethod::Post, path, &result, started.elapsed());
        result
    }

    /// Binary download; rate limited, never cached
    ///
    /// # Errors
    ///
    /// Returns `DOWNLOAD_FAILED` when the fetch or the file write fails.
    pub async fn download(
        &self,
        path: &str,
        destination: Option<&Path>,
        options: &RequestOptions,
    ) -> ApiResult<ApiResponse> {
        self.ensure_active()?;
        self.admit(path)?;
        let started = Instant::now();
        let result = self.executor.download(path, destination, options).await;
        log_request_outcome(HttpMethod::Get, path, &result, started.elapsed());
        result
    }

    /// Drop cached `GET` responses whose path starts with `path_prefix`
    pub fn invalidate(&self, path_prefix: &str) -> usize {
        let removed = self.cache.remove_where(|key: &String| {
            key.strip_prefix(CACHE_KEY_PREFIX).is_some_and(|rest| rest.starts_with(path_prefix))
        });
        debug!(prefix = %path_prefix, removed, "Invalidated cached responses");
        removed
    }

    /// Drop every cached response and reset cache statistics
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Per-level cache statistics
    pub fn cache_stats(&self) -> MultiLevelStats {
        self.cache.stats()
    }

    /// Remaining local quota for `path`, or the tightest bucket when `None`
    pub fn rate_limit_status(&self, path: Option<&str>) -> RateLimitStatus {
        self.rate_limiter.status(path)
    }

    /// Stop background sweeps and release state
    ///
    /// Every later call fails with `SDK_NOT_INITIALIZED`. Calling `destroy`
    /// twice is a no-op.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cache.destroy();
        self.rate_limiter.destroy();
        info!(base_url = %self.config.base_url, "API client destroyed");
    }

    /// True once [`ApiClient::destroy`] ran
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn ensure_active(&self) -> ApiResult<()> {
        if self.is_destroyed() {
            return Err(ApiError::not_initialized());
        }
        Ok(())
    }

    fn admit(&self, path: &str) -> ApiResult<()> {
        self.rate_limiter.check_limit(path).map(|_| ()).map_err(IntoApiError::into_api_error)
    }
}

impl Drop for ApiClient {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Cache key for a `GET`: path plus the serialized query parameters
pub fn cache_key(path: &str, params: &Params) -> String {
    if params.is_empty() {
        return format!("{CACHE_KEY_PREFIX}{path}");
    }
    let query = serde_json::to_string(params).unwrap_or_default();
    format!("{CACHE_KEY_PREFIX}{path}?{query}")
}

fn json_body<B: Serialize + ?Sized>(body: &B) -> ApiResult<RequestBody> {
    serde_json::to_value(body)
        .map(RequestBody::Json)
        .map_err(|e| ApiError::invalid_request(format!("Failed to serialize body: {e}")))
}

fn cache_config(settings: &CacheSettings) -> CacheConfig {
    CacheConfig::builder()
        .enabled(settings.enabled)
        .ttl_secs(settings.ttl)
        .max_size(settings.max_size)
        .eviction_policy(match settings.strategy {
            CacheStrategy::Lru => EvictionPolicy::Lru,
            CacheStrategy::Fifo => EvictionPolicy::Fifo,
        })
        .cleanup_interval(Duration::from_millis(settings.cleanup_interval_ms))
        .build()
}

/// Builder for [`ApiClient`]
#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<ClientConfig>,
    transport: Option<Arc<dyn Transport>>,
    auth: Option<Arc<dyn AuthProvider>>,
    clock: Option<SharedClock>,
    interceptors: Vec<(i32, Interceptor)>,
    static_headers: Vec<(String, String)>,
}

impl ApiClientBuilder {
    /// Set the client configuration (required)
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the default [`ReqwestTransport`]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the authentication provider
    pub fn auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Time source for cache TTLs and rate windows
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Register an interceptor
    pub fn interceptor(mut self, priority: i32, interceptor: Interceptor) -> Self {
        self.interceptors.push((priority, interceptor));
        self
    }

    /// Header added to every request that does not set it
    pub fn static_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.static_headers.push((name.into(), value.into()));
        self
    }

    /// Build the API client
    ///
    /// Background sweeps start when a tokio runtime is available; without
    /// one, expired entries and idle buckets are still dropped lazily.
    ///
    /// # Errors
    ///
    /// Returns `CONFIGURATION_ERROR` if the configuration is missing or
    /// invalid, or the default transport cannot be built.
    pub fn build(self) -> ApiResult<ApiClient> {
        let config = self
            .config
            .ok_or_else(|| ApiError::configuration("Client configuration not set"))?;
        config.validate()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new().map_err(|e| {
                ApiError::configuration(format!("Failed to build HTTP transport: {e}"))
            })?),
        };
        let clock: SharedClock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let sweeps_enabled = tokio::runtime::Handle::try_current().is_ok();

        let mut executor = RequestExecutor::new(&config, transport)?;
        if let Some(auth) = self.auth {
            executor = executor.with_auth(auth);
        }
        if !self.static_headers.is_empty() {
            executor.add_interceptor(
                STATIC_HEADERS_PRIORITY,
                Interceptor::request(StaticHeadersInterceptor::new(self.static_headers)),
            );
        }
        for (priority, interceptor) in self.interceptors {
            executor.add_interceptor(priority, interceptor);
        }

        let rate_limiter = build_rate_limiter(&config, &clock, sweeps_enabled);

        let cache = ResponseCache::with_clock(
            cache_config(&config.cache),
            config.l2_cache.as_ref().map(cache_config),
            Arc::clone(&clock),
        );
        if sweeps_enabled {
            if let Err(e) = cache.start_cleanup() {
                warn!(error = %e, "Cache sweep not started");
            }
        } else {
            warn!("No tokio runtime; background sweeps disabled");
        }

        info!(
            base_url = %config.base_url,
            retries = config.retries,
            cache_enabled = config.cache.enabled,
            burst_limit = config.burst_rate_limit.is_some(),
            "API client initialized"
        );

        Ok(ApiClient { config, executor, rate_limiter, cache, destroyed: AtomicBool::new(false) })
    }
}

fn build_rate_limiter(
    config: &ClientConfig,
    clock: &SharedClock,
    start_sweep: bool,
) -> Arc<dyn RateLimiter> {
    let regular = RateLimitConfig::new(
        config.rate_limit.max_requests,
        Duration::from_millis(config.rate_limit.window_ms),
    )
    .with_cleanup_interval(Duration::from_millis(config.rate_limit.cleanup_interval_ms));

    match &config.burst_rate_limit {
        Some(burst) => {
            let burst = BurstConfig::new(burst.max_burst, Duration::from_millis(burst.burst_window_ms));
            let limiter = AdvancedRateLimitManager::with_clock(regular, burst, Arc::clone(clock));
            if start_sweep {
                if let Err(e) = limiter.start_cleanup() {
                    warn!(error = %e, "Rate limit sweep not started");
                }
            }
            Arc::new(limiter)
        }
        None => {
            let limiter = RateLimitManager::with_clock(regular, Arc::clone(clock));
            if start_sweep {
                if let Err(e) = limiter.start_cleanup() {
                    warn!(error = %e, "Rate limit sweep not started");
                }
            }
            Arc::new(limiter)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use hubwire_common::resilience::MockClock;
    use hubwire_domain::ErrorCode;
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::http::{TransportError, TransportRequest, TransportResponse};

    /// Counts calls and answers every one with the next scripted status
    #[derive(Default)]
    struct CountingTransport {
        calls: Mutex<Vec<TransportRequest>>,
        statuses: Mutex<VecDeque<u16>>,
    }

    impl CountingTransport {
        fn calls(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn send(
            &self,
            request: TransportRequest,
            _cancel: CancellationToken,
        ) -> Result<TransportResponse, TransportError> {
            let n = {
                let mut calls = self.calls.lock();
                calls.push(request);
                calls.len()
            };
            let status = self.statuses.lock().pop_front().unwrap_or(200);
            Ok(TransportResponse::new(status, json!({ "n": n }).to_string())
                .with_header("content-type", "application/json"))
        }
    }

    fn client(config: ClientConfig) -> (ApiClient, Arc<CountingTransport>, MockClock) {
        let transport = Arc::new(CountingTransport::default());
        let clock = MockClock::starting_at_millis(1_700_000_000_000);
        let client = ApiClient::builder()
            .config(config)
            .transport(Arc::clone(&transport) as Arc<dyn Transport>)
            .clock(Arc::new(clock.clone()))
            .build()
            .unwrap();
        (client, transport, clock)
    }

    fn config() -> ClientConfig {
        let mut config = ClientConfig::new("https://api.example.com");
        config.retry_delay_ms = 1;
        config.retry_jitter_ms = 0;
        config
    }

    #[test]
    fn test_cache_key_includes_params() {
        let mut params = Params::new();
        assert_eq!(cache_key("/services", &params), "GET:/services");

        params.insert("page".into(), json!(2));
        assert_eq!(cache_key("/services", &params), "GET:/services?{\"page\":2}");
    }

    #[test]
    fn test_build_requires_config() {
        let err = ApiClient::builder().build().unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigurationError);

        let err = ApiClient::new(ClientConfig::new("nope")).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigurationError);
    }

    #[tokio::test]
    async fn test_get_is_cached_until_skip_or_invalidate() {
        let (client, transport, _clock) = client(config());
        let options = RequestOptions::new();

        let first = client.get("/services", &options).await.unwrap();
        let second = client.get("/services", &options).await.unwrap();
        assert!(!first.meta.from_cache);
        assert!(second.meta.from_cache);
        assert_eq!(second.data, first.data);
        assert_eq!(transport.calls(), 1);

        client.get("/services", &RequestOptions::new().skip_cache()).await.unwrap();
        assert_eq!(transport.calls(), 2);

        assert_eq!(client.invalidate("/serv"), 1);
        client.get("/services", &options).await.unwrap();
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test]
    async fn test_non_get_and_failures_are_not_cached() {
        let (client, transport, _clock) = client(config());
        transport.statuses.lock().push_back(404);

        let err = client.get("/missing", &RequestOptions::new()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        client.get("/missing", &RequestOptions::new()).await.unwrap();

        client.post("/bookings", &json!({ "a": 1 }), &RequestOptions::new()).await.unwrap();
        client.post("/bookings", &json!({ "a": 1 }), &RequestOptions::new()).await.unwrap();
        assert_eq!(transport.calls(), 4);
        assert_eq!(client.cache_stats().l1.size, 1);
    }

    #[tokio::test]
    async fn test_local_rate_limit_blocks_before_transport() {
        let mut config = config();
        config.rate_limit.max_requests = 1;
        config.rate_limit.window_ms = 1_000;
        let (client, transport, clock) = client(config);

        client.delete("/bookings/1", &RequestOptions::new()).await.unwrap();
        let err = client.delete("/bookings/2", &RequestOptions::new()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::RateLimitExceeded);
        assert!(err.is_local_rate_limit());
        assert_eq!(transport.calls(), 1);

        clock.advance_millis(1_001);
        client.delete("/bookings/3", &RequestOptions::new()).await.unwrap();
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_destroy_rejects_later_calls() {
        let (client, transport, _clock) = client(config());
        client.destroy();
        client.destroy();

        let err = client.get("/services", &RequestOptions::new()).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::SdkNotInitialized);
        assert!(client.is_destroyed());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_static_headers_are_sent() {
        let (transport, clock) = (Arc::new(CountingTransport::default()), MockClock::new());
        let client = ApiClient::builder()
            .config(config())
            .transport(Arc::clone(&transport) as Arc<dyn Transport>)
            .clock(Arc::new(clock))
            .static_header("Accept-Language", "pl")
            .build()
            .unwrap();

        client.put("/profile", &json!({}), &RequestOptions::new()).await.unwrap();
        let sent = transport.calls.lock()[0].clone();
        assert_eq!(sent.headers["accept-language"], "pl");
        assert_eq!(sent.method, HttpMethod::Put);
    }
}
