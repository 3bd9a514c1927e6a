//! Request pipeline for a remote JSON API
//!
//! [`ApiClient`] is the entry point. Each call flows through:
//!
//! - the local rate limiter (fixed window, optionally a burst window)
//! - the response cache (GET only)
//! - the [`RequestExecutor`]: interceptors, per-attempt timeout, retry with
//!   backoff, body decoding and the 401 refresh cycle
//!
//! # Architecture
//!
//! - Network I/O goes through the [`Transport`](crate::http::Transport)
//!   trait; production uses reqwest
//! - Rate limiter and cache come from `hubwire-common`
//! - Every failure surfaces as [`hubwire_domain::ApiError`]

pub mod auth;
pub mod client;
pub mod executor;
pub mod interceptors;

pub use auth::{AuthProvider, StaticTokenProvider};
pub use client::{cache_key, ApiClient, ApiClientBuilder, ResponseCache, CACHE_KEY_PREFIX};
pub use executor::{parse_body, rate_limit_meta, RequestExecutor, StatusRetryPolicy};
pub use interceptors::{
    AuthHeaderInterceptor, ErrorInterceptor, ErrorOutcome, Interceptor, InterceptorChain,
    RequestInterceptor, ResponseInterceptor, StaticHeadersInterceptor, AUTH_PRIORITY,
    STATIC_HEADERS_PRIORITY,
};
