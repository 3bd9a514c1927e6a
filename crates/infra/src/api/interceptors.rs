//! Request and response interceptors
//!
//! Interceptors are registered with a priority and run in ascending
//! priority order; interceptors with equal priority run in registration
//! order. Each stage takes its input by value and returns a new value.

use std::sync::Arc;

use async_trait::async_trait;
use hubwire_domain::{ApiError, ApiResponse, Headers, Request};

use super::auth::AuthProvider;

/// Priority of the built-in [`AuthHeaderInterceptor`]
pub const AUTH_PRIORITY: i32 = 100;

/// Priority of the built-in [`StaticHeadersInterceptor`]
pub const STATIC_HEADERS_PRIORITY: i32 = 50;

/// Transforms a request before it is sent
#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    /// # Errors
    ///
    /// An error fails the call without contacting the server.
    async fn on_request(&self, request: Request) -> Result<Request, ApiError>;
}

/// Transforms a successful response
#[async_trait]
pub trait ResponseInterceptor: Send + Sync {
    /// # Errors
    ///
    /// An error replaces the successful response.
    async fn on_response(&self, response: ApiResponse) -> Result<ApiResponse, ApiError>;
}

/// What an error interceptor decided
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorOutcome {
    /// Keep failing, possibly with a replaced error
    Propagate(ApiError),
    /// Turn the failure into a response; later error interceptors are skipped
    Recover(ApiResponse),
}

/// Transforms or recovers a failed call
#[async_trait]
pub trait ErrorInterceptor: Send + Sync {
    /// Replace the error or recover with a response
    async fn on_error(&self, request: &Request, error: ApiError) -> ErrorOutcome;
}

/// A registered interceptor
#[derive(Clone)]
pub enum Interceptor {
    /// Runs before the request is sent
    RequestTransform(Arc<dyn RequestInterceptor>),
    /// Runs on a successful response
    ResponseSuccessTransform(Arc<dyn ResponseInterceptor>),
    /// Runs on a failed call
    ResponseErrorTransform(Arc<dyn ErrorInterceptor>),
}

impl Interceptor {
    /// Wrap a request transform
    pub fn request(interceptor: impl RequestInterceptor + 'static) -> Self {
        Self::RequestTransform(Arc::new(interceptor))
    }

    /// Wrap a success transform
    pub fn response(interceptor: impl ResponseInterceptor + 'static) -> Self {
        Self::ResponseSuccessTransform(Arc::new(interceptor))
    }

    /// Wrap an error transform
    pub fn error(interceptor: impl ErrorInterceptor + 'static) -> Self {
        Self::ResponseErrorTransform(Arc::new(interceptor))
    }
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::RequestTransform(_) => "RequestTransform",
            Self::ResponseSuccessTransform(_) => "ResponseSuccessTransform",
            Self::ResponseErrorTransform(_) => "ResponseErrorTransform",
        };
        f.write_str(kind)
    }
}

#[derive(Debug, Clone)]
struct Registered {
    priority: i32,
    interceptor: Interceptor,
}

/// Ordered interceptor list
///
/// Cloning is cheap; the executor snapshots the chain before awaiting so
/// registration never blocks an in-flight call.
#[derive(Debug, Clone, Default)]
pub struct InterceptorChain {
    entries: Vec<Registered>,
}

impl InterceptorChain {
    /// Empty chain
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an interceptor
    pub fn add(&mut self, priority: i32, interceptor: Interceptor) {
        self.entries.push(Registered { priority, interceptor });
        // stable: equal priorities keep registration order
        self.entries.sort_by_key(|entry| entry.priority);
    }

    /// Number of registered interceptors
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every request transform in order
    ///
    /// # Errors
    ///
    /// Returns the first interceptor error.
    pub async fn run_request(&self, mut request: Request) -> Result<Request, ApiError> {
        for entry in &self.entries {
            if let Interceptor::RequestTransform(interceptor) = &entry.interceptor {
                request = interceptor.on_request(request).await?;
            }
        }
        Ok(request)
    }

    /// Run every success transform in order
    ///
    /// # Errors
    ///
    /// Returns the first interceptor error.
    pub async fn run_response(&self, mut response: ApiResponse) -> Result<ApiResponse, ApiError> {
        for entry in &self.entries {
            if let Interceptor::ResponseSuccessTransform(interceptor) = &entry.interceptor {
                response = interceptor.on_response(response).await?;
            }
        }
        Ok(response)
    }

    /// Run error transforms until one recovers
    pub async fn run_error(&self, request: &Request, mut error: ApiError) -> ErrorOutcome {
        for entry in &self.entries {
            if let Interceptor::ResponseErrorTransform(interceptor) = &entry.interceptor {
                match interceptor.on_error(request, error).await {
                    ErrorOutcome::Propagate(next) => error = next,
                    recovered @ ErrorOutcome::Recover(_) => return recovered,
                }
            }
        }
        ErrorOutcome::Propagate(error)
    }
}

/// Attaches `authorization: Bearer <token>` from an [`AuthProvider`]
pub struct AuthHeaderInterceptor {
    provider: Arc<dyn AuthProvider>,
}

impl AuthHeaderInterceptor {
    /// Interceptor reading tokens from `provider`
    pub fn new(provider: Arc<dyn AuthProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl RequestInterceptor for AuthHeaderInterceptor {
    async fn on_request(&self, request: Request) -> Result<Request, ApiError> {
        match self.provider.access_token().await? {
            Some(token) => Ok(request.with_header("authorization", format!("Bearer {token}"))),
            None => Ok(request),
        }
    }
}

/// Adds fixed headers (locale, client version) unless the request already
/// carries them
#[derive(Debug, Clone)]
pub struct StaticHeadersInterceptor {
    headers: Headers,
}

impl StaticHeadersInterceptor {
    pub fn new<I, K, V>(headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl RequestInterceptor for StaticHeadersInterceptor {
    async fn on_request(&self, mut request: Request) -> Result<Request, ApiError> {
        for (name, value) in &self.headers {
            request.headers.entry(name.clone()).or_insert_with(|| value.clone());
        }
        Ok(request)
    }
}
