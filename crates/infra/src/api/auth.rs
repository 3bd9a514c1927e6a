//! API authentication
//!
//! The pipeline needs two things from authentication: a bearer token to
//! attach to outgoing requests and a way to refresh it after a `401`.
//! [`AuthProvider`] is that seam; [`StaticTokenProvider`] covers fixed
//! tokens and tests.

use async_trait::async_trait;
use hubwire_domain::{ApiError, ErrorCode};
use parking_lot::RwLock;
use tracing::debug;

/// Trait for providing access tokens
///
/// This trait allows dependency injection and testing with mock providers.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Current access token, `None` for anonymous requests
    async fn access_token(&self) -> Result<Option<String>, ApiError>;

    /// Obtain a fresh token after the server rejected the current one
    ///
    /// # Errors
    ///
    /// Returns an error when no new token can be obtained; the pipeline then
    /// fails the call with `AUTHENTICATION_REQUIRED`.
    async fn refresh(&self) -> Result<(), ApiError>;
}

/// Provider for a token managed by the caller
///
/// `refresh` cannot mint tokens, so it fails unless a replacement was
/// installed with [`StaticTokenProvider::set_token`] since the last refresh.
#[derive(Debug, Default)]
pub struct StaticTokenProvider {
    state: RwLock<TokenState>,
}

#[derive(Debug, Default)]
struct TokenState {
    token: Option<String>,
    replaced: bool,
}

impl StaticTokenProvider {
    /// Provider that always returns `token`
    pub fn new(token: impl Into<String>) -> Self {
        Self { state: RwLock::new(TokenState { token: Some(token.into()), replaced: false }) }
    }

    /// Provider that sends no `Authorization` header
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Replace the token (e.g. after the caller logged in again)
    pub fn set_token(&self, token: impl Into<String>) {
        let mut state = self.state.write();
        state.token = Some(token.into());
        state.replaced = true;
    }

    /// Drop the token
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.token = None;
        state.replaced = false;
    }
}

#[async_trait]
impl AuthProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<Option<String>, ApiError> {
        Ok(self.state.read().token.clone())
    }

    async fn refresh(&self) -> Result<(), ApiError> {
        let mut state = self.state.write();
        if state.replaced {
            state.replaced = false;
            debug!("Using replacement token installed by caller");
            return Ok(());
        }
        Err(ApiError::new(ErrorCode::AuthenticationRequired, "Static token cannot be refreshed"))
    }
}
