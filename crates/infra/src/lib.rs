//! # Hubwire Infrastructure
//!
//! I/O side of the request pipeline.
//!
//! This crate contains:
//! - The `ApiClient` orchestrator and its `RequestExecutor`
//! - The reqwest-backed HTTP transport
//! - Configuration loading from environment and files
//! - Tracing setup and request outcome events
//!
//! ## Architecture
//! - Data model lives in `hubwire-domain`
//! - Cache, rate limiter and backoff live in `hubwire-common`
//! - Contains all "impure" code (network, filesystem, environment)

pub mod api;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use api::*;
pub use errors::IntoApiError;
pub use http::*;
pub use observability::{init_tracing, log_request_outcome, LogFormat};
