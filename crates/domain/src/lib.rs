//! # Hubwire Domain
//!
//! Data model shared by the request pipeline.
//!
//! This crate contains:
//! - Request/response types and per-call options
//! - The `ApiError` type with its stable error codes
//! - Client configuration structures and validation
//!
//! ## Architecture
//! - Depends only on the foundation tier of `hubwire-common`
//! - No I/O, no async runtime

pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
