//! Time-driven background work
//!
//! - **[`sweep`]**: owned periodic tasks used for cache and rate-limit
//!   cleanup
//!
//! Clock abstractions live in [`crate::resilience::clock`].

pub mod sweep;

pub use sweep::PeriodicSweep;
