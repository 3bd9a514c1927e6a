//! Resilience primitives for the request pipeline
//!
//! - **Clock**: time source abstraction with a deterministic [`MockClock`]
//! - **Retry**: retry decisions plus exponential backoff with jitter
//!
//! The retry classification itself (which status codes are retried) belongs
//! to the client crate; this module only supplies the generic pieces.

pub mod clock;
pub mod retry;

pub use clock::{Clock, MockClock, SharedClock, SystemClock};
pub use retry::{
    BackoffSchedule, ExponentialBackoff, RetryDecision, RetryPolicy, DEFAULT_MAX_JITTER,
};
