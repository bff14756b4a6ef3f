//! Sliding-window admission control for outbound network calls.
//!
//! Each action category keeps the timestamps of its recent calls in durable
//! storage. A call is admitted while fewer than the category's cap fall inside
//! the trailing window ending now.
//!
//! # Concurrency
//!
//! The read-modify-write of one category's timestamps is a critical section:
//! checks for the same category are serialized by a per-category async mutex.
//! Listed categories each get their own mutex; all unlisted categories share
//! one, so the lock map stays bounded. Windows are stored per category either way.
//!
//! # Failure policy
//!
//! If storage is unreachable the controller fails open: the condition is
//! logged and the call is admitted.

mod clock;
mod controller;
mod limits;

pub use clock::{current_time_ms, SystemTimeProvider, TimeProvider};
pub use controller::{Admission, AdmissionController};
pub use limits::{categories, RateLimit};

use thiserror::Error;

/// Error type for admission decisions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    /// Too many calls in the trailing window; retry after `wait_seconds`
    #[error("Rate limit exceeded for {category}. Please wait {wait_seconds} seconds.")]
    RateLimitExceeded {
        /// Category that was throttled
        category: String,
        /// Seconds until the oldest counted call leaves the window
        wait_seconds: u64,
    },
}
