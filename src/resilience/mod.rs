//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Each attempt:
//!     → timeouts.rs (total deadline armed around the exchange)
//!     → On 5xx or connection failure: retries.rs (budget + eligibility)
//!     → backoff.rs (pause chosen by the retry strategy)
//!
//! Response body:
//!     → timeouts.rs (read-inactivity deadline, reset on every chunk)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every exchange has a deadline unless explicitly disabled
//! - A timed-out attempt is final and never retried
//! - Retry is opt-in per call

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use backoff::{calculate_backoff, RetryStrategy};
pub use retries::RetryPolicy;
pub use timeouts::{Deadline, ReadTimeout};
