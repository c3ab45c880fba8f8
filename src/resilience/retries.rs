//! Retry decisions.
//!
//! # Responsibilities
//! - Decide whether a failed attempt gets another try
//! - Keep the attempt budget: `attempts` is the total, including the first
//!
//! # Design Decisions
//! - Only calls the caller marked `retryable` are retried
//! - 5xx responses and connection failures are retryable; timeouts never are
//! - Callers that stream a body opt out, since the body cannot be replayed

use http::StatusCode;

/// Attempt budget and eligibility for a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    retryable: bool,
}

impl RetryPolicy {
    /// `attempts` counts the initial try; values below 1 are treated as 1.
    pub fn new(attempts: u32, retryable: bool) -> Self {
        Self {
            attempts: attempts.max(1),
            retryable,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Whether another attempt remains after the 0-based `attempt`.
    pub fn has_budget(&self, attempt: u32) -> bool {
        attempt.saturating_add(1) < self.attempts
    }

    /// Retry after a response with `status` on the 0-based `attempt`?
    pub fn should_retry_status(&self, attempt: u32, status: StatusCode) -> bool {
        self.retryable && status.is_server_error() && self.has_budget(attempt)
    }

    /// Retry after a connection-level failure on the 0-based `attempt`?
    pub fn should_retry_error(&self, attempt: u32) -> bool {
        self.retryable && self.has_budget(attempt)
    }
}
