//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (pool sizes, backoff bounds)
//! - Check header names, values and the user agent are sendable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use http::header::{HeaderName, HeaderValue};
use thiserror::Error;

use crate::config::schema::{ClientConfig, RetryStrategyKind};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Check a parsed configuration, collecting every problem.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.pool.max_sockets == 0 {
        errors.push(ValidationError::new("pool.max_sockets", "must be greater than 0"));
    }
    if config.pool.max_idle_sockets > config.pool.max_sockets {
        errors.push(ValidationError::new(
            "pool.max_idle_sockets",
            format!(
                "{} exceeds max_sockets ({})",
                config.pool.max_idle_sockets, config.pool.max_sockets
            ),
        ));
    }

    if config.retries.attempts == 0 {
        errors.push(ValidationError::new("retries.attempts", "must be at least 1"));
    }
    if config.retries.strategy == RetryStrategyKind::Exponential
        && config.retries.max_delay_ms < config.retries.base_delay_ms
    {
        errors.push(ValidationError::new(
            "retries.max_delay_ms",
            "must not be lower than base_delay_ms",
        ));
    }

    for (name, value) in &config.headers {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                format!("headers.{name}"),
                "invalid header name",
            ));
        }
        if HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::new(
                format!("headers.{name}"),
                "invalid header value",
            ));
        }
    }

    if let Some(user_agent) = &config.user_agent {
        if HeaderValue::from_str(user_agent).is_err() {
            errors.push(ValidationError::new("user_agent", "not a valid header value"));
        }
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level {:?}", config.observability.log_level),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
