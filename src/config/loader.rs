//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ClientConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ClientConfig, ConfigError> {
    let config: ClientConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{RetryStrategyKind, TransportKind};

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.timeouts.request_ms, 60_000);
        assert_eq!(config.transport.kind, TransportKind::Socket);
    }

    #[test]
    fn sections_override_defaults() {
        let config = parse_config(
            r#"
            user_agent = "inventory/2.1"

            [timeouts]
            request_ms = 5000

            [retries]
            attempts = 3
            strategy = "exponential"

            [transport]
            kind = "fetch"
            buffer_streams = false

            [headers]
            x-tenant = "acme"
            "#,
        )
        .unwrap();

        assert_eq!(config.timeouts.request_ms, 5000);
        assert_eq!(config.timeouts.read_ms, 20_000);
        assert_eq!(config.retries.attempts, 3);
        assert_eq!(config.retries.strategy, RetryStrategyKind::Exponential);
        assert_eq!(config.transport.kind, TransportKind::Fetch);
        assert!(!config.transport.buffer_streams);
        assert_eq!(config.headers.get("x-tenant").map(String::as_str), Some("acme"));
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        assert!(matches!(parse_config("timeouts = ["), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn validation_errors_are_collected() {
        let err = parse_config(
            r#"
            [pool]
            max_sockets = 0

            [headers]
            "bad header" = "x"
            "#,
        )
        .unwrap_err();

        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = load_config(Path::new("/nonexistent/fetch.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
