//! Error taxonomy for the request engine.
//!
//! # Categories
//! - Timeout: total-request or read-inactivity deadline exceeded, or an aborted exchange
//! - Encoding: a body the resolved `Content-Type` cannot carry (fails before any I/O)
//! - Decoding: a response that does not match its content type or the service envelope
//! - Service: a structured error rebuilt from a decoded `{error}` field
//! - Transport: connection-level failures reported by the adapter

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::codec::CodecError;
use crate::transport::TransportError;

/// Error code carried by [`Error::UnparsableResponse`] when rendered as [`ErrorData`].
pub const UNPARSABLE_SERVICE_RESPONSE: &str = "UNPARSABLE_SERVICE_RESPONSE";

/// Wire shape of a service error, as found under the `error` key of a response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorData {
    #[serde(default)]
    pub code: String,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    /// Any fields the service sent beyond the well-known ones.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ErrorData {
    /// Create error data with just a code and description.
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            name: None,
            status: None,
            details: None,
            extra: Map::new(),
        }
    }
}

/// Structured domain error reconstructed from a decoded `{error}` field.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}: {}", .data.code, .data.description)]
pub struct ServiceError {
    data: ErrorData,
}

impl ServiceError {
    /// Rebuild a service error from the raw `error` value of a response.
    ///
    /// Values that are not shaped like [`ErrorData`] are kept verbatim in the description.
    pub fn from_value(value: Value) -> Self {
        let data = match serde_json::from_value::<ErrorData>(value.clone()) {
            Ok(data) => data,
            Err(_) => {
                let description = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                ErrorData::new("UNKNOWN_ERROR", description)
            }
        };
        Self { data }
    }

    pub fn data(&self) -> &ErrorData {
        &self.data
    }

    pub fn code(&self) -> &str {
        &self.data.code
    }

    /// Serialize back to the JSON the error was built from.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(&self.data).unwrap_or(Value::Null)
    }
}

impl From<ErrorData> for ServiceError {
    fn from(data: ErrorData) -> Self {
        Self { data }
    }
}

/// Errors surfaced by the request engine and its collaborators.
#[derive(Debug, Error)]
pub enum Error {
    /// Total-request or read-inactivity deadline exceeded, or the exchange was aborted.
    #[error("Request timed out")]
    Timeout,

    /// The response could not be decoded for its content type or envelope.
    #[error("Could not parse service response from {endpoint} (status {status})")]
    UnparsableResponse {
        endpoint: String,
        status: u16,
        raw: Option<String>,
    },

    /// No codec can turn the body into bytes for the resolved content type.
    #[error(
        "Unsupported body with type {body_type} and a Content-Type of {content_type}. None of the configured codecs know how to convert the given body to bytes or a string. Please provide a compatible codec"
    )]
    UnsupportedBody {
        body_type: &'static str,
        content_type: String,
    },

    /// Domain error carried in a `{error}` response envelope.
    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("transport error: {0}")]
    Transport(TransportError),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("stream error: {0}")]
    Stream(#[source] std::io::Error),
}

impl Error {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }

    /// Render the error as service error data, for the variants that have a wire shape.
    pub fn error_data(&self) -> Option<ErrorData> {
        match self {
            Error::Service(err) => Some(err.data().clone()),
            Error::UnparsableResponse { endpoint, status, raw } => {
                let mut data = ErrorData::new(
                    UNPARSABLE_SERVICE_RESPONSE,
                    "Could not parse service response",
                );
                data.status = Some(*status);
                data.details = Some(format!(
                    "{}\n{}",
                    endpoint,
                    raw.as_deref().unwrap_or("unparseable")
                ));
                Some(data)
            }
            _ => None,
        }
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Aborted => Error::Timeout,
            other => Error::Transport(other),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
