//! Request parameters and body variants.
//!
//! # Responsibilities
//! - Describe one call: method, body, headers, timeouts, retry settings, decoder
//! - Carry the defaults shared by client-level and per-request settings
//!
//! # Design Decisions
//! - Every tunable is optional so client defaults can fill the gaps
//! - A zero duration disables the corresponding timeout
//! - Stream bodies are owned and cannot be replayed, so they are never retried

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use http::Method;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::codec::{value_kind, CodecError};
use crate::error::Result;
use crate::http::decoder::Decoder;
use crate::http::headers::HeaderSource;
use crate::resilience::RetryStrategy;
use crate::streaming::StreamPayload;

/// Maximum time to receive response headers.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum gap between two chunks of a streamed response.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(20);

/// Total attempts, including the first.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 1;

/// A request body.
pub enum Body {
    /// Structured value, encoded by the codec matching `Content-Type`.
    Value(Value),
    /// Bytes sent as-is.
    Bytes(Bytes),
    /// Text, encoded by a matching codec or sent as-is.
    Text(String),
    /// Framed stream, bypassing codecs.
    Stream(StreamPayload),
}

impl Body {
    /// Serialize any value into a [`Body::Value`].
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        let value = serde_json::to_value(value).map_err(CodecError::from)?;
        Ok(Body::Value(value))
    }

    /// Type name reported in encoding errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Body::Value(value) => value_kind(value),
            Body::Bytes(_) => "bytes",
            Body::Text(_) => "string",
            Body::Stream(_) => "stream",
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Body::Stream(_))
    }

    /// Copy for another attempt. Streams have no copy.
    pub(crate) fn try_clone(&self) -> Option<Body> {
        match self {
            Body::Value(value) => Some(Body::Value(value.clone())),
            Body::Bytes(bytes) => Some(Body::Bytes(bytes.clone())),
            Body::Text(text) => Some(Body::Text(text.clone())),
            Body::Stream(_) => None,
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Body::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Body::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Body::Stream(payload) => f.debug_tuple("Stream").field(payload).finish(),
        }
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Value(value)
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(bytes))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<StreamPayload> for Body {
    fn from(payload: StreamPayload) -> Self {
        Body::Stream(payload)
    }
}

/// Settings shared by client defaults and individual requests.
#[derive(Clone, Default)]
pub struct CommonParams {
    /// Time allowed to receive response headers. Zero disables.
    pub timeout: Option<Duration>,
    /// Maximum gap between streamed chunks. Zero disables.
    pub read_timeout: Option<Duration>,
    pub retry_attempts: Option<u32>,
    pub retry_strategy: Option<RetryStrategy>,
    pub headers: Option<HeaderSource>,
    pub decoder: Option<Decoder>,
}

impl CommonParams {
    /// Keep every field set here, filling the rest from `fallback`.
    pub fn or(self, fallback: &CommonParams) -> Self {
        Self {
            timeout: self.timeout.or(fallback.timeout),
            read_timeout: self.read_timeout.or(fallback.read_timeout),
            retry_attempts: self.retry_attempts.or(fallback.retry_attempts),
            retry_strategy: self.retry_strategy.or_else(|| fallback.retry_strategy.clone()),
            headers: self.headers.or_else(|| fallback.headers.clone()),
            decoder: self.decoder.or_else(|| fallback.decoder.clone()),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout.unwrap_or(DEFAULT_READ_TIMEOUT)
    }

    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts.unwrap_or(DEFAULT_RETRY_ATTEMPTS)
    }

    pub fn retry_strategy(&self) -> RetryStrategy {
        self.retry_strategy.clone().unwrap_or_default()
    }
}

impl fmt::Debug for CommonParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommonParams")
            .field("timeout", &self.timeout)
            .field("read_timeout", &self.read_timeout)
            .field("retry_attempts", &self.retry_attempts)
            .field("retry_strategy", &self.retry_strategy)
            .field("headers", &self.headers)
            .field("decoder", &self.decoder.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Parameters for a single call.
#[derive(Debug, Default)]
pub struct RequestParams {
    pub method: Method,
    pub body: Option<Body>,
    /// Opt in to retrying 5xx responses and connection failures.
    pub retryable: bool,
    /// External cancellation. Cancelling surfaces as a timeout.
    pub signal: Option<CancellationToken>,
    pub common: CommonParams,
}

impl RequestParams {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: impl Into<HeaderSource>) -> Self {
        self.common.headers = Some(headers.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.common.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.common.read_timeout = Some(read_timeout);
        self
    }

    #[must_use]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.common.retry_attempts = Some(attempts);
        self
    }

    #[must_use]
    pub fn with_retry_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.common.retry_strategy = Some(strategy);
        self
    }

    #[must_use]
    pub fn with_decoder(mut self, decoder: Decoder) -> Self {
        self.common.decoder = Some(decoder);
        self
    }

    #[must_use]
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    #[must_use]
    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }
}
