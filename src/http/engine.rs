//! The request engine.
//!
//! # Data Flow
//! ```text
//! attempt N:
//!     resolve headers (Accept: */* seeded, caller layers, user agent)
//!     → encode body (stream framing, or the codec for Content-Type)
//!     → transport call raced against the total deadline
//!     → 5xx / connection failure on a retryable call with budget left?
//!         yes: back off, attempt N+1
//!         no:  ResponseHandle (even for a 5xx)
//! ```
//!
//! # Design Decisions
//! - Malformed URLs and encoding errors fail before any I/O
//! - The total deadline bounds time to response headers, not body transfer
//! - A fired deadline or external cancel is final and surfaces as `Error::Timeout`
//! - Exhausted or non-retryable 5xx responses are returned, not raised

use std::time::Instant;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::codec::{content_type, CodecRegistry};
use crate::error::{Error, Result};
use crate::http::decoder::service_decoder;
use crate::http::headers::{merge_headers, HeaderSource};
use crate::http::request::{Body, RequestParams};
use crate::http::response::{RequestMetadata, ResponseHandle};
use crate::observability::metrics;
use crate::resilience::{Deadline, RetryPolicy};
use crate::streaming::{headers_for_stream, StreamPayload};
use crate::transport::{Transport, TransportBody, TransportError, TransportRequest};

/// Executes requests against any [`Transport`].
#[derive(Debug, Clone)]
pub struct Engine {
    user_agent: Option<HeaderValue>,
    codecs: CodecRegistry,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            user_agent: None,
            codecs: CodecRegistry::global().clone(),
        }
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: HeaderValue) -> Self {
        self.user_agent = Some(user_agent);
        self
    }

    /// Consult `overrides` before the default codecs when encoding bodies.
    #[must_use]
    pub fn with_codecs(mut self, overrides: CodecRegistry) -> Self {
        self.codecs = overrides.or(CodecRegistry::global());
        self
    }

    pub fn user_agent(&self) -> Option<&HeaderValue> {
        self.user_agent.as_ref()
    }

    /// Run one logical request, retrying per the params.
    pub async fn request(
        &self,
        transport: &dyn Transport,
        url: &str,
        params: RequestParams,
    ) -> Result<ResponseHandle> {
        let RequestParams {
            method,
            mut body,
            retryable,
            signal,
            common,
        } = params;

        Url::parse(url).map_err(|err| Error::InvalidUrl(format!("{url}: {err}")))?;

        let replayable = !body.as_ref().is_some_and(Body::is_stream);
        let policy = RetryPolicy::new(common.retry_attempts(), retryable && replayable);
        let strategy = common.retry_strategy();
        let timeout = common.timeout();
        let external = signal.unwrap_or_default();
        let metadata = RequestMetadata::new(url, &method);
        let start = Instant::now();

        let mut attempt = 0u32;
        loop {
            let mut headers = self.resolve_headers(common.headers.as_ref()).await;

            let current = if policy.is_retryable() && policy.has_budget(attempt) {
                body.as_ref().and_then(Body::try_clone)
            } else {
                body.take()
            };
            let encoded = self.encode_body(current, &mut headers)?;

            let signal = external.child_token();
            let mut deadline = Deadline::start(timeout);
            tracing::debug!(
                url = %url,
                method = %metadata.method,
                attempt,
                transport = transport.name(),
                "Sending request"
            );

            let request = TransportRequest {
                method: method.clone(),
                headers,
                body: encoded,
                signal: signal.clone(),
            };

            let outcome = tokio::select! {
                biased;
                outcome = transport.request(url, request) => outcome,
                _ = deadline.expired() => {
                    signal.cancel();
                    tracing::warn!(
                        url = %url,
                        method = %metadata.method,
                        timeout_ms = timeout.as_millis() as u64,
                        "Request timed out"
                    );
                    metrics::record_timeout("request");
                    metrics::record_request(&metadata.method, 0, start);
                    return Err(Error::Timeout);
                }
            };
            deadline.clear();

            let retry_reason = match outcome {
                Ok(response) if policy.should_retry_status(attempt, response.status()) => {
                    format!("status {}", response.status().as_u16())
                }
                Ok(response) => {
                    metrics::record_request(&metadata.method, response.status().as_u16(), start);
                    tracing::debug!(
                        url = %url,
                        method = %metadata.method,
                        status = response.status().as_u16(),
                        "Response received"
                    );
                    return Ok(ResponseHandle::new(
                        response,
                        metadata,
                        common.decoder.clone().unwrap_or_else(service_decoder),
                        common.read_timeout(),
                    ));
                }
                Err(TransportError::Aborted) => {
                    tracing::warn!(url = %url, method = %metadata.method, "Request aborted");
                    metrics::record_request(&metadata.method, 0, start);
                    return Err(Error::Timeout);
                }
                Err(err) if policy.should_retry_error(attempt) => err.to_string(),
                Err(err) => {
                    metrics::record_request(&metadata.method, 0, start);
                    return Err(err.into());
                }
            };

            let delay = strategy.delay(attempt);
            tracing::info!(
                url = %url,
                method = %metadata.method,
                attempt,
                max_attempts = policy.attempts(),
                delay_ms = delay.as_millis() as u64,
                reason = %retry_reason,
                "Retrying request"
            );
            metrics::record_retry(&metadata.method);
            backoff(delay, &external).await?;
            attempt += 1;
        }
    }

    async fn resolve_headers(&self, source: Option<&HeaderSource>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        if let Some(source) = source {
            merge_headers(&mut headers, source.resolve().await);
        }
        if let Some(user_agent) = &self.user_agent {
            headers.insert(USER_AGENT, user_agent.clone());
        }
        headers
    }

    /// Turn the body into wire bytes, defaulting `Content-Type` to JSON.
    fn encode_body(&self, body: Option<Body>, headers: &mut HeaderMap) -> Result<TransportBody> {
        let body = match body {
            None => return Ok(TransportBody::Empty),
            Some(Body::Stream(payload)) => return Ok(stream_body(payload, headers)),
            Some(body) => body,
        };

        let content_type = match headers.get(CONTENT_TYPE) {
            Some(value) => value
                .to_str()
                .map_err(|_| Error::InvalidHeader(format!("content-type: {value:?}")))?
                .to_string(),
            None => {
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type::JSON));
                content_type::JSON.to_string()
            }
        };

        let bytes = match (body, self.codecs.lookup(&content_type)) {
            (Body::Bytes(bytes), _) => bytes,
            (Body::Value(value), Some(codec)) => codec.encode(&value)?,
            (Body::Text(text), Some(codec)) => codec.encode(&Value::String(text))?,
            (Body::Text(text), None) | (Body::Value(Value::String(text)), None) => Bytes::from(text),
            (body, _) => {
                return Err(Error::UnsupportedBody {
                    body_type: body.kind(),
                    content_type,
                })
            }
        };
        Ok(TransportBody::Full(bytes))
    }
}

/// Frame a stream payload, announcing its content type unless the caller chose one.
fn stream_body(payload: StreamPayload, headers: &mut HeaderMap) -> TransportBody {
    for (name, value) in headers_for_stream(&payload) {
        if let Some(name) = name {
            headers.entry(name).or_insert(value);
        }
    }
    TransportBody::Stream(payload.encode())
}

/// Pause between attempts. Cancellation during the pause ends the call.
async fn backoff(delay: std::time::Duration, signal: &CancellationToken) -> Result<()> {
    tokio::select! {
        _ = signal.cancelled() => Err(Error::Timeout),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
