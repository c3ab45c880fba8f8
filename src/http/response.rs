//! Responses and response handles.
//!
//! # Responsibilities
//! - Wrap what a transport returns: status, headers, single-consumption body
//! - Expose the lazy `decode()` / `stream()` / `records()` accessors
//! - Guard streamed bodies with the read-inactivity timeout
//!
//! # Design Decisions
//! - Accessors consume the handle, since the body can only be read once
//! - Error statuses never produce a body stream; they go through the decoder instead

use std::fmt;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use http::header::{HeaderMap, CONTENT_TYPE};
use http::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::codec::CodecError;
use crate::error::{Error, Result};
use crate::http::decoder::Decoder;
use crate::resilience::ReadTimeout;
use crate::streaming::RecordDecoder;
use crate::transport::TransportError;

/// Body as produced by a transport.
pub type ResponseBody = BoxStream<'static, std::result::Result<Bytes, TransportError>>;

/// Body as handed to callers of [`ResponseHandle::stream`].
pub type BodyStream = BoxStream<'static, Result<Bytes>>;

/// A transport response.
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: ResponseBody) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// A response with a fully buffered body.
    pub fn from_bytes(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        let source = stream::iter((!body.is_empty()).then_some(Ok(body)));
        Self::new(status, headers, source.boxed())
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Case-insensitive header lookup. Values that are not visible ASCII are skipped.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(|value| value.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    /// Buffer the whole body.
    pub async fn bytes(self) -> std::result::Result<Bytes, TransportError> {
        let collected = self
            .body
            .try_fold(BytesMut::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await?;
        Ok(collected.freeze())
    }

    /// Buffer the whole body as text, replacing invalid UTF-8.
    pub async fn text(self) -> std::result::Result<String, TransportError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// What a decoder knows about the call that produced a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestMetadata {
    pub url: String,
    /// Uppercased method name.
    pub method: String,
}

impl RequestMetadata {
    pub fn new(url: impl Into<String>, method: &Method) -> Self {
        Self {
            url: url.into(),
            method: method.as_str().to_ascii_uppercase(),
        }
    }

    /// `"METHOD url"`, as reported in decode errors.
    pub fn endpoint(&self) -> String {
        format!("{} {}", self.method, self.url)
    }
}

/// A received response plus its lazily-invoked accessors.
pub struct ResponseHandle {
    response: Response,
    metadata: RequestMetadata,
    decoder: Decoder,
    read_timeout: Duration,
}

impl ResponseHandle {
    pub fn new(
        response: Response,
        metadata: RequestMetadata,
        decoder: Decoder,
        read_timeout: Duration,
    ) -> Self {
        Self {
            response,
            metadata,
            decoder,
            read_timeout,
        }
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn metadata(&self) -> &RequestMetadata {
        &self.metadata
    }

    /// Give up the accessors and take the raw response.
    pub fn into_response(self) -> Response {
        self.response
    }

    /// Run the configured decoder over the full body.
    pub async fn decode(self) -> Result<Value> {
        (self.decoder)(self.response, self.metadata).await
    }

    /// Decode, then deserialize into `T`.
    pub async fn decode_as<T: DeserializeOwned>(self) -> Result<T> {
        let value = self.decode().await?;
        serde_json::from_value(value).map_err(|err| Error::Codec(CodecError::from(err)))
    }

    /// Stream the body, failing any read that stalls longer than the read timeout.
    ///
    /// Statuses of 300 and above are decoded instead, surfacing the service's error.
    pub async fn stream(self) -> Result<BodyStream> {
        let status = self.response.status();
        if status.as_u16() >= 300 {
            let endpoint = self.metadata.endpoint();
            return Err(match (self.decoder)(self.response, self.metadata).await {
                Err(err) => err,
                Ok(value) => Error::UnparsableResponse {
                    endpoint,
                    status: status.as_u16(),
                    raw: Some(value.to_string()),
                },
            });
        }

        let body = self.response.into_body().map_err(Error::from).boxed();
        Ok(ReadTimeout::new(body, self.read_timeout).boxed())
    }

    /// Stream the body as length-prefixed BSON records.
    pub async fn records(self) -> Result<BoxStream<'static, Result<Value>>> {
        let body = self.stream().await?;
        Ok(RecordDecoder::new(body).boxed())
    }
}

impl fmt::Debug for ResponseHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseHandle")
            .field("response", &self.response)
            .field("metadata", &self.metadata)
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}
