//! Response decoders.
//!
//! # Responsibilities
//! - Generic decode: pick a codec from the response `Content-Type` and decode the body
//! - Service decode: unwrap the `{data}` / `{error}` envelope on top of generic decode
//! - Let callers plug in their own decoder per client or per request
//!
//! # Design Decisions
//! - A missing `Content-Type` means JSON
//! - Bodies that cannot be decoded surface as `UnparsableResponse` with the raw text
//! - Decoders only read the global codec registry; client codec overrides apply to requests

use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value;

use crate::codec::{content_type, CodecRegistry};
use crate::error::{Error, Result, ServiceError};
use crate::http::response::{RequestMetadata, Response};

/// Turns a response into a value.
pub type Decoder =
    Arc<dyn Fn(Response, RequestMetadata) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Wrap an async function as a [`Decoder`].
pub fn decoder<F, Fut>(f: F) -> Decoder
where
    F: Fn(Response, RequestMetadata) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(move |response, metadata| f(response, metadata).boxed())
}

/// Decoder that applies the service envelope. The default.
pub fn service_decoder() -> Decoder {
    decoder(decode_service_response)
}

/// Decoder that only applies the content-type codec.
pub fn generic_decoder() -> Decoder {
    decoder(decode_response)
}

/// Decode the body with the codec registered for its content type.
pub async fn decode_response(response: Response, metadata: RequestMetadata) -> Result<Value> {
    let status = response.status().as_u16();
    let content_type = response
        .content_type()
        .unwrap_or(content_type::JSON)
        .to_string();

    let Some(codec) = CodecRegistry::global().lookup(&content_type) else {
        let raw = response.text().await?;
        tracing::warn!(
            endpoint = %metadata.endpoint(),
            status,
            content_type = %content_type,
            "No codec for response content type"
        );
        return Err(Error::UnparsableResponse {
            endpoint: metadata.endpoint(),
            status,
            raw: Some(raw),
        });
    };

    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Ok(Value::Null);
    }

    codec.decode(&bytes).map_err(|err| {
        tracing::warn!(endpoint = %metadata.endpoint(), status, error = %err, "Response body failed to decode");
        Error::UnparsableResponse {
            endpoint: metadata.endpoint(),
            status,
            raw: Some(String::from_utf8_lossy(&bytes).into_owned()),
        }
    })
}

/// Decode, then unwrap `{data}` or raise `{error}`.
///
/// Error statuses without an envelope are unparsable; successful ones yield `null`.
pub async fn decode_service_response(
    response: Response,
    metadata: RequestMetadata,
) -> Result<Value> {
    let status = response.status().as_u16();
    let mut value = decode_response(response, metadata.clone()).await?;

    if let Some(data) = value.get_mut("data").filter(|data| is_truthy(data)) {
        return Ok(data.take());
    }

    if let Some(error) = value.get_mut("error").filter(|error| is_truthy(error)) {
        return Err(ServiceError::from_value(error.take()).into());
    }

    if status >= 300 {
        return Err(Error::UnparsableResponse {
            endpoint: metadata.endpoint(),
            status,
            raw: None,
        });
    }

    Ok(Value::Null)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
