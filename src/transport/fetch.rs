//! Fetch-style transport over `reqwest`.
//!
//! Streamed request bodies are buffered into memory before sending by default, since
//! not every server accepts chunked uploads. Set `buffer_streams = false` to stream
//! them instead.

use bytes::{Bytes, BytesMut};
use futures_util::future::BoxFuture;
use futures_util::stream::{StreamExt, TryStreamExt};

use crate::http::response::Response;
use crate::streaming::ByteSource;
use crate::transport::{abortable, Transport, TransportBody, TransportError, TransportRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Collect streamed bodies fully before sending.
    pub buffer_streams: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            buffer_streams: true,
        }
    }
}

/// Transport backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct FetchTransport {
    client: reqwest::Client,
    options: FetchOptions,
}

impl FetchTransport {
    pub fn new(options: FetchOptions) -> Self {
        Self {
            client: reqwest::Client::new(),
            options,
        }
    }

    /// Use a preconfigured client (proxies, TLS roots, pool limits).
    pub fn with_client(client: reqwest::Client, options: FetchOptions) -> Self {
        Self { client, options }
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    async fn body(&self, body: TransportBody) -> Result<Option<reqwest::Body>, TransportError> {
        Ok(match body {
            TransportBody::Empty => None,
            TransportBody::Full(bytes) => Some(reqwest::Body::from(bytes)),
            TransportBody::Stream(source) if self.options.buffer_streams => {
                Some(reqwest::Body::from(buffer(source).await?))
            }
            TransportBody::Stream(source) => Some(reqwest::Body::wrap_stream(source)),
        })
    }

    async fn exchange(
        &self,
        url: &str,
        request: TransportRequest,
    ) -> Result<Response, TransportError> {
        let TransportRequest {
            method,
            headers,
            body,
            signal,
        } = request;

        let send = async {
            let mut builder = self.client.request(method, url).headers(headers);
            if let Some(body) = self.body(body).await? {
                builder = builder.body(body);
            }
            builder.send().await.map_err(TransportError::Fetch)
        };

        let response = tokio::select! {
            biased;
            _ = signal.cancelled() => {
                tracing::debug!(url = %url, "Fetch aborted");
                return Err(TransportError::Aborted);
            }
            response = send => response?,
        };

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map_err(TransportError::Fetch)
            .boxed();

        Ok(Response::new(status, headers, abortable(body, signal)))
    }
}

impl Transport for FetchTransport {
    fn request<'a>(
        &'a self,
        url: &'a str,
        request: TransportRequest,
    ) -> BoxFuture<'a, Result<Response, TransportError>> {
        Box::pin(self.exchange(url, request))
    }

    fn name(&self) -> &'static str {
        "fetch"
    }
}

async fn buffer(source: ByteSource) -> Result<Bytes, TransportError> {
    let collected = source
        .try_fold(BytesMut::new(), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk);
            Ok(acc)
        })
        .await
        .map_err(TransportError::RequestBody)?;
    Ok(collected.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[test]
    fn buffers_streams_by_default() {
        assert!(FetchOptions::default().buffer_streams);
    }

    #[tokio::test]
    async fn buffer_concatenates_chunks() {
        let source = stream::iter(vec![Ok(Bytes::from("ab")), Ok(Bytes::from("cd"))]).boxed();
        assert_eq!(buffer(source).await.unwrap(), Bytes::from("abcd"));
    }

    #[tokio::test]
    async fn buffer_surfaces_source_errors() {
        let source = stream::iter(vec![
            Ok(Bytes::from("ab")),
            Err(std::io::Error::other("producer failed")),
        ])
        .boxed();
        assert!(matches!(
            buffer(source).await,
            Err(TransportError::RequestBody(_))
        ));
    }
}
