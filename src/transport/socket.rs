//! Pooled keep-alive socket transport.
//!
//! # Responsibilities
//! - Reuse connections through hyper-util's legacy client pool
//! - Bound in-flight exchanges (`max_sockets`) with a semaphore
//! - Wire request bodies (empty, buffered or streamed) onto the connection
//! - Destroy the exchange when the cancellation signal fires
//!
//! # Design Decisions
//! - `http` and `https` URLs share one pool; TLS uses the platform's default settings
//! - The concurrency permit travels with the response body and is released when the body
//!   is finished or dropped, not when headers arrive

use std::env;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream::{StreamExt, TryStreamExt};
use http_body_util::{combinators::UnsyncBoxBody, BodyExt, Empty, Full, StreamBody};
use hyper::body::Frame;
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tokio::sync::Semaphore;

use crate::http::response::Response;
use crate::transport::{abortable, Transport, TransportBody, TransportError, TransportRequest};

/// Environment variable naming the calling service in the default user agent.
pub const SERVICE_NAME_ENV: &str = "FETCH_SERVICE_NAME";

type SocketBody = UnsyncBoxBody<Bytes, io::Error>;

/// Pool sizing and keep-alive settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketOptions {
    /// Maximum concurrent exchanges across all hosts.
    pub max_sockets: usize,
    /// Idle connections kept per host.
    pub max_idle_sockets: usize,
    /// TCP keep-alive applied to active sockets.
    pub active_timeout: Duration,
    /// How long an idle pooled socket is kept before closing.
    pub idle_timeout: Duration,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self {
            max_sockets: 100,
            max_idle_sockets: 10,
            active_timeout: Duration::from_secs(60),
            idle_timeout: Duration::from_secs(30),
        }
    }
}

/// Transport over pooled, persistent TCP connections.
#[derive(Debug, Clone)]
pub struct SocketTransport {
    client: Client<HttpsConnector<HttpConnector>, SocketBody>,
    permits: Arc<Semaphore>,
    options: SocketOptions,
}

impl SocketTransport {
    pub fn new(options: SocketOptions) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);
        connector.enforce_http(false);
        if !options.active_timeout.is_zero() {
            connector.set_keepalive(Some(options.active_timeout));
        }
        let connector = HttpsConnector::new_with_connector(connector);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(options.idle_timeout)
            .pool_max_idle_per_host(options.max_idle_sockets)
            .pool_timer(TokioTimer::new())
            .build(connector);

        Self {
            client,
            permits: Arc::new(Semaphore::new(options.max_sockets.max(1))),
            options,
        }
    }

    pub fn options(&self) -> &SocketOptions {
        &self.options
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

        let permit = tokio::select! {
            biased;
            _ = signal.cancelled() => return Err(TransportError::Aborted),
            permit = self.permits.clone().acquire_owned() => {
                permit.map_err(|_| TransportError::InvalidRequest("transport closed".into()))?
            }
        };

        let mut builder = hyper::Request::builder().method(method).uri(url);
        if let Some(target) = builder.headers_mut() {
            *target = headers;
        }
        let req = builder
            .body(socket_body(body))
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let response = tokio::select! {
            biased;
            _ = signal.cancelled() => {
                tracing::debug!(url = %url, "Socket exchange aborted");
                return Err(TransportError::Aborted);
            }
            response = self.client.request(req) => response.map_err(TransportError::Connect)?,
        };

        let (parts, incoming) = response.into_parts();
        let body = TryStreamExt::map_err(incoming.into_data_stream(), TransportError::Body)
            .map(move |chunk| {
                let _held = &permit;
                chunk
            })
            .boxed();

        Ok(Response::new(
            parts.status,
            parts.headers,
            abortable(body, signal),
        ))
    }
}

impl Default for SocketTransport {
    fn default() -> Self {
        Self::new(SocketOptions::default())
    }
}

impl Transport for SocketTransport {
    fn request<'a>(
        &'a self,
        url: &'a str,
        request: TransportRequest,
    ) -> BoxFuture<'a, Result<Response, TransportError>> {
        Box::pin(self.exchange(url, request))
    }

    fn name(&self) -> &'static str {
        "socket"
    }
}

fn socket_body(body: TransportBody) -> SocketBody {
    match body {
        TransportBody::Empty => Empty::new().map_err(|never| match never {}).boxed_unsync(),
        TransportBody::Full(bytes) => Full::new(bytes).map_err(|never| match never {}).boxed_unsync(),
        TransportBody::Stream(source) => {
            StreamBody::new(source.map_ok(Frame::data)).boxed_unsync()
        }
    }
}

/// Default user agent for socket clients, tagged with the calling service when known.
pub fn default_user_agent(service: Option<&str>) -> String {
    let service = service
        .map(str::to_owned)
        .or_else(|| env::var(SERVICE_NAME_ENV).ok())
        .filter(|name| !name.is_empty());

    match service {
        Some(name) => format!("Fetch Engine (socket-client,{name})"),
        None => "Fetch Engine (socket-client)".to_string(),
    }
}
