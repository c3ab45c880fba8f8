//! Transport subsystem.
//!
//! # Data Flow
//! ```text
//! Engine (method, headers, encoded body, cancellation signal)
//!     → Transport::request(url, TransportRequest)
//!         - socket.rs: pooled keep-alive connections (hyper-util legacy client)
//!         - fetch.rs: reqwest, optionally buffering streamed bodies first
//!     → Response (status, headers, single-consumption body)
//! ```
//!
//! # Design Decisions
//! - Adapters own raw I/O only; retry, timeouts and encoding live in the engine
//! - Cancelling the signal aborts both the exchange and any body still being read
//! - An abort always surfaces as `TransportError::Aborted`, which the engine reports as a timeout

pub mod fetch;
pub mod socket;

use std::fmt;
use std::io;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream::{self, StreamExt};
use http::{HeaderMap, Method};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::http::response::{Response, ResponseBody};
use crate::streaming::ByteSource;

pub use fetch::{FetchOptions, FetchTransport};
pub use socket::{SocketOptions, SocketTransport};

/// Failures raised by a transport adapter.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The cancellation signal fired before the exchange completed.
    #[error("request aborted")]
    Aborted,

    #[error("connection failed: {0}")]
    Connect(#[source] hyper_util::client::legacy::Error),

    #[error("response body failed: {0}")]
    Body(#[source] hyper::Error),

    #[error("fetch failed: {0}")]
    Fetch(#[source] reqwest::Error),

    #[error("request body failed: {0}")]
    RequestBody(#[source] io::Error),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Wire-ready request body.
pub enum TransportBody {
    Empty,
    Full(Bytes),
    Stream(ByteSource),
}

impl TransportBody {
    pub fn is_stream(&self) -> bool {
        matches!(self, TransportBody::Stream(_))
    }
}

impl fmt::Debug for TransportBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportBody::Empty => f.write_str("Empty"),
            TransportBody::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            TransportBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Everything a transport needs for one exchange.
#[derive(Debug)]
pub struct TransportRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: TransportBody,
    pub signal: CancellationToken,
}

/// One `request(url, params) -> response` contract, two implementations.
pub trait Transport: Send + Sync + fmt::Debug {
    fn request<'a>(
        &'a self,
        url: &'a str,
        request: TransportRequest,
    ) -> BoxFuture<'a, Result<Response, TransportError>>;

    /// Short adapter name for logs.
    fn name(&self) -> &'static str;
}

/// Tie a response body to the exchange's signal: once cancelled, the next read fails with
/// [`TransportError::Aborted`] and the body is dropped.
pub(crate) fn abortable(body: ResponseBody, signal: CancellationToken) -> ResponseBody {
    let cancelled = Box::pin(signal.cancelled_owned());

    stream::unfold(Some((body, cancelled)), |state| async move {
        let (mut body, mut cancelled) = state?;
        tokio::select! {
            biased;
            _ = &mut cancelled => Some((Err(TransportError::Aborted), None)),
            chunk = body.next() => chunk.map(|chunk| (chunk, Some((body, cancelled)))),
        }
    })
    .boxed()
}
