//! Transport-agnostic HTTP request engine.
//!
//! Requests go through an injected [`Transport`](transport::Transport) (pooled
//! sockets or a fetch-style client). The engine applies timeout and retry
//! policy, negotiates body encoding through codecs, and hands back a
//! [`ResponseHandle`](crate::http::ResponseHandle) with lazy `decode()` and `stream()`.

// Core pipeline
pub mod codec;
pub mod http;
pub mod streaming;
pub mod transport;

// Client surface
pub mod client;
pub mod config;
pub mod error;

// Cross-cutting concerns
pub mod observability;
pub mod resilience;

pub use client::{ClientOptions, NetworkClient};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use self::http::{Body, RequestParams, ResponseHandle};
pub use streaming::StreamPayload;
