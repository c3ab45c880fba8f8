//! Request/response subsystem.
//!
//! # Data Flow
//! ```text
//! RequestParams (request.rs)
//!     → engine.rs
//!         - headers.rs: resolve and merge header layers
//!         - codec registry / streaming payload: encode body
//!         - transport call, retry, total timeout
//!     → ResponseHandle (response.rs)
//!         - decode(): decoder.rs (generic or service envelope)
//!         - stream(): read-timeout guarded body
//!         - records(): BSON record stream
//! ```
//!
//! # Design Decisions
//! - The engine is transport-agnostic; it only sees the `Transport` trait
//! - Decoders are plain async functions so callers can swap them per request

pub mod decoder;
pub mod engine;
pub mod headers;
pub mod request;
pub mod response;

pub use decoder::{decode_response, decode_service_response, decoder, Decoder};
pub use engine::Engine;
pub use headers::{construct_headers, header_map, join, merge_headers, HeaderSource};
pub use request::{Body, CommonParams, RequestParams};
pub use response::{BodyStream, RequestMetadata, Response, ResponseHandle};
