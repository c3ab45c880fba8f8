//! Streaming payload subsystem.
//!
//! # Data Flow
//! ```text
//! Request side:
//!     caller byte/record source + optional header
//!         → payload.rs (StreamPayload::{Raw, Header, Records})
//!         → encode(): [header document][delimiter][body bytes | BSON records]
//!         → transport body
//!
//! Response side:
//!     response byte stream
//!         → records.rs (split length-prefixed BSON documents)
//!         → stream of decoded values
//! ```
//!
//! # Design Decisions
//! - Sources are consumed at most once; encoding takes the payload by value
//! - Records are pulled and encoded one at a time, so producer backpressure is preserved
//! - The header document is self-describing BSON, so no length field is added around it

pub mod payload;
pub mod records;

pub use payload::{
    headers_for_stream, ByteSource, RecordSource, StreamKind, StreamPayload, HEADER_DELIMITER,
};
pub use records::{split_header, RecordDecoder};
