//! Streamed request payloads.

use std::fmt;
use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use futures_util::stream::{self, BoxStream, StreamExt};
use http::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde_json::Value;

use crate::codec::bson::to_document;
use crate::codec::content_type;

/// Byte source backing a raw or header-framed payload.
pub type ByteSource = BoxStream<'static, io::Result<Bytes>>;

/// Record source backing a record-stream payload.
pub type RecordSource = BoxStream<'static, io::Result<Value>>;

/// Separates the serialized header document from the body bytes.
pub const HEADER_DELIMITER: &[u8] = b"\n";

/// Variant tag of a [`StreamPayload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Raw,
    Header,
    Records,
}

impl StreamKind {
    /// Content type announced for this kind of stream, if any.
    pub fn content_type(self) -> Option<&'static str> {
        match self {
            StreamKind::Raw => None,
            StreamKind::Header => Some(content_type::HEADER_STREAM),
            StreamKind::Records => Some(content_type::RECORD_STREAM),
        }
    }
}

/// A request body backed by a live source plus an optional header.
pub enum StreamPayload {
    /// Bytes passed through untouched.
    Raw { source: ByteSource },
    /// Header document, delimiter, then the raw body bytes.
    Header { source: ByteSource, header: Value },
    /// Header document, delimiter, then each record encoded as a BSON document.
    Records { source: RecordSource, header: Value },
}

impl StreamPayload {
    pub fn raw(source: ByteSource) -> Self {
        StreamPayload::Raw { source }
    }

    pub fn header(source: ByteSource, header: Value) -> Self {
        StreamPayload::Header { source, header }
    }

    pub fn records(source: RecordSource, header: Value) -> Self {
        StreamPayload::Records { source, header }
    }

    /// Raw payload over an in-memory list of chunks.
    pub fn from_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Bytes>,
        I::IntoIter: Send + 'static,
    {
        let source = stream::iter(chunks.into_iter().map(|chunk| Ok(chunk.into())));
        Self::raw(source.boxed())
    }

    /// Record payload over an in-memory list of values.
    pub fn from_records<I>(records: I, header: Value) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: Send + 'static,
    {
        let source = stream::iter(records.into_iter().map(Ok));
        Self::records(source.boxed(), header)
    }

    pub fn kind(&self) -> StreamKind {
        match self {
            StreamPayload::Raw { .. } => StreamKind::Raw,
            StreamPayload::Header { .. } => StreamKind::Header,
            StreamPayload::Records { .. } => StreamKind::Records,
        }
    }

    pub fn is_raw(&self) -> bool {
        self.kind() == StreamKind::Raw
    }

    pub fn is_header(&self) -> bool {
        self.kind() == StreamKind::Header
    }

    pub fn is_record_stream(&self) -> bool {
        self.kind() == StreamKind::Records
    }

    /// The attached header. Raw payloads never carry one.
    pub fn header_value(&self) -> Option<&Value> {
        match self {
            StreamPayload::Raw { .. } => None,
            StreamPayload::Header { header, .. } | StreamPayload::Records { header, .. } => {
                Some(header)
            }
        }
    }

    /// Replace the header, keeping the same underlying body.
    ///
    /// Raw payloads ignore the header.
    pub fn set_header(self, header: Value) -> Self {
        match self {
            StreamPayload::Raw { source } => StreamPayload::Raw { source },
            StreamPayload::Header { source, .. } => StreamPayload::Header { source, header },
            StreamPayload::Records { source, .. } => StreamPayload::Records { source, header },
        }
    }

    /// Produce the byte stream sent over the wire.
    pub fn encode(self) -> ByteSource {
        match self {
            StreamPayload::Raw { source } => source,
            StreamPayload::Header { source, header } => prepend_header(&header, source),
            StreamPayload::Records { source, header } => {
                let encoded = source.map(|record| record.and_then(|value| encode_record(&value)));
                prepend_header(&header, encoded.boxed())
            }
        }
    }
}

impl fmt::Debug for StreamPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamPayload")
            .field("kind", &self.kind())
            .field("header", &self.header_value())
            .finish_non_exhaustive()
    }
}

impl From<ByteSource> for StreamPayload {
    fn from(source: ByteSource) -> Self {
        StreamPayload::raw(source)
    }
}

/// Headers a transport must send for this payload.
pub fn headers_for_stream(payload: &StreamPayload) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(content_type) = payload.kind().content_type() {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    }
    headers
}

/// Serialize a header document followed by the delimiter.
pub fn frame_header(header: &Value) -> io::Result<Bytes> {
    let document = to_document(header).map_err(io::Error::other)?;
    let encoded = bson::to_vec(&document).map_err(io::Error::other)?;

    let mut framed = BytesMut::with_capacity(encoded.len() + HEADER_DELIMITER.len());
    framed.put_slice(&encoded);
    framed.put_slice(HEADER_DELIMITER);
    Ok(framed.freeze())
}

fn encode_record(record: &Value) -> io::Result<Bytes> {
    let document = to_document(record).map_err(io::Error::other)?;
    bson::to_vec(&document)
        .map(Bytes::from)
        .map_err(io::Error::other)
}

fn prepend_header(header: &Value, body: ByteSource) -> ByteSource {
    let framed = frame_header(header);
    stream::once(async move { framed }).chain(body).boxed()
}
