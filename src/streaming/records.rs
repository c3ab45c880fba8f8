//! Decoding of length-prefixed BSON record streams.
//!
//! Every BSON document starts with its total length as a little-endian `i32`,
//! so records are recovered from arbitrary chunk boundaries without any extra
//! framing. Several records in one chunk and one record spread over several
//! chunks are both handled.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, Bytes, BytesMut};
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use serde_json::Value;

use crate::codec::{BsonCodec, Codec};
use crate::error::{Error, Result};
use crate::streaming::payload::HEADER_DELIMITER;

const LENGTH_PREFIX: usize = 4;
/// Length prefix plus the trailing NUL of an empty document.
const MIN_DOCUMENT_LEN: usize = 5;
/// Largest document accepted, matching the BSON size limit.
const MAX_DOCUMENT_LEN: usize = 16 * 1024 * 1024;

/// Stream of values decoded from a byte stream of concatenated BSON documents.
pub struct RecordDecoder<S> {
    inner: S,
    buffer: BytesMut,
    done: bool,
}

impl<S> RecordDecoder<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            buffer: BytesMut::new(),
            done: false,
        }
    }

    /// Pop the next complete document off the buffer, if one is available.
    fn next_record(&mut self) -> Option<Result<Value>> {
        let len = match document_len(&self.buffer)? {
            Ok(len) => len,
            Err(err) => {
                self.done = true;
                return Some(Err(err));
            }
        };
        if self.buffer.len() < len {
            return None;
        }

        let document = self.buffer.split_to(len);
        Some(BsonCodec.decode(&document).map_err(Error::from))
    }
}

impl<S, E> Stream for RecordDecoder<S>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: Into<Error>,
{
    type Item = Result<Value>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if this.done {
                return Poll::Ready(None);
            }

            if let Some(record) = this.next_record() {
                return Poll::Ready(Some(record));
            }

            match futures_util::ready!(this.inner.poll_next_unpin(cx)) {
                Some(Ok(chunk)) => this.buffer.extend_from_slice(&chunk),
                Some(Err(err)) => {
                    this.done = true;
                    return Poll::Ready(Some(Err(err.into())));
                }
                None => {
                    this.done = true;
                    if this.buffer.is_empty() {
                        return Poll::Ready(None);
                    }
                    let remaining = this.buffer.len();
                    return Poll::Ready(Some(Err(Error::Stream(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("record stream ended inside a document ({remaining} bytes left)"),
                    )))));
                }
            }
        }
    }
}

/// Read a framed header document off the front of a header stream.
///
/// Returns the header and the remaining body bytes.
pub async fn split_header<S, E>(mut source: S) -> Result<(Value, BoxStream<'static, Result<Bytes>>)>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin + Send + 'static,
    E: Into<Error> + 'static,
{
    let mut buffer = BytesMut::new();

    loop {
        if let Some(len) = document_len(&buffer).transpose()? {
            let framed = len + HEADER_DELIMITER.len();
            if buffer.len() >= framed {
                let document = buffer.split_to(len);
                if &buffer[..HEADER_DELIMITER.len()] != HEADER_DELIMITER {
                    return Err(Error::Stream(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "header document is not followed by the delimiter",
                    )));
                }
                buffer.advance(HEADER_DELIMITER.len());

                let header = BsonCodec.decode(&document)?;
                let leftover = buffer.freeze();
                let rest = stream::iter((!leftover.is_empty()).then(|| Ok(leftover)))
                    .chain(source.map(|chunk| chunk.map_err(Into::into)))
                    .boxed();
                return Ok((header, rest));
            }
        }

        match source.next().await {
            Some(chunk) => buffer.extend_from_slice(&chunk.map_err(Into::into)?),
            None => {
                return Err(Error::Stream(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream ended before the header was complete",
                )))
            }
        }
    }
}

/// Length of the document at the front of `buffer`, once the prefix is readable.
fn document_len(buffer: &[u8]) -> Option<Result<usize>> {
    if buffer.len() < LENGTH_PREFIX {
        return None;
    }
    let mut prefix = [0u8; LENGTH_PREFIX];
    prefix.copy_from_slice(&buffer[..LENGTH_PREFIX]);
    let len = i32::from_le_bytes(prefix);

    match usize::try_from(len) {
        Ok(len) if (MIN_DOCUMENT_LEN..=MAX_DOCUMENT_LEN).contains(&len) => Some(Ok(len)),
        _ => Some(Err(Error::Stream(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid BSON document length {len}"),
        )))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::StreamPayload;
    use futures_util::TryStreamExt;
    use serde_json::json;

    fn chunks(parts: Vec<Vec<u8>>) -> impl Stream<Item = Result<Bytes>> + Unpin {
        stream::iter(parts.into_iter().map(|part| Ok(Bytes::from(part))))
    }

    fn encoded(value: serde_json::Value) -> Vec<u8> {
        BsonCodec.encode(&value).unwrap().to_vec()
    }

    #[tokio::test]
    async fn multiple_records_in_one_chunk() {
        let mut bytes = encoded(json!({ "a": 1 }));
        bytes.extend(encoded(json!({ "a": 2 })));

        let records: Vec<Value> = RecordDecoder::new(chunks(vec![bytes]))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(records, vec![json!({ "a": 1 }), json!({ "a": 2 })]);
    }

    #[tokio::test]
    async fn record_split_across_chunks() {
        let bytes = encoded(json!({ "name": "split" }));
        let (head, tail) = bytes.split_at(3);

        let records: Vec<Value> = RecordDecoder::new(chunks(vec![head.to_vec(), tail.to_vec()]))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(records, vec![json!({ "name": "split" })]);
    }

    #[tokio::test]
    async fn truncated_stream_is_an_error() {
        let bytes = encoded(json!({ "a": 1 }));
        let mut decoder = RecordDecoder::new(chunks(vec![bytes[..6].to_vec()]));

        assert!(matches!(decoder.next().await, Some(Err(Error::Stream(_)))));
        assert!(decoder.next().await.is_none());
    }

    #[tokio::test]
    async fn invalid_length_is_an_error() {
        let mut decoder = RecordDecoder::new(chunks(vec![vec![1, 0, 0, 0, 0]]));
        assert!(matches!(decoder.next().await, Some(Err(Error::Stream(_)))));
    }

    #[tokio::test]
    async fn oversized_length_fails_before_buffering() {
        let prefix = i32::MAX.to_le_bytes().to_vec();
        let mut decoder = RecordDecoder::new(chunks(vec![prefix]).chain(stream::pending()));

        assert!(matches!(decoder.next().await, Some(Err(Error::Stream(_)))));
        assert!(decoder.next().await.is_none());
    }

    #[test]
    fn document_at_size_limit_is_accepted() {
        let prefix = (MAX_DOCUMENT_LEN as i32).to_le_bytes();
        assert!(matches!(document_len(&prefix), Some(Ok(MAX_DOCUMENT_LEN))));

        let over = (MAX_DOCUMENT_LEN as i32 + 1).to_le_bytes();
        assert!(matches!(document_len(&over), Some(Err(_))));
    }

    #[tokio::test]
    async fn split_header_recovers_framed_header() {
        let payload = StreamPayload::from_records(
            vec![json!({ "n": 1 }), json!({ "n": 2 })],
            json!({ "kind": "batch" }),
        );
        let source = payload.encode().map_err(Error::Stream);

        let (header, rest) = split_header(source).await.unwrap();
        assert_eq!(header, json!({ "kind": "batch" }));

        let records: Vec<Value> = RecordDecoder::new(rest).try_collect().await.unwrap();
        assert_eq!(records, vec![json!({ "n": 1 }), json!({ "n": 2 })]);
    }
}
