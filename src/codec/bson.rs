//! BSON codec (byte buffer ↔ structured value).
//!
//! Encoding only accepts objects, since a BSON payload is always a document.
//! `Value` has no notion of an undefined field, so a key missing from the map is
//! absent on the wire while an explicit `null` is kept as BSON null.
//!
//! Decoding promotes binary sub-documents to byte arrays, so a `Vec<u8>` field
//! deserializes straight out of the decoded value.

use bson::{Bson, Document};
use bytes::Bytes;
use serde_json::{Map, Number, Value};

use crate::codec::{value_kind, Codec, CodecError};

#[derive(Debug, Clone, Copy, Default)]
pub struct BsonCodec;

impl Codec for BsonCodec {
    fn encode(&self, value: &Value) -> Result<Bytes, CodecError> {
        let document = to_document(value)?;
        Ok(Bytes::from(bson::to_vec(&document)?))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let document: Document = bson::from_slice(bytes)?;
        Ok(document_to_value(document))
    }
}

/// Convert an object value into a BSON document. `null` becomes an empty document.
pub fn to_document(value: &Value) -> Result<Document, CodecError> {
    match value {
        Value::Object(_) => Ok(bson::to_document(value)?),
        Value::Null => Ok(Document::new()),
        other => Err(CodecError::Unsupported(format!(
            "a BSON document must be an object, got {}",
            value_kind(other)
        ))),
    }
}

pub fn document_to_value(document: Document) -> Value {
    let map: Map<String, Value> = document
        .into_iter()
        .map(|(key, value)| (key, bson_to_value(value)))
        .collect();
    Value::Object(map)
}

fn bson_to_value(value: Bson) -> Value {
    match value {
        Bson::Double(v) => Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null),
        Bson::String(s) => Value::String(s),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_value).collect()),
        Bson::Document(document) => document_to_value(document),
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Int32(v) => Value::from(v),
        Bson::Int64(v) => Value::from(v),
        Bson::Binary(binary) => Value::Array(binary.bytes.into_iter().map(Value::from).collect()),
        Bson::ObjectId(id) => Value::String(id.to_hex()),
        Bson::DateTime(dt) => Value::from(dt.timestamp_millis()),
        other => other.into_relaxed_extjson(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, spec::BinarySubtype, Binary};
    use serde_json::json;

    #[test]
    fn round_trip() {
        let value = json!({
            "name": "record",
            "count": 3,
            "ratio": 0.25,
            "tags": ["a", "b"],
            "nested": { "ok": true, "missing": null }
        });

        let encoded = BsonCodec.encode(&value).unwrap();
        assert_eq!(BsonCodec.decode(&encoded).unwrap(), value);
    }

    #[test]
    fn encode_rejects_non_objects() {
        assert!(matches!(
            BsonCodec.encode(&json!([1, 2])),
            Err(CodecError::Unsupported(_))
        ));
    }

    #[test]
    fn binary_is_promoted_to_bytes() {
        let document = doc! {
            "blob": Binary { subtype: BinarySubtype::Generic, bytes: vec![1, 2, 3] },
        };
        let encoded = bson::to_vec(&document).unwrap();

        let decoded = BsonCodec.decode(&encoded).unwrap();
        assert_eq!(decoded, json!({ "blob": [1, 2, 3] }));

        let blob: Vec<u8> = serde_json::from_value(decoded["blob"].clone()).unwrap();
        assert_eq!(blob, vec![1, 2, 3]);
    }

    #[test]
    fn decode_rejects_truncated_input() {
        let encoded = BsonCodec.encode(&json!({ "a": 1 })).unwrap();
        assert!(BsonCodec.decode(&encoded[..encoded.len() - 2]).is_err());
    }
}
