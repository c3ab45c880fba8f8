//! JSON codec (UTF-8 text ↔ parsed value).

use bytes::Bytes;
use serde_json::Value;

use crate::codec::{Codec, CodecError};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, value: &Value) -> Result<Bytes, CodecError> {
        Ok(Bytes::from(serde_json::to_vec(value)?))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trip() {
        let value = json!({ "a": 1, "b": [true, null, "x"], "c": { "d": 1.5 } });
        let encoded = JsonCodec.encode(&value).unwrap();
        assert_eq!(JsonCodec.decode(&encoded).unwrap(), value);
    }

    #[test]
    fn decode_rejects_invalid_text() {
        assert!(matches!(
            JsonCodec.decode(b"this is not json"),
            Err(CodecError::Json(_))
        ));
    }
}
