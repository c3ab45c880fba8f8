//! Codec registry subsystem.
//!
//! # Data Flow
//! ```text
//! Content-Type header ("application/json; charset=utf-8")
//!     → normalize() (strip parameters, lowercase)
//!     → CodecRegistry::lookup()
//!         - per-client overrides first (request encoding only)
//!         - then the process-wide default registry
//!     → Codec::encode (request body) / Codec::decode (response body)
//! ```
//!
//! # Design Decisions
//! - Lookups are total: absence is `None`, never an error
//! - The default registry is built once and read-only afterwards
//! - Values cross the codec boundary as `serde_json::Value`

pub mod bson;
pub mod json;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

pub use self::bson::BsonCodec;
pub use self::json::JsonCodec;

/// Content types understood by the engine.
pub mod content_type {
    pub const JSON: &str = "application/json";
    pub const BSON: &str = "application/bson";
    /// Raw body preceded by a serialized header document.
    pub const HEADER_STREAM: &str = "application/vnd.journeyapps.raw+header";
    /// BSON records preceded by a serialized header document.
    pub const RECORD_STREAM: &str = "application/vnd.journeyapps.bson-stream+header";
}

/// Errors raised while encoding or decoding a body.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("BSON encode: {0}")]
    BsonEncode(#[from] ::bson::ser::Error),

    #[error("BSON decode: {0}")]
    BsonDecode(#[from] ::bson::de::Error),

    #[error("unsupported value: {0}")]
    Unsupported(String),
}

/// A symmetric encode/decode pair bound to a content type.
pub trait Codec: Send + Sync + fmt::Debug {
    fn encode(&self, value: &Value) -> Result<Bytes, CodecError>;
    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError>;
}

/// Strip `;`-delimited parameters and normalize case.
pub fn normalize(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Name of a value's type as reported in encoding errors.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Maps normalized content types to codecs.
#[derive(Debug, Clone, Default)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn Codec>>,
}

static DEFAULT_CODECS: OnceLock<CodecRegistry> = OnceLock::new();

impl CodecRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in JSON and BSON codecs.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(content_type::JSON, JsonCodec);
        registry.register(content_type::BSON, BsonCodec);
        registry
    }

    /// The process-wide default registry.
    pub fn global() -> &'static CodecRegistry {
        DEFAULT_CODECS.get_or_init(Self::with_defaults)
    }

    /// Register a codec, replacing any previous entry for the same content type.
    pub fn register(&mut self, content_type: &str, codec: impl Codec + 'static) {
        self.register_arc(content_type, Arc::new(codec));
    }

    pub fn register_arc(&mut self, content_type: &str, codec: Arc<dyn Codec>) {
        self.codecs.insert(normalize(content_type), codec);
    }

    /// Find the codec for a content type. Parameters such as `charset` are ignored.
    pub fn lookup(&self, content_type: &str) -> Option<Arc<dyn Codec>> {
        self.codecs.get(&normalize(content_type)).cloned()
    }

    /// Fill in entries from `fallback` that this registry does not define.
    pub fn or(mut self, fallback: &CodecRegistry) -> Self {
        for (key, codec) in &fallback.codecs {
            self.codecs.entry(key.clone()).or_insert_with(|| codec.clone());
        }
        self
    }
}
