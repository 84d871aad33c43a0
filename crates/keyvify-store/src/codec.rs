//! Serialization contract between structured values and stored strings.
//!
//! The store never looks inside the serialized text; it only requires that
//! `deserialize(serialize(v)) == v`. The default [`JsonCodec`] satisfies this
//! for every `serde_json::Value`.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{StoreError, StoreResult};

/// Encode/decode pair used for every value the store persists or caches.
pub trait Codec: Send + Sync {
    /// Encode a value into its stored form.
    fn serialize(&self, value: &Value) -> StoreResult<String>;

    /// Decode a stored string back into a value.
    fn deserialize(&self, raw: &str) -> StoreResult<Value>;
}

/// Compact JSON codec. This is the default.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn serialize(&self, value: &Value) -> StoreResult<String> {
        Ok(serde_json::to_string(value)?)
    }

    fn deserialize(&self, raw: &str) -> StoreResult<Value> {
        Ok(serde_json::from_str(raw)?)
    }
}

type SerializeFn = dyn Fn(&Value) -> Result<String, String> + Send + Sync;
type DeserializeFn = dyn Fn(&str) -> Result<Value, String> + Send + Sync;

/// Codec assembled from a serializer and deserializer closure.
///
/// Closure errors are surfaced as [`StoreError::Serialization`].
#[derive(Clone)]
pub struct FnCodec {
    serializer: Arc<SerializeFn>,
    deserializer: Arc<DeserializeFn>,
}

impl FnCodec {
    pub fn new<S, D>(serializer: S, deserializer: D) -> Self
    where
        S: Fn(&Value) -> Result<String, String> + Send + Sync + 'static,
        D: Fn(&str) -> Result<Value, String> + Send + Sync + 'static,
    {
        Self {
            serializer: Arc::new(serializer),
            deserializer: Arc::new(deserializer),
        }
    }
}

impl Codec for FnCodec {
    fn serialize(&self, value: &Value) -> StoreResult<String> {
        (self.serializer)(value).map_err(StoreError::Serialization)
    }

    fn deserialize(&self, raw: &str) -> StoreResult<Value> {
        (self.deserializer)(raw).map_err(StoreError::Serialization)
    }
}

impl fmt::Debug for FnCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCodec").finish_non_exhaustive()
    }
}
