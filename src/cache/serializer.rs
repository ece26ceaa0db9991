//! Value Serializers
//!
//! Converts decoded cache values to and from the byte form stored by a
//! backend. Every backend is paired with exactly one serializer.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;

use crate::error::{Error, Result};

/// Value serializer
pub trait Serializer: Send + Sync {
    /// Serializer name (for logging)
    fn name(&self) -> &'static str;

    /// Encode a value for storage
    fn serialize(&self, value: &Value) -> Result<Bytes>;

    /// Decode a stored value
    fn unserialize(&self, data: &[u8]) -> Result<Value>;
}

/// Structured binary serializer (MessagePack), the default pairing
#[derive(Debug, Default, Clone, Copy)]
pub struct MessagePackSerializer;

impl Serializer for MessagePackSerializer {
    fn name(&self) -> &'static str {
        "MessagePack"
    }

    fn serialize(&self, value: &Value) -> Result<Bytes> {
        rmp_serde::to_vec_named(value)
            .map(Bytes::from)
            .map_err(|e| Error::serialization(self.name(), e))
    }

    fn unserialize(&self, data: &[u8]) -> Result<Value> {
        rmp_serde::from_slice(data).map_err(|e| Error::serialization(self.name(), e))
    }
}

/// Text serializer for backends whose stored values are read by other clients
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn name(&self) -> &'static str {
        "JSON"
    }

    fn serialize(&self, value: &Value) -> Result<Bytes> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| Error::serialization(self.name(), e))
    }

    fn unserialize(&self, data: &[u8]) -> Result<Value> {
        serde_json::from_slice(data).map_err(|e| Error::serialization(self.name(), e))
    }
}

/// Default serializer handle
pub fn default_serializer() -> Arc<dyn Serializer> {
    Arc::new(MessagePackSerializer)
}
