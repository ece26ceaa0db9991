//! Shared Cache Backends
//!
//! Raw key-value storage behind the facade. A backend stores opaque bytes;
//! encoding values is the paired [`Serializer`]'s job.
//!
//! Adapters never surface errors on the data path: a failed write returns
//! `false`, a failed read returns `None`, and the failure is logged.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::serializer::Serializer;

mod file;
mod memory;
#[cfg(feature = "redis-backend")]
mod remote;

pub use file::FileBackend;
pub use memory::{MemoryBackend, MemoryBackendStats};
#[cfg(feature = "redis-backend")]
pub use remote::RedisBackend;

/// Storage adapter for one caching technology
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Backend name (for logging)
    fn name(&self) -> &'static str;

    /// Whether the backend is usable in this environment
    async fn installed(&self) -> bool;

    /// Read a stored value
    async fn get(&self, key: &str) -> Option<Bytes>;

    /// Store a value without expiry
    async fn set(&self, key: &str, data: Bytes) -> bool;

    /// Store a value that expires after `ttl_secs` seconds
    async fn set_expiring(&self, key: &str, data: Bytes, ttl_secs: u64) -> bool;

    /// Delete a value
    async fn remove(&self, key: &str) -> bool;

    /// Delete every value
    async fn remove_all(&self) -> bool;

    /// Check whether a value is stored
    async fn exists(&self, key: &str) -> bool;

    /// Keys must be valid file names
    fn requires_safe_keys(&self) -> bool {
        false
    }

    /// Whether the facade should keep a process-local tier in front of this
    /// backend. In-process backends return false.
    fn uses_process_tier(&self) -> bool {
        true
    }
}

/// A backend together with the serializer it is paired with
#[derive(Clone)]
pub struct BackendPair {
    /// Storage adapter
    pub adapter: Arc<dyn BackendAdapter>,
    /// Value serializer
    pub serializer: Arc<dyn Serializer>,
}

impl BackendPair {
    /// Pair an adapter with a serializer
    pub fn new(adapter: Arc<dyn BackendAdapter>, serializer: Arc<dyn Serializer>) -> Self {
        Self {
            adapter,
            serializer,
        }
    }

    /// Pair an adapter with the default serializer
    pub fn with_default_serializer(adapter: Arc<dyn BackendAdapter>) -> Self {
        Self::new(adapter, super::serializer::default_serializer())
    }
}

impl std::fmt::Debug for BackendPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendPair")
            .field("adapter", &self.adapter.name())
            .field("serializer", &self.serializer.name())
            .finish()
    }
}
