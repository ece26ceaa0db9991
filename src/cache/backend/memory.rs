//! In-Memory Backend
//!
//! Non-shared fallback store. Always installed; chosen only when nothing
//! else is available. Values live in the facade's own process, so the
//! process-local tier is bypassed for it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::BackendAdapter;
use crate::cache::clock::{expiry_after, Clock, SystemClock};

#[derive(Debug, Clone)]
struct StoredValue {
    data: Bytes,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredValue {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| now <= at)
    }
}

/// Memory backend statistics
#[derive(Debug, Clone, Default)]
pub struct MemoryBackendStats {
    /// Stored entries (expired ones included until touched)
    pub entries: usize,
    /// Read operations
    pub reads: u64,
    /// Write operations
    pub writes: u64,
    /// Delete operations
    pub deletes: u64,
}

/// In-process key-value store
pub struct MemoryBackend {
    storage: DashMap<String, StoredValue>,
    clock: Arc<dyn Clock>,
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl MemoryBackend {
    /// Create a memory backend on the system clock
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a memory backend that reads time from `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            storage: DashMap::new(),
            clock,
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        }
    }

    /// Get backend statistics
    pub fn stats(&self) -> MemoryBackendStats {
        MemoryBackendStats {
            entries: self.storage.len(),
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }

    fn lookup(&self, key: &str) -> Option<Bytes> {
        let now = self.clock.now();
        let fresh = self
            .storage
            .get(key)
            .map(|stored| (stored.is_fresh(now), stored.data.clone()));

        match fresh {
            Some((true, data)) => Some(data),
            Some((false, _)) => {
                self.storage.remove_if(key, |_, stored| !stored.is_fresh(now));
                None
            }
            None => None,
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendAdapter for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn installed(&self) -> bool {
        true
    }

    async fn get(&self, key: &str) -> Option<Bytes> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.lookup(key)
    }

    async fn set(&self, key: &str, data: Bytes) -> bool {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.storage.insert(
            key.to_string(),
            StoredValue {
                data,
                expires_at: None,
            },
        );
        true
    }

    async fn set_expiring(&self, key: &str, data: Bytes, ttl_secs: u64) -> bool {
        self.writes.fetch_add(1, Ordering::Relaxed);
        let expires_at = expiry_after(self.clock.now(), ttl_secs);
        self.storage
            .insert(key.to_string(), StoredValue { data, expires_at });
        true
    }

    async fn remove(&self, key: &str) -> bool {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        self.storage.remove(key).is_some()
    }

    async fn remove_all(&self) -> bool {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        self.storage.clear();
        true
    }

    async fn exists(&self, key: &str) -> bool {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.lookup(key).is_some()
    }

    fn uses_process_tier(&self) -> bool {
        false
    }
}

// =============================================================================
// Tests
// =============================================================================
