//! Backend Discovery
//!
//! Walks an ordered list of candidates and binds the first one that both
//! connects and reports itself installed. Candidates after the winner are
//! never probed. The outcome is established once per selector, even under
//! concurrent first use, and shared by every facade built from it.

use std::path::PathBuf;
use std::sync::Arc;
#[cfg(feature = "redis-backend")]
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::backend::{BackendPair, FileBackend, MemoryBackend};
use super::clock::{Clock, SystemClock};
use super::config::CacheConfig;
use super::serializer::MessagePackSerializer;

/// One entry in the discovery list
#[async_trait]
pub trait BackendCandidate: Send + Sync {
    /// Candidate name (for logging)
    fn name(&self) -> &str;

    /// Connect and construct the backend pair. `None` means unreachable; a
    /// half-connected handle must not be returned.
    async fn probe(&self) -> Option<BackendPair>;
}

/// Ordered, memoizing backend selector
pub struct BackendSelector {
    candidates: Vec<Box<dyn BackendCandidate>>,
    selected: OnceCell<Option<BackendPair>>,
}

impl BackendSelector {
    /// Create a selector over `candidates`, highest priority first
    pub fn new(candidates: Vec<Box<dyn BackendCandidate>>) -> Self {
        Self {
            candidates,
            selected: OnceCell::new(),
        }
    }

    /// Default discovery order built from configuration: Redis (when
    /// compiled in and configured), file (when configured), memory.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::from_config_with_clock(config, Arc::new(SystemClock))
    }

    /// Same as [`from_config`](Self::from_config) with an explicit clock for
    /// the local backends
    pub fn from_config_with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let mut candidates: Vec<Box<dyn BackendCandidate>> = Vec::new();

        #[cfg(feature = "redis-backend")]
        if let Some(url) = &config.backends.redis_url {
            candidates.push(Box::new(RedisCandidate::new(
                url.clone(),
                Duration::from_millis(config.backends.connect_timeout_ms),
            )));
        }

        if let Some(dir) = &config.backends.file_dir {
            candidates.push(Box::new(FileCandidate::new(dir.clone(), clock.clone())));
        }

        candidates.push(Box::new(MemoryCandidate::new(clock)));
        Self::new(candidates)
    }

    /// Candidate names in probe order
    pub fn candidate_names(&self) -> Vec<&str> {
        self.candidates.iter().map(|c| c.name()).collect()
    }

    /// Select the first available backend, probing at most once
    pub async fn select(&self) -> Option<BackendPair> {
        self.selected
            .get_or_init(|| self.probe_in_order())
            .await
            .clone()
    }

    /// Result of an earlier selection, without probing
    pub fn selected(&self) -> Option<BackendPair> {
        self.selected.get().cloned().flatten()
    }

    async fn probe_in_order(&self) -> Option<BackendPair> {
        for candidate in &self.candidates {
            debug!(candidate = candidate.name(), "probing cache backend");

            let Some(pair) = candidate.probe().await else {
                debug!(candidate = candidate.name(), "cache backend unreachable");
                continue;
            };

            if pair.adapter.installed().await {
                info!(
                    backend = pair.adapter.name(),
                    serializer = pair.serializer.name(),
                    "selected cache backend"
                );
                return Some(pair);
            }
            debug!(candidate = candidate.name(), "cache backend not installed");
        }

        warn!("no cache backend available");
        None
    }
}

/// In-memory fallback candidate. Always available.
pub struct MemoryCandidate {
    clock: Arc<dyn Clock>,
}

impl MemoryCandidate {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl BackendCandidate for MemoryCandidate {
    fn name(&self) -> &str {
        "memory"
    }

    async fn probe(&self) -> Option<BackendPair> {
        Some(BackendPair::new(
            Arc::new(MemoryBackend::with_clock(self.clock.clone())),
            Arc::new(MessagePackSerializer),
        ))
    }
}

/// File-backed candidate. Installed when its directory is writable.
pub struct FileCandidate {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileCandidate {
    pub fn new(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.into(),
            clock,
        }
    }
}

#[async_trait]
impl BackendCandidate for FileCandidate {
    fn name(&self) -> &str {
        "file"
    }

    async fn probe(&self) -> Option<BackendPair> {
        Some(BackendPair::new(
            Arc::new(FileBackend::with_clock(self.dir.clone(), self.clock.clone())),
            Arc::new(MessagePackSerializer),
        ))
    }
}

/// Redis candidate. Connects with a timeout and confirms with a PING.
#[cfg(feature = "redis-backend")]
pub struct RedisCandidate {
    url: String,
    timeout: Duration,
}

#[cfg(feature = "redis-backend")]
impl RedisCandidate {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

#[cfg(feature = "redis-backend")]
#[async_trait]
impl BackendCandidate for RedisCandidate {
    fn name(&self) -> &str {
        "redis"
    }

    async fn probe(&self) -> Option<BackendPair> {
        use super::backend::RedisBackend;
        use super::serializer::JsonSerializer;

        let connect = async {
            let backend = RedisBackend::connect(&self.url).await?;
            backend.ping().await?;
            Ok::<_, crate::error::Error>(backend)
        };

        match tokio::time::timeout(self.timeout, connect).await {
            Ok(Ok(backend)) => Some(BackendPair::new(
                Arc::new(backend),
                Arc::new(JsonSerializer),
            )),
            Ok(Err(e)) => {
                warn!(url = %self.url, error = %e, "Redis probe failed");
                None
            }
            Err(_) => {
                warn!(url = %self.url, timeout = ?self.timeout, "Redis probe timed out");
                None
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
