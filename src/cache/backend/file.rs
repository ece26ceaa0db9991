//! File Backend
//!
//! One file per key inside a cache directory. Each file holds an 8-byte
//! big-endian expiry (unix seconds, 0 = never) followed by the payload.
//! Writes go to a temporary file that is renamed into place. Temporary names
//! carry the process id and a process-wide sequence number, so processes and
//! backend instances sharing one directory never write the same temp file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::fs;
use tracing::warn;

use super::BackendAdapter;
use crate::cache::clock::{expiry_after, Clock, SystemClock};
use crate::error::{Error, Result};

const FILE_EXTENSION: &str = "cache";
const HEADER_LEN: usize = 8;

static TMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Directory-backed store
pub struct FileBackend {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileBackend {
    /// Create a file backend rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_clock(dir, Arc::new(SystemClock))
    }

    /// Create a file backend that reads time from `clock`
    pub fn with_clock(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.into(),
            clock,
        }
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Unique temporary path for `stem` inside the cache directory
    fn tmp_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!(
            ".{}.{}.{}.tmp",
            stem,
            std::process::id(),
            TMP_SEQUENCE.fetch_add(1, Ordering::Relaxed)
        ))
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty()
            || key == "."
            || key == ".."
            || key.contains(|c: char| matches!(c, '/' | '\\' | '\0'))
        {
            return Err(Error::InvalidArgument(format!(
                "key {:?} is not a valid file name",
                key
            )));
        }
        Ok(self.dir.join(format!("{}.{}", key, FILE_EXTENSION)))
    }

    async fn read_entry(&self, key: &str) -> Result<Option<Bytes>> {
        let path = self.path_for(key)?;
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if raw.len() < HEADER_LEN {
            let _ = fs::remove_file(&path).await;
            return Err(Error::backend(self.name(), format!("truncated entry {}", key)));
        }

        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&raw[..HEADER_LEN]);
        let expires_at = i64::from_be_bytes(header);
        if expires_at != 0 && self.clock.now().timestamp() > expires_at {
            let _ = fs::remove_file(&path).await;
            return Ok(None);
        }

        Ok(Some(Bytes::from(raw).slice(HEADER_LEN..)))
    }

    async fn write_entry(&self, key: &str, data: Bytes, ttl_secs: Option<u64>) -> Result<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).await?;

        let expires_at = ttl_secs
            .and_then(|ttl| expiry_after(self.clock.now(), ttl))
            .map_or(0, |at| at.timestamp());

        let mut buf = BytesMut::with_capacity(HEADER_LEN + data.len());
        buf.put_i64(expires_at);
        buf.put_slice(&data);

        let tmp = self.tmp_path(key);
        fs::write(&tmp, &buf).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn clear_dir(&self) -> Result<()> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(FILE_EXTENSION) {
                fs::remove_file(&path).await?;
            }
        }
        Ok(())
    }

    async fn probe_writable(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let probe = self.tmp_path("probe");
        fs::write(&probe, b"ok").await?;
        fs::remove_file(&probe).await?;
        Ok(())
    }
}

#[async_trait]
impl BackendAdapter for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn installed(&self) -> bool {
        match self.probe_writable().await {
            Ok(()) => true,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "cache directory is not writable");
                false
            }
        }
    }

    async fn get(&self, key: &str) -> Option<Bytes> {
        match self.read_entry(key).await {
            Ok(data) => data,
            Err(e) => {
                warn!(key = %key, error = %e, "file cache read failed");
                None
            }
        }
    }

    async fn set(&self, key: &str, data: Bytes) -> bool {
        match self.write_entry(key, data, None).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %key, error = %e, "file cache write failed");
                false
            }
        }
    }

    async fn set_expiring(&self, key: &str, data: Bytes, ttl_secs: u64) -> bool {
        match self.write_entry(key, data, Some(ttl_secs)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %key, error = %e, "file cache write failed");
                false
            }
        }
    }

    async fn remove(&self, key: &str) -> bool {
        let path = match self.path_for(key) {
            Ok(path) => path,
            Err(_) => return false,
        };
        match fs::remove_file(&path).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(key = %key, error = %e, "file cache delete failed");
                false
            }
        }
    }

    async fn remove_all(&self) -> bool {
        match self.clear_dir().await {
            Ok(()) => true,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "file cache clear failed");
                false
            }
        }
    }

    async fn exists(&self, key: &str) -> bool {
        matches!(self.read_entry(key).await, Ok(Some(_)))
    }

    fn requires_safe_keys(&self) -> bool {
        true
    }
}

// =============================================================================
// Tests
// =============================================================================
