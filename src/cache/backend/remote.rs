//! Redis Backend
//!
//! Remote shared tier over a multiplexed, auto-reconnecting connection.

use async_trait::async_trait;
use bytes::Bytes;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;

use super::BackendAdapter;
use crate::error::{Error, Result};

/// Redis-backed store
#[derive(Clone)]
pub struct RedisBackend {
    url: String,
    conn: ConnectionManager,
}

impl RedisBackend {
    /// Open a connection to `url` (e.g. `redis://127.0.0.1:6379`)
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| Error::backend("redis", e))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| Error::backend("redis", e))?;

        Ok(Self {
            url: url.to_string(),
            conn,
        })
    }

    /// Endpoint this backend is connected to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Round-trip a PING
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::backend("redis", e))?;
        Ok(())
    }
}

#[async_trait]
impl BackendAdapter for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn installed(&self) -> bool {
        self.ping().await.is_ok()
    }

    async fn get(&self, key: &str) -> Option<Bytes> {
        let mut conn = self.conn.clone();
        match conn.get::<_, Option<Vec<u8>>>(key).await {
            Ok(data) => data.map(Bytes::from),
            Err(e) => {
                warn!(key = %key, error = %e, "Redis GET error");
                None
            }
        }
    }

    async fn set(&self, key: &str, data: Bytes) -> bool {
        let mut conn = self.conn.clone();
        match conn.set::<_, _, ()>(key, data.as_ref()).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %key, error = %e, "Redis SET error");
                false
            }
        }
    }

    async fn set_expiring(&self, key: &str, data: Bytes, ttl_secs: u64) -> bool {
        let mut conn = self.conn.clone();
        match conn.set_ex::<_, _, ()>(key, data.as_ref(), ttl_secs).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %key, ttl_secs, error = %e, "Redis SETEX error");
                false
            }
        }
    }

    async fn remove(&self, key: &str) -> bool {
        let mut conn = self.conn.clone();
        match conn.del::<_, i64>(key).await {
            Ok(removed) => removed > 0,
            Err(e) => {
                warn!(key = %key, error = %e, "Redis DEL error");
                false
            }
        }
    }

    async fn remove_all(&self) -> bool {
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<()> = redis::cmd("FLUSHDB").query_async(&mut conn).await;
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Redis FLUSHDB error");
                false
            }
        }
    }

    async fn exists(&self, key: &str) -> bool {
        let mut conn = self.conn.clone();
        match conn.exists::<_, bool>(key).await {
            Ok(found) => found,
            Err(e) => {
                warn!(key = %key, error = %e, "Redis EXISTS error");
                false
            }
        }
    }
}
