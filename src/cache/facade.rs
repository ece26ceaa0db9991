//! Cache Facade - Two-Tier Read/Write Path
//!
//! Fronts one shared backend with the process-local tier.
//!
//! # Read path
//!
//! ```text
//! get(key) ─▶ storage key ─▶ tier fresh? ──yes──▶ value
//!                               │ no
//!                               ▼
//!                        backend.get ─▶ unserialize ─▶ hit_count += 1
//!                                                       │
//!                                     hit_count >= threshold? ─▶ promote
//! ```
//!
//! # Write path
//!
//! Writes record the expiry in the tier, overwrite an already promoted value,
//! and go through to the backend's plain or TTL-aware write.
//!
//! A facade whose activation policy came out false, or that has no backend
//! bound, answers every read with `None` and every write with `false`.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Days, Months, Utc};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::activation::{self, ActivationContext};
use super::backend::BackendPair;
use super::clock::{expiry_after, Clock, SystemClock};
use super::config::CacheConfig;
use super::key::KeyCodec;
use super::metrics::{FacadeMetrics, MetricsSnapshot};
use super::selector::BackendSelector;
use super::tier::ProcessTier;
use crate::error::{Error, Result};

/// Calendar-aware interval. Months and days are added on the calendar, so
/// "one month" from January 31st lands on the last day of February.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalendarInterval {
    pub months: u32,
    pub days: u64,
    pub seconds: u64,
}

impl CalendarInterval {
    pub fn months(months: u32) -> Self {
        Self {
            months,
            ..Default::default()
        }
    }

    pub fn days(days: u64) -> Self {
        Self {
            days,
            ..Default::default()
        }
    }

    /// Seconds from `now` until `now + self`, or `None` on overflow
    fn seconds_from(&self, now: DateTime<Utc>) -> Option<u64> {
        let target = now
            .checked_add_months(Months::new(self.months))?
            .checked_add_days(Days::new(self.days))?;
        let target = expiry_after(target, self.seconds)?;
        u64::try_from((target - now).num_seconds()).ok()
    }
}

/// How long a written value lives
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Expiry {
    /// No expiry
    #[default]
    Never,
    /// Fixed number of seconds (0 = no expiry)
    Seconds(u64),
    /// Calendar interval from now
    Interval(CalendarInterval),
}

impl Expiry {
    /// TTL in seconds relative to `now`; 0 means no expiry
    pub fn ttl_secs(&self, now: DateTime<Utc>) -> u64 {
        match self {
            Expiry::Never => 0,
            Expiry::Seconds(secs) => *secs,
            Expiry::Interval(interval) => interval.seconds_from(now).unwrap_or(0),
        }
    }
}

/// Rounds up to whole seconds, so a non-zero duration never becomes the
/// "no expiry" value 0.
impl From<std::time::Duration> for Expiry {
    fn from(duration: std::time::Duration) -> Self {
        let secs = duration.as_secs();
        if duration.subsec_nanos() > 0 {
            Expiry::Seconds(secs.saturating_add(1))
        } else {
            Expiry::Seconds(secs)
        }
    }
}

impl From<CalendarInterval> for Expiry {
    fn from(interval: CalendarInterval) -> Self {
        Expiry::Interval(interval)
    }
}

/// Whether `value` is falsy: `null`, `false`, zero, `""`, `"0"`, or an empty
/// array / object
pub fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Builder for [`CacheFacade`]
#[derive(Default)]
pub struct CacheFacadeBuilder {
    config: CacheConfig,
    activation: ActivationContext,
    tier: Option<Arc<ProcessTier>>,
    clock: Option<Arc<dyn Clock>>,
    binding: Option<BackendPair>,
}

impl CacheFacadeBuilder {
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn activation(mut self, activation: ActivationContext) -> Self {
        self.activation = activation;
        self
    }

    /// Share an existing process-local tier
    pub fn tier(mut self, tier: Arc<ProcessTier>) -> Self {
        self.tier = Some(tier);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Bind an explicit backend pair
    pub fn backend(mut self, pair: BackendPair) -> Self {
        self.binding = Some(pair);
        self
    }

    /// Bind whatever `selector` picks, unless a backend was set explicitly
    pub async fn build_with_selector(mut self, selector: &BackendSelector) -> CacheFacade {
        if self.binding.is_none() {
            self.binding = selector.select().await;
        }
        self.build()
    }

    pub fn build(self) -> CacheFacade {
        let active = activation::is_active(&self.config, &self.activation);
        if !active {
            info!("caching disabled for this caller");
        }
        match &self.binding {
            Some(pair) => debug!(
                backend = pair.adapter.name(),
                serializer = pair.serializer.name(),
                "cache facade bound"
            ),
            None => info!("no cache backend bound; cache facade is not ready"),
        }

        CacheFacade {
            prefix: RwLock::new(self.config.effective_prefix()),
            hit_threshold: AtomicU32::new(self.config.hit_threshold),
            falsy_is_absent: self.config.falsy_is_absent,
            binding: self.binding,
            tier: self.tier.unwrap_or_default(),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            active,
            metrics: FacadeMetrics::new(),
        }
    }
}

/// Two-tier cache facade
pub struct CacheFacade {
    binding: Option<BackendPair>,
    tier: Arc<ProcessTier>,
    clock: Arc<dyn Clock>,
    prefix: RwLock<String>,
    hit_threshold: AtomicU32,
    active: bool,
    falsy_is_absent: bool,
    metrics: FacadeMetrics,
}

impl CacheFacade {
    pub fn builder() -> CacheFacadeBuilder {
        CacheFacadeBuilder::default()
    }

    /// Facade over `pair` with default configuration and a private tier
    pub fn new(pair: BackendPair) -> Self {
        Self::builder().backend(pair).build()
    }

    /// Backend pair, or `None` when inactive or not ready
    fn bound(&self) -> Option<&BackendPair> {
        if self.active {
            self.binding.as_ref()
        } else {
            None
        }
    }

    /// Storage key for `key` under the current prefix and bound backend
    pub fn storage_key(&self, key: &str) -> String {
        let safe_names = self
            .binding
            .as_ref()
            .map_or(false, |pair| pair.adapter.requires_safe_keys());
        KeyCodec::storage_key(&self.prefix.read(), key, safe_names)
    }

    /// Read and decode `key`
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get_with_threshold(key, 0).await
    }

    /// Read `key`, promoting after `force_threshold` backend reads instead of
    /// the default threshold when non-zero
    pub async fn get_with_threshold<T: DeserializeOwned>(
        &self,
        key: &str,
        force_threshold: u32,
    ) -> Result<Option<T>> {
        match self.get_value(key, force_threshold).await? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| Error::serialization("JSON value", e)),
            None => Ok(None),
        }
    }

    /// Read `key` as an untyped value
    pub async fn get_value(&self, key: &str, force_threshold: u32) -> Result<Option<Value>> {
        let Some(pair) = self.bound() else {
            return Ok(None);
        };
        let storage_key = self.storage_key(key);
        let use_tier = pair.adapter.uses_process_tier();

        if use_tier {
            if let Some(value) = self.tier.lookup(&storage_key, self.clock.now()) {
                debug!(key = %storage_key, "cache hit (tier)");
                self.metrics.record_tier_hit();
                return Ok(Some(value));
            }
        }

        let epoch = self.tier.epoch();
        let start = Instant::now();
        let data = pair.adapter.get(&storage_key).await;
        self.metrics.record_backend_read_latency(start.elapsed());

        let Some(data) = data else {
            debug!(key = %storage_key, "cache miss");
            self.metrics.record_backend_miss();
            if use_tier {
                self.tier.forget(&storage_key);
            }
            return Ok(None);
        };

        let value = pair.serializer.unserialize(&data)?;
        if self.falsy_is_absent && is_falsy(&value) {
            debug!(key = %storage_key, "falsy value treated as miss");
            self.metrics.record_backend_miss();
            return Ok(None);
        }

        debug!(key = %storage_key, "cache hit (backend)");
        self.metrics.record_backend_hit();

        if use_tier {
            let threshold = if force_threshold > 0 {
                force_threshold
            } else {
                self.hit_threshold()
            };
            if self.tier.record_read_since(
                &storage_key,
                &value,
                threshold,
                self.clock.now(),
                epoch,
            ) {
                debug!(key = %storage_key, threshold, "promoted into tier");
                self.metrics.record_promotion();
            }
        }

        Ok(Some(value))
    }

    /// Encode and store `value` under `key`
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        expiry: impl Into<Expiry>,
    ) -> Result<bool> {
        let value =
            serde_json::to_value(value).map_err(|e| Error::serialization("JSON value", e))?;
        self.set_value(key, value, expiry.into()).await
    }

    /// Store an untyped value
    pub async fn set_value(&self, key: &str, value: Value, expiry: Expiry) -> Result<bool> {
        let Some(pair) = self.bound() else {
            return Ok(false);
        };
        let storage_key = self.storage_key(key);
        let use_tier = pair.adapter.uses_process_tier();

        let data = pair.serializer.serialize(&value)?;
        let now = self.clock.now();
        let ttl_secs = expiry.ttl_secs(now);

        if use_tier {
            if self.falsy_is_absent && is_falsy(&value) {
                // Reads report this value as absent; the tier must not serve it
                self.tier.invalidate(&storage_key);
            } else {
                let expires_at = if ttl_secs > 0 {
                    expiry_after(now, ttl_secs)
                } else {
                    None
                };
                self.tier.record_write(&storage_key, &value, expires_at);
            }
        }

        let ok = if ttl_secs > 0 {
            pair.adapter
                .set_expiring(&storage_key, data, ttl_secs)
                .await
        } else {
            pair.adapter.set(&storage_key, data).await
        };

        if !ok {
            warn!(key = %storage_key, backend = pair.adapter.name(), "cache write failed");
            if use_tier {
                self.tier.forget(&storage_key);
            }
        }
        self.metrics.record_write(ok);
        Ok(ok)
    }

    /// Store `value` until the absolute time `at`.
    ///
    /// Fails with [`Error::InvalidArgument`] unless `at` is at least one
    /// second in the future.
    pub async fn set_at_date<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let ttl = (at - self.clock.now()).num_seconds();
        if ttl <= 0 {
            return Err(Error::InvalidArgument(format!(
                "expiry {} for key {:?} is not in the future",
                at, key
            )));
        }
        self.set(key, value, Expiry::Seconds(ttl as u64)).await
    }

    /// Return the cached value for `key`, computing and storing it on a miss
    pub async fn get_or_set_with<T, F, Fut>(
        &self,
        key: &str,
        expiry: impl Into<Expiry>,
        compute: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(value) = self.get(key).await? {
            return Ok(value);
        }
        let value = compute().await?;
        self.set(key, &value, expiry).await?;
        Ok(value)
    }

    /// Delete `key` from the tier and the backend
    pub async fn remove(&self, key: &str) -> bool {
        let Some(pair) = self.bound() else {
            return false;
        };
        let storage_key = self.storage_key(key);

        self.tier.invalidate(&storage_key);
        let ok = pair.adapter.remove(&storage_key).await;
        self.metrics.record_removal();
        ok
    }

    /// Clear the whole tier and every backend value
    pub async fn remove_all(&self) -> bool {
        let Some(pair) = self.bound() else {
            return false;
        };

        self.tier.clear();
        let ok = pair.adapter.remove_all().await;
        self.metrics.record_removal();
        ok
    }

    /// Whether `key` is cached, without decoding it
    pub async fn exists(&self, key: &str) -> bool {
        let Some(pair) = self.bound() else {
            return false;
        };
        let storage_key = self.storage_key(key);

        if pair.adapter.uses_process_tier() && self.tier.contains(&storage_key, self.clock.now())
        {
            return true;
        }
        pair.adapter.exists(&storage_key).await
    }

    /// Current key prefix
    pub fn prefix(&self) -> String {
        self.prefix.read().clone()
    }

    /// Replace the key prefix.
    ///
    /// Every later operation addresses different storage keys; values stored
    /// under the old prefix are not moved.
    pub fn set_prefix(&self, prefix: impl Into<String>) {
        let prefix = prefix.into();
        debug!(prefix = %prefix, "cache prefix changed");
        *self.prefix.write() = prefix;
    }

    /// Default promotion threshold
    pub fn hit_threshold(&self) -> u32 {
        self.hit_threshold.load(Ordering::Relaxed)
    }

    /// Replace the default promotion threshold (0 disables promotion)
    pub fn set_hit_threshold(&self, threshold: u32) {
        self.hit_threshold.store(threshold, Ordering::Relaxed);
    }

    /// A backend and serializer are bound
    pub fn is_ready(&self) -> bool {
        self.binding.is_some()
    }

    /// Activation policy outcome
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Name of the bound backend
    pub fn backend_name(&self) -> Option<&'static str> {
        self.binding.as_ref().map(|pair| pair.adapter.name())
    }

    /// Shared process-local tier
    pub fn tier(&self) -> &Arc<ProcessTier> {
        &self.tier
    }

    /// Metrics snapshot
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

// =============================================================================
// Tests
// =============================================================================
