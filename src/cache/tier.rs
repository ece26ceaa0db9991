//! Process-Local Tier
//!
//! In-process cache of already-decoded values, shared by every facade that
//! holds the same `Arc<ProcessTier>`.
//!
//! Each storage key owns one slot holding `{value, expires_at, hit_count}`.
//! A slot exists before its value does: reads served by the backend bump the
//! hit count, and writes with a TTL record the expiry, so that a later
//! promotion carries the right expiry.
//!
//! # Design
//!
//! - Slots live in a `DashMap`; every operation on one key runs under that
//!   key's shard lock, so the triple is never observed half-updated
//! - Operations on different keys proceed independently
//! - No backend I/O happens while a slot is locked
//! - Explicit removals bump an epoch; a backend read that started before the
//!   removal is not allowed to re-promote the removed value

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;

/// Default number of backend reads before a key is promoted
pub const DEFAULT_HIT_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Default)]
struct TierSlot {
    value: Option<Value>,
    expires_at: Option<DateTime<Utc>>,
    hit_count: u32,
}

impl TierSlot {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |at| now <= at)
    }
}

/// Point-in-time copy of one slot
#[derive(Debug, Clone, PartialEq)]
pub struct TierEntry {
    /// Promoted value, if any
    pub value: Option<Value>,
    /// Recorded expiry (`None` = never)
    pub expires_at: Option<DateTime<Utc>>,
    /// Backend reads since the slot was created
    pub hit_count: u32,
}

/// Shared process-local tier
#[derive(Debug, Default)]
pub struct ProcessTier {
    slots: DashMap<String, TierSlot>,
    epoch: AtomicU64,
}

impl ProcessTier {
    /// Create an empty tier
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the promoted value for `key` if it is still fresh.
    ///
    /// A stale slot is dropped entirely (value, expiry and hit count), so the
    /// key has to earn promotion again.
    pub fn lookup(&self, key: &str, now: DateTime<Utc>) -> Option<Value> {
        let hit = self.slots.get(key).map(|slot| {
            if slot.is_fresh(now) {
                Ok(slot.value.clone())
            } else {
                Err(())
            }
        });

        match hit {
            Some(Ok(value)) => value,
            Some(Err(())) => {
                self.slots.remove_if(key, |_, slot| !slot.is_fresh(now));
                None
            }
            None => None,
        }
    }

    /// Whether a fresh promoted value exists for `key`
    pub fn contains(&self, key: &str, now: DateTime<Utc>) -> bool {
        self.slots
            .get(key)
            .map_or(false, |slot| slot.value.is_some() && slot.is_fresh(now))
    }

    /// Count a backend-served read of `key` and promote `value` once the hit
    /// count reaches `threshold`. A threshold of 0 never promotes.
    ///
    /// Returns true if the value was promoted by this call.
    pub fn record_read(
        &self,
        key: &str,
        value: &Value,
        threshold: u32,
        now: DateTime<Utc>,
    ) -> bool {
        self.record_read_since(key, value, threshold, now, self.epoch())
    }

    /// Current invalidation epoch. Capture it before a backend read and pass
    /// it to [`record_read_since`](Self::record_read_since).
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Same as [`record_read`](Self::record_read), but the read is discarded
    /// (neither counted nor promoted) if an invalidation happened after
    /// `epoch` was observed.
    pub fn record_read_since(
        &self,
        key: &str,
        value: &Value,
        threshold: u32,
        now: DateTime<Utc>,
        epoch: u64,
    ) -> bool {
        let mut slot = match self.slots.entry(key.to_string()) {
            Entry::Occupied(occupied) => occupied.into_ref(),
            Entry::Vacant(vacant) => {
                if self.epoch() != epoch {
                    return false;
                }
                vacant.insert(TierSlot::default())
            }
        };
        if self.epoch() != epoch {
            return false;
        }
        slot.hit_count = slot.hit_count.saturating_add(1);

        if threshold == 0 || slot.hit_count < threshold || !slot.is_fresh(now) {
            return false;
        }

        slot.value = Some(value.clone());
        true
    }

    /// Record a write of `value` to `key`.
    ///
    /// The expiry is recorded whenever one is given. An already promoted value
    /// is overwritten immediately; an unpromoted key only keeps its
    /// bookkeeping.
    pub fn record_write(&self, key: &str, value: &Value, expires_at: Option<DateTime<Utc>>) {
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                slot.expires_at = expires_at;
                if slot.value.is_some() {
                    slot.value = Some(value.clone());
                }
            }
            Entry::Vacant(vacant) => {
                if expires_at.is_some() {
                    vacant.insert(TierSlot {
                        value: None,
                        expires_at,
                        hit_count: 0,
                    });
                }
            }
        }
    }

    /// Drop every trace of `key`
    pub fn forget(&self, key: &str) -> bool {
        self.slots.remove(key).is_some()
    }

    /// Drop every trace of `key` and discard backend reads still in flight
    pub fn invalidate(&self, key: &str) -> bool {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.forget(key)
    }

    /// Drop every slot and discard backend reads still in flight
    pub fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.slots.clear();
    }

    /// Snapshot of the slot for `key`
    pub fn entry(&self, key: &str) -> Option<TierEntry> {
        self.slots.get(key).map(|slot| TierEntry {
            value: slot.value.clone(),
            expires_at: slot.expires_at,
            hit_count: slot.hit_count,
        })
    }

    /// Hit count for `key` (0 when untracked)
    pub fn hit_count(&self, key: &str) -> u32 {
        self.slots.get(key).map_or(0, |slot| slot.hit_count)
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the tier tracks nothing
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of keys holding a promoted value
    pub fn promoted_len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.value.is_some()).count()
    }
}

// =============================================================================
// Tests
// =============================================================================
