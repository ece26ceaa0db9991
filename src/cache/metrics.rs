//! Cache Metrics Collection
//!
//! Counters describing where facade reads were served from.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Facade metrics collector
#[derive(Debug, Default)]
pub struct FacadeMetrics {
    tier_hits: AtomicU64,
    backend_hits: AtomicU64,
    backend_misses: AtomicU64,
    promotions: AtomicU64,
    writes: AtomicU64,
    failed_writes: AtomicU64,
    removals: AtomicU64,

    // Backend read latency (microseconds, exponential moving average)
    backend_read_latency_us: AtomicU64,
}

impl FacadeMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tier_hit(&self) {
        self.tier_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backend_hit(&self) {
        self.backend_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backend_miss(&self) {
        self.backend_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_promotion(&self) {
        self.promotions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self, ok: bool) {
        if ok {
            self.writes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_writes.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_removal(&self) {
        self.removals.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_backend_read_latency(&self, duration: Duration) {
        let new_us = duration.as_micros() as u64;
        let alpha = 0.1; // EMA smoothing factor

        loop {
            let current = self.backend_read_latency_us.load(Ordering::Relaxed);
            let updated = if current == 0 {
                new_us
            } else {
                ((1.0 - alpha) * current as f64 + alpha * new_us as f64) as u64
            };

            if self
                .backend_read_latency_us
                .compare_exchange_weak(current, updated, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }
    }

    /// Fraction of reads answered by the process-local tier
    pub fn tier_hit_ratio(&self) -> f64 {
        let tier = self.tier_hits.load(Ordering::Relaxed) as f64;
        let total = tier
            + self.backend_hits.load(Ordering::Relaxed) as f64
            + self.backend_misses.load(Ordering::Relaxed) as f64;
        if total == 0.0 {
            0.0
        } else {
            tier / total
        }
    }

    /// Get a point-in-time snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tier_hits: self.tier_hits.load(Ordering::Relaxed),
            backend_hits: self.backend_hits.load(Ordering::Relaxed),
            backend_misses: self.backend_misses.load(Ordering::Relaxed),
            promotions: self.promotions.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            failed_writes: self.failed_writes.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
            tier_hit_ratio: self.tier_hit_ratio(),
            backend_read_latency: Duration::from_micros(
                self.backend_read_latency_us.load(Ordering::Relaxed),
            ),
        }
    }
}

/// Point-in-time metrics
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub tier_hits: u64,
    pub backend_hits: u64,
    pub backend_misses: u64,
    pub promotions: u64,
    pub writes: u64,
    pub failed_writes: u64,
    pub removals: u64,
    pub tier_hit_ratio: f64,
    pub backend_read_latency: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_counters() {
        let metrics = FacadeMetrics::new();
        metrics.record_tier_hit();
        metrics.record_backend_hit();
        metrics.record_backend_hit();
        metrics.record_backend_miss();
        metrics.record_promotion();
        metrics.record_write(true);
        metrics.record_write(false);
        metrics.record_removal();

        let snap = metrics.snapshot();
        assert_eq!(snap.tier_hits, 1);
        assert_eq!(snap.backend_hits, 2);
        assert_eq!(snap.backend_misses, 1);
        assert_eq!(snap.promotions, 1);
        assert_eq!(snap.writes, 1);
        assert_eq!(snap.failed_writes, 1);
        assert_eq!(snap.removals, 1);
        assert!((snap.tier_hit_ratio - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_latency_ema() {
        let metrics = FacadeMetrics::new();
        metrics.record_backend_read_latency(Duration::from_micros(100));
        assert_eq!(metrics.snapshot().backend_read_latency, Duration::from_micros(100));

        metrics.record_backend_read_latency(Duration::from_micros(200));
        assert_eq!(metrics.snapshot().backend_read_latency, Duration::from_micros(110));
    }
}
