//! Metrics hooks for cache-aside operations.
//!
//! Implement [`CacheMetrics`] to forward cache events to a monitoring
//! system. The default method bodies log through the `log` crate, so an
//! implementation only needs to override what it actually records.
//!
//! ```ignore
//! use catalog_cache::observability::CacheMetrics;
//! use std::time::Duration;
//!
//! struct PrometheusMetrics;
//!
//! impl CacheMetrics for PrometheusMetrics {
//!     fn record_hit(&self, _key: &str, _duration: Duration) {
//!         // counter!("catalog_cache_hits").inc();
//!     }
//! }
//! ```
//!
//! | Hook | Fired when |
//! |------|-----------|
//! | `record_hit` | read served from cache |
//! | `record_miss` | read fell through to the record store |
//! | `record_set` | snapshot written to cache |
//! | `record_rejected` | conditional write refused because a newer snapshot is cached |
//! | `record_delete` | entry invalidated |
//! | `record_error` | cache call failed or timed out and was swallowed |

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Trait for cache metrics collection.
pub trait CacheMetrics: Send + Sync {
    /// Record a cache hit.
    fn record_hit(&self, key: &str, duration: Duration) {
        debug!("Cache HIT: {} took {:?}", key, duration);
    }

    /// Record a cache miss.
    fn record_miss(&self, key: &str, duration: Duration) {
        debug!("Cache MISS: {} took {:?}", key, duration);
    }

    /// Record a cache set operation.
    fn record_set(&self, key: &str, duration: Duration) {
        debug!("Cache SET: {} took {:?}", key, duration);
    }

    /// Record a conditional write refused by the backend.
    fn record_rejected(&self, key: &str, version: u64) {
        debug!("Cache SET rejected: {} (stale v{})", key, version);
    }

    /// Record a cache delete operation.
    fn record_delete(&self, key: &str, duration: Duration) {
        debug!("Cache DELETE: {} took {:?}", key, duration);
    }

    /// Record a swallowed cache failure.
    fn record_error(&self, key: &str, error: &str) {
        debug!("Cache ERROR for {}: {}", key, error);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_hit(&self, _key: &str, _duration: Duration) {}
    fn record_miss(&self, _key: &str, _duration: Duration) {}
    fn record_set(&self, _key: &str, _duration: Duration) {}
    fn record_rejected(&self, _key: &str, _version: u64) {}
    fn record_delete(&self, _key: &str, _duration: Duration) {}
    fn record_error(&self, _key: &str, _error: &str) {}
}

/// Lock-free event counters.
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    rejected: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time copy of [`AtomicMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub rejected: u64,
    pub deletes: u64,
    pub errors: u64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

impl CacheMetrics for AtomicMetrics {
    fn record_hit(&self, _key: &str, _duration: Duration) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self, _key: &str, _duration: Duration) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_set(&self, _key: &str, _duration: Duration) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    fn record_rejected(&self, _key: &str, _version: u64) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    fn record_delete(&self, _key: &str, _duration: Duration) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self, _key: &str, _error: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }
}

impl<M: CacheMetrics + ?Sized> CacheMetrics for std::sync::Arc<M> {
    fn record_hit(&self, key: &str, duration: Duration) {
        (**self).record_hit(key, duration)
    }

    fn record_miss(&self, key: &str, duration: Duration) {
        (**self).record_miss(key, duration)
    }

    fn record_set(&self, key: &str, duration: Duration) {
        (**self).record_set(key, duration)
    }

    fn record_rejected(&self, key: &str, version: u64) {
        (**self).record_rejected(key, version)
    }

    fn record_delete(&self, key: &str, duration: Duration) {
        (**self).record_delete(key, duration)
    }

    fn record_error(&self, key: &str, error: &str) {
        (**self).record_error(key, error)
    }
}
