//! In-memory cache backend (default, thread-safe, async).
//!
//! Uses DashMap for concurrent access with per-key sharding. Expiry is
//! checked on access against the tokio clock, so paused-time tests can
//! advance past a TTL without sleeping.

use super::{CacheBackend, SetOutcome};
use crate::error::Result;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Stored value with optional expiration and commit version.
struct CacheEntry {
    data: Vec<u8>,
    version: Option<u64>,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn new(data: Vec<u8>, version: Option<u64>, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.map(|d| Instant::now() + d);
        CacheEntry {
            data,
            version,
            expires_at,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }

    /// Live and stamped with a version strictly above `version`.
    fn is_newer_than(&self, version: u64) -> bool {
        !self.is_expired() && self.version.is_some_and(|cached| cached > version)
    }
}

/// Thread-safe async in-memory cache backend.
///
/// Conditional writes are atomic: the version comparison and the insert
/// happen under the same shard lock.
///
/// # Example
///
/// ```no_run
/// use catalog_cache::backend::{InMemoryBackend, CacheBackend};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let backend = InMemoryBackend::new();
///
///     backend.set("product:1", b"snapshot".to_vec(), Some(Duration::from_secs(300))).await?;
///     assert!(backend.get("product:1").await?.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct InMemoryBackend {
    store: Arc<DashMap<String, CacheEntry>>,
}

impl InMemoryBackend {
    /// Create a new in-memory cache backend.
    pub fn new() -> Self {
        InMemoryBackend {
            store: Arc::new(DashMap::new()),
        }
    }

    /// Number of stored entries, expired ones included until touched.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Version recorded with a live entry, if any.
    pub fn version_of(&self, key: &str) -> Option<u64> {
        self.store
            .get(key)
            .filter(|entry| !entry.is_expired())
            .and_then(|entry| entry.version)
    }

    /// Time left before a live entry expires.
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        self.store
            .get(key)
            .filter(|entry| !entry.is_expired())
            .and_then(|entry| entry.expires_at)
            .map(|exp| exp.saturating_duration_since(Instant::now()))
    }

    /// Snapshot of entry and byte counts.
    pub fn stats(&self) -> CacheStats {
        let total_bytes: usize = self.store.iter().map(|entry| entry.data.len()).sum();
        let expired_count = self.store.iter().filter(|entry| entry.is_expired()).count();

        CacheStats {
            total_entries: self.store.len(),
            expired_entries: expired_count,
            total_bytes,
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.store.get(key) {
            if !entry.is_expired() {
                debug!("✓ InMemory GET {} -> HIT", key);
                return Ok(Some(entry.data.clone()));
            }
        }

        // Drop the expired entry, but only if nobody replaced it meanwhile.
        self.store.remove_if(key, |_, entry| entry.is_expired());
        debug!("✓ InMemory GET {} -> MISS", key);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        self.store
            .insert(key.to_string(), CacheEntry::new(value, None, ttl));
        debug!("✓ InMemory SET {} (TTL: {:?})", key, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.remove(key);
        debug!("✓ InMemory DELETE {}", key);
        Ok(())
    }

    async fn set_if_newer(
        &self,
        key: &str,
        value: Vec<u8>,
        version: u64,
        ttl: Option<Duration>,
    ) -> Result<SetOutcome> {
        match self.store.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let current = occupied.get();
                if current.is_newer_than(version) {
                    debug!(
                        "✗ InMemory SET {} rejected (cached v{:?} > v{})",
                        key, current.version, version
                    );
                    return Ok(SetOutcome::Rejected);
                }
                occupied.insert(CacheEntry::new(value, Some(version), ttl));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CacheEntry::new(value, Some(version), ttl));
            }
        }
        debug!("✓ InMemory SET {} v{} (TTL: {:?})", key, version, ttl);
        Ok(SetOutcome::Stored)
    }

    async fn delete_if_not_newer(&self, key: &str, version: u64) -> Result<bool> {
        if let Entry::Occupied(occupied) = self.store.entry(key.to_string()) {
            if occupied.get().is_newer_than(version) {
                debug!(
                    "✗ InMemory DELETE {} kept (cached v{:?} > v{})",
                    key,
                    occupied.get().version,
                    version
                );
                return Ok(false);
            }
            occupied.remove();
        }
        debug!("✓ InMemory DELETE {} (<= v{})", key, version);
        Ok(true)
    }
}

/// Cache statistics.
#[derive(Clone, Debug)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub total_bytes: usize,
}
