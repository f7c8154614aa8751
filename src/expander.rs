//! Cache half of the cache-aside orchestration.
//!
//! [`CacheAside`] owns every interaction with the cache store: bounded
//! lookups, fills, invalidations and write-path refreshes. None of its
//! operations can fail the caller. A backend error or an elapsed timeout is
//! logged, reported to metrics, and turned into "behave as if the entry were
//! absent".

use crate::backend::{CacheBackend, SetOutcome};
use crate::config::{CatalogConfig, DEFAULT_CACHE_TIMEOUT, DEFAULT_TTL};
use crate::entity::CacheEntity;
use crate::error::{Error, Result};
use crate::key::CacheKeyBuilder;
use crate::observability::{CacheMetrics, NoOpMetrics};
use std::future::Future;
use std::time::{Duration, Instant};

/// Cache-side operations with best-effort failure semantics.
///
/// # Example
///
/// ```ignore
/// use catalog_cache::{CacheAside, backend::InMemoryBackend};
/// use std::time::Duration;
///
/// let cache = CacheAside::new(InMemoryBackend::new())
///     .with_ttl(Duration::from_secs(300))
///     .with_timeout(Duration::from_millis(250));
///
/// let key = cache.key_for::<ProductRecord>(&record.id)?;
/// cache.fill(&record).await;
/// assert!(cache.lookup::<ProductRecord>(&key).await.is_some());
/// ```
pub struct CacheAside<B: CacheBackend> {
    backend: B,
    metrics: Box<dyn CacheMetrics>,
    ttl: Duration,
    timeout: Duration,
    versioned_writes: bool,
}

impl<B: CacheBackend> CacheAside<B> {
    /// Create with default TTL (300 s), timeout (250 ms) and versioned writes.
    pub fn new(backend: B) -> Self {
        CacheAside {
            backend,
            metrics: Box::new(NoOpMetrics),
            ttl: DEFAULT_TTL,
            timeout: DEFAULT_CACHE_TIMEOUT,
            versioned_writes: true,
        }
    }

    /// Create with the cache-related settings of `config`.
    pub fn from_config(backend: B, config: &CatalogConfig) -> Self {
        Self::new(backend)
            .with_ttl(config.ttl)
            .with_timeout(config.cache_timeout)
            .with_versioned_writes(config.versioned_writes)
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Box<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_versioned_writes(mut self, enabled: bool) -> Self {
        self.versioned_writes = enabled;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cache key for a record id: `"{prefix}:{id}"`.
    pub fn key_for<T: CacheEntity>(&self, id: &T::Key) -> Result<String> {
        CacheKeyBuilder::build::<T>(id)
    }

    /// Read a snapshot from cache.
    ///
    /// Returns `None` on miss, on cache failure, and on an unusable entry.
    /// Unusable entries (bad envelope, old schema, failed validation) are
    /// deleted so the next fill can replace them.
    pub async fn lookup<T: CacheEntity>(&self, key: &str) -> Option<T> {
        let timer = Instant::now();

        let bytes = match self.bounded("GET", key, self.backend.get(key)).await {
            Some(Some(bytes)) => bytes,
            Some(None) => {
                self.metrics.record_miss(key, timer.elapsed());
                return None;
            }
            None => return None,
        };

        match T::deserialize_from_cache(&bytes).and_then(|entity| entity.validate().map(|_| entity)) {
            Ok(entity) => {
                self.metrics.record_hit(key, timer.elapsed());
                Some(entity)
            }
            Err(e) => {
                if e.is_corrupt_entry() {
                    warn!("Discarding corrupt cache entry {}: {}", key, e);
                } else {
                    warn!("Discarding cached snapshot {} that fails validation: {}", key, e);
                }
                self.metrics.record_error(key, &e.to_string());
                self.invalidate(key).await;
                None
            }
        }
    }

    /// Populate the cache with a committed snapshot.
    ///
    /// With versioned writes enabled the backend refuses to replace a
    /// strictly newer cached snapshot. Returns `None` if the write failed.
    pub async fn fill<T: CacheEntity>(&self, entity: &T) -> Option<SetOutcome> {
        let key = match self.key_for::<T>(&entity.cache_key()) {
            Ok(key) => key,
            Err(e) => {
                warn!("Skipping cache fill: {}", e);
                return None;
            }
        };
        let bytes = match entity.serialize_for_cache() {
            Ok(bytes) => bytes,
            Err(e) => {
                self.metrics.record_error(&key, &e.to_string());
                return None;
            }
        };

        let timer = Instant::now();
        let version = entity.cache_version();
        let ttl = Some(self.ttl);
        let outcome = if self.versioned_writes {
            self.bounded(
                "SET",
                &key,
                self.backend.set_if_newer(&key, bytes, version, ttl),
            )
            .await?
        } else {
            self.bounded("SET", &key, self.backend.set(&key, bytes, ttl))
                .await?;
            SetOutcome::Stored
        };

        match outcome {
            SetOutcome::Rejected => self.metrics.record_rejected(&key, version),
            SetOutcome::Stored | SetOutcome::Unsupported => {
                self.metrics.record_set(&key, timer.elapsed())
            }
        }
        Some(outcome)
    }

    /// Remove an entry. Returns `false` if the delete could not be confirmed.
    pub async fn invalidate(&self, key: &str) -> bool {
        let timer = Instant::now();
        match self.bounded("DELETE", key, self.backend.delete(key)).await {
            Some(()) => {
                self.metrics.record_delete(key, timer.elapsed());
                true
            }
            None => false,
        }
    }

    /// Remove an entry unless it holds a version strictly newer than
    /// `version`. Returns `false` if the entry was kept or the delete could
    /// not be confirmed.
    pub async fn invalidate_unless_newer(&self, key: &str, version: u64) -> bool {
        let timer = Instant::now();
        let call = self.backend.delete_if_not_newer(key, version);
        match self.bounded("DELETE", key, call).await {
            Some(true) => {
                self.metrics.record_delete(key, timer.elapsed());
                true
            }
            Some(false) | None => false,
        }
    }

    /// Invalidate, then re-assert the just-committed snapshot.
    ///
    /// Both steps are always attempted, independently of each other. The
    /// set runs last so it overrides any fill that landed between them. With
    /// versioned writes the delete spares a newer cached revision, so a
    /// refresh that lands after a later writer's cannot roll the entry back.
    pub async fn refresh<T: CacheEntity>(&self, entity: &T) -> Option<SetOutcome> {
        match self.key_for::<T>(&entity.cache_key()) {
            Ok(key) if self.versioned_writes => {
                self.invalidate_unless_newer(&key, entity.cache_version())
                    .await;
            }
            Ok(key) => {
                self.invalidate(&key).await;
            }
            Err(e) => warn!("Skipping cache invalidation: {}", e),
        }
        self.fill(entity).await
    }

    /// Bounded health probe; `false` on error or timeout.
    pub async fn is_healthy(&self) -> bool {
        self.bounded("PING", "-", self.backend.health_check())
            .await
            .unwrap_or(false)
    }

    /// Run one cache call under the configured timeout, swallowing failure.
    async fn bounded<T, F>(&self, op: &str, key: &str, call: F) -> Option<T>
    where
        F: Future<Output = Result<T>>,
    {
        let error = match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(e)) => e,
            Err(_) => Error::Timeout(format!("cache {} after {:?}", op, self.timeout)),
        };

        if error.is_cache_failure() {
            warn!("Cache {} {} failed, continuing without cache: {}", op, key, error);
        } else {
            error!(
                "Cache {} {} returned unexpected error, continuing without cache: {}",
                op, key, error
            );
        }
        self.metrics.record_error(key, &error.to_string());
        None
    }

    /// Get backend reference (for advanced use).
    pub fn backend(&self) -> &B {
        &self.backend
    }
}
