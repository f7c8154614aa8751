//! Fault-injecting backend wrapper.
//!
//! Wraps any [`CacheBackend`] and can make individual operations fail or
//! stall. Used to exercise the degraded, store-only paths without a real
//! network partition.

use super::{CacheBackend, SetOutcome};
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Faults {
    fail_get: AtomicBool,
    fail_set: AtomicBool,
    fail_delete: AtomicBool,
    stall: Mutex<Option<Duration>>,
    calls: AtomicU64,
}

/// Backend wrapper with switchable failures.
///
/// # Example
///
/// ```
/// use catalog_cache::backend::{CacheBackend, FaultyBackend, InMemoryBackend};
///
/// # #[tokio::main] async fn main() {
/// let cache = FaultyBackend::new(InMemoryBackend::new());
/// cache.fail_all(true);
/// assert!(cache.get("product:1").await.is_err());
/// # }
/// ```
#[derive(Clone)]
pub struct FaultyBackend<B: CacheBackend> {
    inner: B,
    faults: Arc<Faults>,
}

impl<B: CacheBackend> FaultyBackend<B> {
    pub fn new(inner: B) -> Self {
        FaultyBackend {
            inner,
            faults: Arc::new(Faults::default()),
        }
    }

    /// Make every operation report `CacheUnavailable`.
    pub fn fail_all(&self, fail: bool) {
        self.fail_get(fail);
        self.fail_set(fail);
        self.fail_delete(fail);
    }

    pub fn fail_get(&self, fail: bool) {
        self.faults.fail_get.store(fail, Ordering::SeqCst);
    }

    pub fn fail_set(&self, fail: bool) {
        self.faults.fail_set.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.faults.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Delay every operation by `delay` before touching the inner backend.
    pub fn stall(&self, delay: Option<Duration>) {
        if let Ok(mut stall) = self.faults.stall.lock() {
            *stall = delay;
        }
    }

    /// Number of operations attempted through this wrapper.
    pub fn calls(&self) -> u64 {
        self.faults.calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    async fn before(&self, op: &str, key: &str, flag: &AtomicBool) -> Result<()> {
        self.faults.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.faults.stall.lock().ok().and_then(|stall| *stall);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if flag.load(Ordering::SeqCst) {
            debug!("✗ Faulty {} {} -> injected failure", op, key);
            return Err(Error::CacheUnavailable(format!(
                "injected {} failure for {}",
                op, key
            )));
        }
        Ok(())
    }
}

impl<B: CacheBackend> CacheBackend for FaultyBackend<B> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.before("GET", key, &self.faults.fail_get).await?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        self.before("SET", key, &self.faults.fail_set).await?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.before("DELETE", key, &self.faults.fail_delete).await?;
        self.inner.delete(key).await
    }

    async fn set_if_newer(
        &self,
        key: &str,
        value: Vec<u8>,
        version: u64,
        ttl: Option<Duration>,
    ) -> Result<SetOutcome> {
        self.before("SET", key, &self.faults.fail_set).await?;
        self.inner.set_if_newer(key, value, version, ttl).await
    }

    async fn delete_if_not_newer(&self, key: &str, version: u64) -> Result<bool> {
        self.before("DELETE", key, &self.faults.fail_delete).await?;
        self.inner.delete_if_not_newer(key, version).await
    }

    async fn health_check(&self) -> Result<bool> {
        if self.faults.fail_get.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.inner.health_check().await
    }

    async fn close(&self) {
        self.inner.close().await
    }
}
