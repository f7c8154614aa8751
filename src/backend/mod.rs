//! Cache store backends.

use crate::error::Result;
use std::time::Duration;

pub mod faulty;
pub mod inmemory;
#[cfg(feature = "redis")]
pub mod redis;

pub use faulty::FaultyBackend;
pub use inmemory::InMemoryBackend;
#[cfg(feature = "redis")]
pub use redis::{PoolStats, RedisBackend, RedisConfig};

/// Result of a conditional write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetOutcome {
    /// Value stored.
    Stored,
    /// A strictly newer version is already cached; nothing written.
    Rejected,
    /// Backend has no conditional writes; value stored unconditionally.
    Unsupported,
}

/// Trait for cache store implementations.
///
/// Every operation is atomic for its single key. No multi-key transactions
/// are assumed.
///
/// **IMPORTANT:** All methods use `&self`. Implementations use interior
/// mutability or external storage so one handle can serve unbounded
/// concurrent callers.
///
/// **FAILURES:** Transport problems must come back as
/// `Err(Error::CacheUnavailable(_))`. A miss is `Ok(None)`, never an error.
/// Callers bound every call with their own timeout.
#[allow(async_fn_in_trait)]
pub trait CacheBackend: Send + Sync + Clone {
    /// Retrieve value from cache by key.
    ///
    /// # Returns
    /// - `Ok(Some(bytes))` - Live entry found
    /// - `Ok(None)` - Miss (absent or expired)
    ///
    /// # Errors
    /// Returns `Err` if the backend cannot be reached
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store value unconditionally with optional TTL.
    ///
    /// # Errors
    /// Returns `Err` if the backend cannot be reached
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Remove value from cache. Removing an absent key succeeds.
    ///
    /// # Errors
    /// Returns `Err` if the backend cannot be reached
    async fn delete(&self, key: &str) -> Result<()>;

    /// Store value unless the cached entry carries a strictly newer version.
    ///
    /// Default implementation falls back to an unconditional `set` and
    /// reports [`SetOutcome::Unsupported`].
    ///
    /// # Errors
    /// Returns `Err` if the backend cannot be reached
    async fn set_if_newer(
        &self,
        key: &str,
        value: Vec<u8>,
        version: u64,
        ttl: Option<Duration>,
    ) -> Result<SetOutcome> {
        let _ = version;
        self.set(key, value, ttl).await?;
        Ok(SetOutcome::Unsupported)
    }

    /// Remove value unless the cached entry carries a strictly newer version.
    ///
    /// Returns `false` when a newer entry was kept. Default implementation
    /// deletes unconditionally.
    ///
    /// # Errors
    /// Returns `Err` if the backend cannot be reached
    async fn delete_if_not_newer(&self, key: &str, version: u64) -> Result<bool> {
        let _ = version;
        self.delete(key).await?;
        Ok(true)
    }

    /// Health check - verify backend is accessible.
    ///
    /// # Errors
    /// Returns `Err` if backend is not accessible
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// Release pooled connections. Called once at shutdown.
    async fn close(&self) {}
}
