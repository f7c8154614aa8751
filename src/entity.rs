//! Core entity trait that all cached records must implement.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::hash::Hash;

/// Trait that all records stored in cache must implement.
///
/// The cache key is derived purely from [`cache_prefix`](Self::cache_prefix)
/// and [`cache_key`](Self::cache_key), never from secondary attributes.
///
/// # Example
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use catalog_cache::CacheEntity;
///
/// #[derive(Clone, Serialize, Deserialize)]
/// pub struct Category {
///     pub id: String,
///     pub label: String,
///     pub revision: u64,
/// }
///
/// impl CacheEntity for Category {
///     type Key = String;
///
///     fn cache_key(&self) -> Self::Key {
///         self.id.clone()
///     }
///
///     fn cache_prefix() -> &'static str {
///         "category"
///     }
///
///     fn cache_version(&self) -> u64 {
///         self.revision
///     }
/// }
/// ```
pub trait CacheEntity: Send + Sync + Serialize + for<'de> Deserialize<'de> + Clone {
    /// Type of the record's identity.
    ///
    /// Its `Display` output must be stable and injective: two distinct ids
    /// must never render to the same text.
    type Key: Display + Clone + Send + Sync + Eq + Hash + 'static;

    /// Return the record's identity.
    fn cache_key(&self) -> Self::Key;

    /// Namespace for this record type. Final key format: `"{prefix}:{key}"`.
    fn cache_prefix() -> &'static str;

    /// Commit version of this snapshot.
    ///
    /// Must strictly increase with every committed write to the same id.
    /// Backends that support conditional writes refuse to replace a cached
    /// snapshot with an older one.
    fn cache_version(&self) -> u64;

    /// Serialize record for cache storage (versioned postcard envelope).
    fn serialize_for_cache(&self) -> Result<Vec<u8>> {
        crate::serialization::serialize_for_cache(self)
    }

    /// Deserialize record from cache storage.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidCacheEntry`: Bad magic or corrupted envelope
    /// - `Error::VersionMismatch`: Schema version changed
    /// - `Error::DeserializationError`: Corrupted payload
    fn deserialize_from_cache(bytes: &[u8]) -> Result<Self> {
        crate::serialization::deserialize_from_cache(bytes)
    }

    /// Optional: Validate record after deserialization.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}
