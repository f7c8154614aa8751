//! Cache key derivation.
//!
//! Keys have the form `"{prefix}:{id}"` with exactly one colon. The id part
//! comes from the record's identity only, so the same id always maps to the
//! same key and distinct ids never share one.

use crate::entity::CacheEntity;
use crate::error::{Error, Result};

/// Separator between prefix and id.
pub const KEY_SEPARATOR: char = ':';

/// Builder for cache keys.
pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    /// Build the full cache key for a record id.
    ///
    /// Ids whose text would introduce a second separator or be empty are
    /// rejected, since they could collide with another id's key.
    pub fn build<T: CacheEntity>(id: &T::Key) -> Result<String> {
        Self::build_with_prefix(T::cache_prefix(), id)
    }

    /// Build cache key with an explicit prefix.
    pub fn build_with_prefix(prefix: &str, id: &dyn std::fmt::Display) -> Result<String> {
        let id = id.to_string();
        if id.is_empty() {
            return Err(Error::ValidationError("cache key id is empty".to_string()));
        }
        if id.contains(KEY_SEPARATOR) || prefix.contains(KEY_SEPARATOR) {
            return Err(Error::ValidationError(format!(
                "cache key part may not contain '{}': {}:{}",
                KEY_SEPARATOR, prefix, id
            )));
        }
        Ok(format!("{}{}{}", prefix, KEY_SEPARATOR, id))
    }
}
