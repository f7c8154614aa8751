//! Postcard snapshot encoding with a versioned envelope.
//!
//! Every cached payload is a complete snapshot of a record, never a patch:
//! ```text
//! ┌─────────────────┬──────────────────┬──────────────────────────┐
//! │  MAGIC (4 bytes)│ SCHEMA (varint)  │ POSTCARD SNAPSHOT        │
//! └─────────────────┴──────────────────┴──────────────────────────┘
//!   "PCAT"              u32                postcard::to_allocvec(T)
//! ```
//!
//! A reader that finds the wrong magic or another schema version treats the
//! entry as unusable; the orchestration deletes it and falls back to the
//! record store.
//!
//! # Example
//!
//! ```rust
//! use catalog_cache::serialization::{serialize_for_cache, deserialize_from_cache};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! struct Snapshot {
//!     id: u64,
//!     name: String,
//! }
//!
//! # fn main() -> catalog_cache::Result<()> {
//! let snap = Snapshot { id: 1, name: "PS6".to_string() };
//! let bytes = serialize_for_cache(&snap)?;
//! let back: Snapshot = deserialize_from_cache(&bytes)?;
//! assert_eq!(snap, back);
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Magic header for catalog cache entries.
pub const CACHE_MAGIC: [u8; 4] = *b"PCAT";

/// Current snapshot schema version.
///
/// Bump when `ProductRecord` changes shape (fields added, removed, reordered
/// or retyped). Entries written under the old schema are evicted on read.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Envelope wrapped around every cached snapshot.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CacheEnvelope<T> {
    /// Must be [`CACHE_MAGIC`]
    pub magic: [u8; 4],
    /// Must be [`CURRENT_SCHEMA_VERSION`]
    pub version: u32,
    /// The record snapshot
    pub payload: T,
}

impl<T> CacheEnvelope<T> {
    /// Wrap a payload with the current magic and schema version.
    pub fn new(payload: T) -> Self {
        Self {
            magic: CACHE_MAGIC,
            version: CURRENT_SCHEMA_VERSION,
            payload,
        }
    }
}

/// Encode a snapshot for cache storage.
///
/// # Errors
///
/// Returns `Error::SerializationError` if Postcard serialization fails.
pub fn serialize_for_cache<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    postcard::to_allocvec(&CacheEnvelope::new(value)).map_err(|e| {
        error!("Cache serialization failed: {}", e);
        Error::SerializationError(e.to_string())
    })
}

/// Decode a snapshot from cache storage, checking magic and schema first.
///
/// # Errors
///
/// - `Error::DeserializationError`: the bytes are not a valid envelope
/// - `Error::InvalidCacheEntry`: wrong magic header
/// - `Error::VersionMismatch`: written under another schema version
pub fn deserialize_from_cache<'de, T: Deserialize<'de>>(bytes: &'de [u8]) -> Result<T> {
    let envelope: CacheEnvelope<T> = postcard::from_bytes(bytes).map_err(|e| {
        warn!("Cache deserialization failed: {}", e);
        Error::DeserializationError(e.to_string())
    })?;

    if envelope.magic != CACHE_MAGIC {
        warn!(
            "Invalid cache entry: expected magic {:?}, got {:?}",
            CACHE_MAGIC, envelope.magic
        );
        return Err(Error::InvalidCacheEntry(format!(
            "Invalid magic: expected {:?}, got {:?}",
            CACHE_MAGIC, envelope.magic
        )));
    }

    if envelope.version != CURRENT_SCHEMA_VERSION {
        warn!(
            "Cache schema mismatch: expected {}, got {}",
            CURRENT_SCHEMA_VERSION, envelope.version
        );
        return Err(Error::VersionMismatch {
            expected: CURRENT_SCHEMA_VERSION,
            found: envelope.version,
        });
    }

    Ok(envelope.payload)
}
