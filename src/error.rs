//! Error types for the catalog cache layer.

use std::fmt;

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the catalog cache layer.
///
/// Only record-store failures and caller mistakes are ever returned from the
/// public [`CatalogService`](crate::CatalogService) operations. Cache-side
/// variants are produced by backends and swallowed by the orchestration.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The record store has no matching product.
    ///
    /// Always surfaced to the caller, never retried internally.
    NotFound(String),

    /// Malformed input, rejected before any store call.
    ///
    /// Common causes:
    /// - Empty product name
    /// - Negative or non-finite price
    /// - Product id that is not a UUID
    ValidationError(String),

    /// Another product already holds the requested name.
    Conflict(String),

    /// Purchase attempted on a product with no remaining stock.
    OutOfStock(String),

    /// Cache store unreachable or returned a transport error.
    ///
    /// Never surfaced as a request failure: the operation degrades to
    /// store-only behavior and logs a warning.
    CacheUnavailable(String),

    /// Record store unreachable or timed out.
    ///
    /// Fatal for the request. No automatic retry inside the crate.
    StoreUnavailable(String),

    /// A cache call exceeded its configured bound.
    ///
    /// Handled exactly like `CacheUnavailable`.
    Timeout(String),

    /// Serialization failed when converting a record to cache bytes.
    SerializationError(String),

    /// Deserialization failed when converting cache bytes to a record.
    ///
    /// **Recovery:** the entry is deleted and the read falls through to the store.
    DeserializationError(String),

    /// Invalid cache entry: corrupted envelope or bad magic.
    InvalidCacheEntry(String),

    /// Schema version mismatch between code and cached data.
    ///
    /// Expected during deployments that change `ProductRecord`; the entry is
    /// evicted and recomputed on next access.
    VersionMismatch {
        /// Expected schema version (from compiled code)
        expected: u32,
        /// Found schema version (from cached entry)
        found: u32,
    },

    /// Configuration error during startup.
    ConfigError(String),
}

impl Error {
    /// True for failures that belong to the cache side of an operation.
    ///
    /// These never change the outcome of a catalog operation, only its latency.
    pub fn is_cache_failure(&self) -> bool {
        matches!(
            self,
            Error::CacheUnavailable(_)
                | Error::Timeout(_)
                | Error::SerializationError(_)
                | Error::DeserializationError(_)
                | Error::InvalidCacheEntry(_)
                | Error::VersionMismatch { .. }
        )
    }

    /// True when the cached bytes themselves are unusable.
    pub fn is_corrupt_entry(&self) -> bool {
        matches!(
            self,
            Error::DeserializationError(_)
                | Error::InvalidCacheEntry(_)
                | Error::VersionMismatch { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotFound(what) => write!(f, "Not found: {}", what),
            Error::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Error::Conflict(msg) => write!(f, "Conflict: {}", msg),
            Error::OutOfStock(id) => write!(f, "Product out of stock: {}", id),
            Error::CacheUnavailable(msg) => write!(f, "Cache unavailable: {}", msg),
            Error::StoreUnavailable(msg) => write!(f, "Store unavailable: {}", msg),
            Error::Timeout(msg) => write!(f, "Timeout: {}", msg),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::DeserializationError(msg) => write!(f, "Deserialization error: {}", msg),
            Error::InvalidCacheEntry(msg) => {
                write!(f, "Invalid cache entry: {}", msg)
            }
            Error::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Cache version mismatch: expected {}, found {}",
                    expected, found
                )
            }
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<uuid::Error> for Error {
    fn from(e: uuid::Error) -> Self {
        Error::ValidationError(format!("invalid product id: {}", e))
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for Error {
    fn from(e: redis::RedisError) -> Self {
        Error::CacheUnavailable(format!("Redis error: {}", e))
    }
}
