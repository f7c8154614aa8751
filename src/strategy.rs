//! Write policies and read provenance.
//!
//! # Write policies
//!
//! One policy governs every mutation path, instead of each operation
//! choosing its own cache handling:
//!
//! | Operation | `WriteThrough` (default) | `InvalidateOnly` |
//! |-----------|--------------------------|------------------|
//! | create | set committed snapshot | delete |
//! | update / purchase / seed | delete, then set committed snapshot | delete |
//! | delete | delete | delete |
//!
//! Under both policies a failed cache step leaves the entry at worst absent,
//! never older than the write that just committed.
//!
//! # Read provenance
//!
//! Every read returns a [`Fetched`] tagged with the [`Source`] that served it.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the write path updates cache state after a commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WritePolicy {
    /// Re-assert the committed snapshot in cache after every write.
    ///
    /// Flow for an update:
    /// 1. Commit to the record store
    /// 2. Delete the cache entry
    /// 3. Set the committed snapshot with TTL
    #[default]
    WriteThrough,

    /// Only drop the cache entry; the next read repopulates it.
    InvalidateOnly,
}

impl fmt::Display for WritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WritePolicy::WriteThrough => write!(f, "write-through"),
            WritePolicy::InvalidateOnly => write!(f, "invalidate-only"),
        }
    }
}

impl FromStr for WritePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "write-through" | "writethrough" => Ok(WritePolicy::WriteThrough),
            "invalidate-only" | "invalidateonly" | "invalidate" => Ok(WritePolicy::InvalidateOnly),
            other => Err(Error::ConfigError(format!("unknown write policy: {}", other))),
        }
    }
}

/// Where a read was served from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cache,
    Store,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Cache => write!(f, "cache"),
            Source::Store => write!(f, "store"),
        }
    }
}

/// A read result tagged with its source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fetched<T> {
    pub value: T,
    pub source: Source,
}

impl<T> Fetched<T> {
    pub fn from_cache(value: T) -> Self {
        Fetched {
            value,
            source: Source::Cache,
        }
    }

    pub fn from_store(value: T) -> Self {
        Fetched {
            value,
            source: Source::Store,
        }
    }

    pub fn is_cached(&self) -> bool {
        self.source == Source::Cache
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}
