//! Runtime configuration for the cache-aside layer.

use crate::error::{Error, Result};
use crate::strategy::WritePolicy;
use std::str::FromStr;
use std::time::Duration;

/// Default entry lifetime: 5 minutes.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default bound on a single cache call.
pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_millis(250);

/// Default bound on a single record-store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration for [`CatalogService`](crate::CatalogService).
///
/// # Example
///
/// ```
/// use catalog_cache::{CatalogConfig, WritePolicy};
/// use std::time::Duration;
///
/// let config = CatalogConfig::default()
///     .with_ttl(Duration::from_secs(60))
///     .with_write_policy(WritePolicy::InvalidateOnly);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct CatalogConfig {
    /// Lifetime applied uniformly to every populated entry.
    pub ttl: Duration,
    /// Bound on each cache call; elapsed calls count as cache unavailable.
    pub cache_timeout: Duration,
    /// Bound on each record-store call; elapsed calls fail the operation.
    pub store_timeout: Duration,
    /// Cache handling on the write path.
    pub write_policy: WritePolicy,
    /// Use conditional (version-checked) cache writes where the backend
    /// supports them.
    pub versioned_writes: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        CatalogConfig {
            ttl: DEFAULT_TTL,
            cache_timeout: DEFAULT_CACHE_TIMEOUT,
            store_timeout: DEFAULT_STORE_TIMEOUT,
            write_policy: WritePolicy::default(),
            versioned_writes: true,
        }
    }
}

impl CatalogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_cache_timeout(mut self, timeout: Duration) -> Self {
        self.cache_timeout = timeout;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_write_policy(mut self, policy: WritePolicy) -> Self {
        self.write_policy = policy;
        self
    }

    pub fn with_versioned_writes(mut self, enabled: bool) -> Self {
        self.versioned_writes = enabled;
        self
    }

    /// Reject durations below one millisecond. Backends count TTLs in whole
    /// milliseconds, so anything shorter would disable expiry or caching.
    pub fn validate(&self) -> Result<()> {
        at_least_one_ms("ttl", self.ttl)?;
        at_least_one_ms("cache timeout", self.cache_timeout)?;
        at_least_one_ms("store timeout", self.store_timeout)
    }

    /// Load from process environment, falling back to defaults.
    ///
    /// | Variable | Meaning |
    /// |----------|---------|
    /// | `CATALOG_CACHE_TTL_SECS` | entry TTL in seconds |
    /// | `CATALOG_CACHE_TIMEOUT_MS` | cache call bound |
    /// | `CATALOG_STORE_TIMEOUT_MS` | store call bound |
    /// | `CATALOG_WRITE_POLICY` | `write-through` or `invalidate-only` |
    /// | `CATALOG_VERSIONED_WRITES` | `true` / `false` |
    ///
    /// # Errors
    /// Returns `Error::ConfigError` for unparsable or invalid values.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(secs) = parse_var::<u64, _>(&lookup, "CATALOG_CACHE_TTL_SECS")? {
            config.ttl = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "CATALOG_CACHE_TIMEOUT_MS")? {
            config.cache_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "CATALOG_STORE_TIMEOUT_MS")? {
            config.store_timeout = Duration::from_millis(ms);
        }
        if let Some(policy) = lookup("CATALOG_WRITE_POLICY") {
            config.write_policy = policy.parse()?;
        }
        if let Some(enabled) = parse_var::<bool, _>(&lookup, "CATALOG_VERSIONED_WRITES")? {
            config.versioned_writes = enabled;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Smallest duration any setting may take.
pub const MIN_DURATION: Duration = Duration::from_millis(1);

fn at_least_one_ms(name: &str, value: Duration) -> Result<()> {
    if value < MIN_DURATION {
        return Err(Error::ConfigError(format!(
            "{} must be at least 1ms, got {:?}",
            name, value
        )));
    }
    Ok(())
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::ConfigError(format!("{}={:?}: {}", name, raw, e))),
    }
}
