//! Redis cache backend implementation.
//!
//! Each entry is a hash `{p: payload, v: version}` with a millisecond
//! expiry. Conditional writes run server-side as a Lua script, so the
//! version comparison and the write are one atomic step.

use super::{CacheBackend, SetOutcome};
use crate::error::{Error, Result};
use deadpool_redis::redis::{AsyncCommands, Script};
use deadpool_redis::{Config as PoolConfig, Connection, Pool, Runtime};
use std::time::Duration;

/// Pool statistics information.
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub connections: u32,
    pub idle_connections: u32,
}

/// Default Redis connection pool size.
/// Override with REDIS_POOL_SIZE environment variable
const DEFAULT_POOL_SIZE: u32 = 16;

const PAYLOAD_FIELD: &str = "p";

const SET_IF_NEWER: &str = r#"
local cur = redis.call('HGET', KEYS[1], 'v')
if cur and tonumber(cur) > tonumber(ARGV[2]) then
  return 0
end
redis.call('DEL', KEYS[1])
redis.call('HSET', KEYS[1], 'p', ARGV[1], 'v', ARGV[2])
local ttl = tonumber(ARGV[3])
if ttl > 0 then
  redis.call('PEXPIRE', KEYS[1], ttl)
end
return 1
"#;

const DELETE_IF_NOT_NEWER: &str = r#"
local cur = redis.call('HGET', KEYS[1], 'v')
if cur and tonumber(cur) > tonumber(ARGV[1]) then
  return 0
end
redis.call('DEL', KEYS[1])
return 1
"#;

/// Whole milliseconds for `PEXPIRE`, rounded up and never below 1.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_nanos().div_ceil(1_000_000))
        .unwrap_or(u64::MAX)
        .max(1)
}

/// Configuration for Redis backend.
#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: u32,
    pub pool_size: u32,
    /// Bound on waiting for and creating a pooled connection.
    pub connection_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        RedisConfig {
            host: "127.0.0.1".to_string(),
            port: 6379,
            username: None,
            password: None,
            database: 0,
            pool_size: DEFAULT_POOL_SIZE,
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    /// Build Redis connection string.
    pub fn connection_string(&self) -> String {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => format!(
                "redis://{}:{}@{}:{}/{}",
                username, password, self.host, self.port, self.database
            ),
            (None, Some(password)) => format!(
                "redis://default:{}@{}:{}/{}",
                password, self.host, self.port, self.database
            ),
            _ => format!("redis://{}:{}/{}", self.host, self.port, self.database),
        }
    }
}

/// Redis backend with connection pooling.
///
/// One pool is created at startup and shared by every operation; each call
/// checks a connection out for its own duration only.
///
/// # Example
///
/// ```no_run
/// # use catalog_cache::backend::{RedisBackend, RedisConfig, CacheBackend};
/// # use catalog_cache::error::Result;
/// # async fn example() -> Result<()> {
/// let backend = RedisBackend::new(RedisConfig::default()).await?;
///
/// backend.set("product:1", b"snapshot".to_vec(), None).await?;
/// let value = backend.get("product:1").await?;
/// backend.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool,
}

impl RedisBackend {
    /// Create new Redis backend from configuration.
    ///
    /// # Errors
    /// Returns `Err` if pool creation fails.
    pub async fn new(config: RedisConfig) -> Result<Self> {
        let pool = Self::build_pool(
            &config.connection_string(),
            config.pool_size,
            config.connection_timeout,
        )?;

        info!(
            "✓ Redis backend initialized: {}:{}",
            config.host, config.port
        );

        Ok(RedisBackend { pool })
    }

    /// Create from connection string directly.
    ///
    /// Pool size comes from `REDIS_POOL_SIZE` when set, else 16.
    ///
    /// # Errors
    /// Returns `Err` if pool creation fails.
    pub async fn from_connection_string(conn_str: &str) -> Result<Self> {
        let pool_size = std::env::var("REDIS_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_POOL_SIZE);

        let pool = Self::build_pool(conn_str, pool_size, RedisConfig::default().connection_timeout)?;

        info!(
            "✓ Redis backend initialized from connection string (pool size: {})",
            pool_size
        );

        Ok(RedisBackend { pool })
    }

    fn build_pool(conn_str: &str, pool_size: u32, timeout: Duration) -> Result<Pool> {
        let mut cfg = PoolConfig::from_url(conn_str);
        let mut pool_cfg = deadpool_redis::PoolConfig::new(pool_size as usize);
        pool_cfg.timeouts.wait = Some(timeout);
        pool_cfg.timeouts.create = Some(timeout);
        cfg.pool = Some(pool_cfg);

        cfg.create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::ConfigError(format!("Failed to create Redis pool: {}", e)))
    }

    /// Get current pool statistics.
    pub fn pool_stats(&self) -> PoolStats {
        let status = self.pool.status();
        PoolStats {
            connections: status.size as u32,
            idle_connections: status.available as u32,
        }
    }

    async fn connection(&self) -> Result<Connection> {
        self.pool.get().await.map_err(|e| {
            Error::CacheUnavailable(format!("Failed to get Redis connection: {}", e))
        })
    }
}

impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;

        let value: Option<Vec<u8>> = conn.hget(key, PAYLOAD_FIELD).await.map_err(|e| {
            Error::CacheUnavailable(format!("Redis HGET failed for key {}: {}", key, e))
        })?;

        if value.is_some() {
            debug!("✓ Redis GET {} -> HIT", key);
        } else {
            debug!("✓ Redis GET {} -> MISS", key);
        }

        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.connection().await?;

        let mut pipe = deadpool_redis::redis::pipe();
        pipe.atomic()
            .del(key)
            .ignore()
            .hset(key, PAYLOAD_FIELD, value)
            .ignore();
        if let Some(duration) = ttl {
            let ms = i64::try_from(ttl_millis(duration)).unwrap_or(i64::MAX);
            pipe.pexpire(key, ms).ignore();
        }

        pipe.query_async::<()>(&mut *conn).await.map_err(|e| {
            Error::CacheUnavailable(format!("Redis SET failed for key {}: {}", key, e))
        })?;

        debug!("✓ Redis SET {} (TTL: {:?})", key, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection().await?;

        conn.del::<_, ()>(key).await.map_err(|e| {
            Error::CacheUnavailable(format!("Redis DEL failed for key {}: {}", key, e))
        })?;

        debug!("✓ Redis DELETE {}", key);
        Ok(())
    }

    async fn set_if_newer(
        &self,
        key: &str,
        value: Vec<u8>,
        version: u64,
        ttl: Option<Duration>,
    ) -> Result<SetOutcome> {
        let mut conn = self.connection().await?;
        let ttl_ms = ttl.map(ttl_millis).unwrap_or(0);

        let stored: i64 = Script::new(SET_IF_NEWER)
            .key(key)
            .arg(value)
            .arg(version)
            .arg(ttl_ms)
            .invoke_async(&mut *conn)
            .await
            .map_err(|e| {
                Error::CacheUnavailable(format!("Redis SET_IF_NEWER failed for key {}: {}", key, e))
            })?;

        if stored == 1 {
            debug!("✓ Redis SET {} v{} (TTL: {:?})", key, version, ttl);
            Ok(SetOutcome::Stored)
        } else {
            debug!("✗ Redis SET {} v{} rejected (newer cached)", key, version);
            Ok(SetOutcome::Rejected)
        }
    }

    async fn delete_if_not_newer(&self, key: &str, version: u64) -> Result<bool> {
        let mut conn = self.connection().await?;

        let deleted: i64 = Script::new(DELETE_IF_NOT_NEWER)
            .key(key)
            .arg(version)
            .invoke_async(&mut *conn)
            .await
            .map_err(|e| {
                Error::CacheUnavailable(format!(
                    "Redis DELETE_IF_NOT_NEWER failed for key {}: {}",
                    key, e
                ))
            })?;

        if deleted == 1 {
            debug!("✓ Redis DELETE {} (<= v{})", key, version);
        } else {
            debug!("✗ Redis DELETE {} kept (cached > v{})", key, version);
        }
        Ok(deleted == 1)
    }

    async fn health_check(&self) -> Result<bool> {
        let mut conn = self.connection().await?;

        let pong: String = deadpool_redis::redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| Error::CacheUnavailable(format!("Redis PING failed: {}", e)))?;

        Ok(pong.contains("PONG"))
    }

    async fn close(&self) {
        self.pool.close();
        info!("✓ Redis pool closed");
    }
}
