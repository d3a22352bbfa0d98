use async_trait::async_trait;
use curtail_core::cache::Result;
use curtail_core::{CacheError, InvalidationReason, ShortCode, UrlCache};
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Default key prefix for curtail cache entries.
const KEY_PREFIX: &str = "ct:url:";

/// A Redis-backed [`UrlCache`] for sharing lookups across nodes.
///
/// Values are stored as plain strings under a configurable key prefix;
/// the per-entry TTL rides along via `SET .. EX`.
#[derive(Debug, Clone)]
pub struct RedisUrlCache {
    conn: redis::aio::MultiplexedConnection,
    key_prefix: String,
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> CacheError {
    let message = format!("{operation}: {err}");
    if err.is_timeout() {
        CacheError::Timeout(message)
    } else if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() {
        CacheError::Unavailable(message)
    } else {
        CacheError::Operation(message)
    }
}

impl RedisUrlCache {
    /// Creates a cache over a multiplexed Redis connection.
    pub fn new(conn: redis::aio::MultiplexedConnection) -> Self {
        Self::with_prefix(conn, KEY_PREFIX)
    }

    /// Creates a cache with a custom key prefix (e.g. `"myapp:url:"`).
    pub fn with_prefix(
        conn: redis::aio::MultiplexedConnection,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
        }
    }

    fn cache_key(&self, code: &ShortCode) -> String {
        format!("{}{}", self.key_prefix, code.as_str())
    }
}

#[async_trait]
impl UrlCache for RedisUrlCache {
    async fn get(&self, code: &ShortCode) -> Result<Option<String>> {
        let key = self.cache_key(code);

        let mut conn = self.conn.clone();
        match conn.get::<_, Option<String>>(&key).await {
            Ok(Some(url)) => {
                debug!(code = %code, "cache hit in redis");
                Ok(Some(url))
            }
            Ok(None) => {
                trace!(code = %code, "cache miss in redis");
                Ok(None)
            }
            Err(e) => {
                warn!(code = %code, error = %e, "redis get failed");
                Err(map_redis_error("failed to fetch value from redis", e))
            }
        }
    }

    async fn set(&self, code: &ShortCode, original_url: &str, ttl: Duration) -> Result<()> {
        let key = self.cache_key(code);
        // Redis rejects a zero expiry; clamp to the smallest it accepts.
        let ttl_secs = ttl.as_secs().max(1);

        let mut conn = self.conn.clone();
        match conn.set_ex::<_, _, ()>(&key, original_url, ttl_secs).await {
            Ok(()) => {
                debug!(code = %code, ttl_secs, "cached url in redis");
                Ok(())
            }
            Err(e) => {
                warn!(code = %code, error = %e, "redis set failed");
                Err(map_redis_error("failed to write value to redis", e))
            }
        }
    }

    async fn invalidate(&self, code: &ShortCode, reason: InvalidationReason) -> Result<()> {
        let key = self.cache_key(code);

        let mut conn = self.conn.clone();
        match conn.del::<_, ()>(&key).await {
            Ok(()) => {
                debug!(code = %code, reason = %reason, "invalidated redis entry");
                Ok(())
            }
            Err(e) => {
                warn!(code = %code, error = %e, "redis del failed");
                Err(map_redis_error("failed to delete value from redis", e))
            }
        }
    }
}
