use async_trait::async_trait;
use curtail_core::cache::Result;
use curtail_core::{InvalidationReason, ShortCode, UrlCache};
use moka::future::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Value stored per code. Carries its own lifetime so one cache can hold
/// entries with different TTLs.
#[derive(Debug, Clone)]
struct CachedUrl {
    original_url: String,
    ttl: Duration,
}

/// Expiration policy driven by the TTL recorded in each value.
struct PerEntryTtl;

impl Expiry<String, CachedUrl> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedUrl,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedUrl,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        // Re-inserting a code restarts the clock with the new TTL.
        Some(value.ttl)
    }
}

/// An in-process cache implementation backed by Moka.
///
/// Suited to single-node deployments or as a private tier in front of
/// Redis. Honors the per-entry TTL passed to [`UrlCache::set`].
#[derive(Debug, Clone)]
pub struct MokaUrlCache {
    cache: Cache<String, CachedUrl>,
}

impl MokaUrlCache {
    const DEFAULT_CAPACITY: u64 = 10_000;

    /// Creates a cache with the default maximum capacity.
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Creates a cache holding at most `max_capacity` entries.
    pub fn with_capacity(max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache }
    }
}

impl Default for MokaUrlCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UrlCache for MokaUrlCache {
    async fn get(&self, code: &ShortCode) -> Result<Option<String>> {
        match self.cache.get(code.as_str()).await {
            Some(entry) => {
                debug!(code = %code, "cache hit in moka");
                Ok(Some(entry.original_url))
            }
            None => {
                trace!(code = %code, "cache miss in moka");
                Ok(None)
            }
        }
    }

    async fn set(&self, code: &ShortCode, original_url: &str, ttl: Duration) -> Result<()> {
        let entry = CachedUrl {
            original_url: original_url.to_string(),
            ttl,
        };
        self.cache.insert(code.as_str().to_string(), entry).await;
        debug!(code = %code, ttl_ms = ttl.as_millis() as u64, "cached url in moka");
        Ok(())
    }

    async fn invalidate(&self, code: &ShortCode, reason: InvalidationReason) -> Result<()> {
        self.cache.invalidate(code.as_str()).await;
        debug!(code = %code, reason = %reason, "invalidated moka entry");
        Ok(())
    }
}
