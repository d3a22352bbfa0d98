use crate::error::CacheError;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use std::fmt::Display;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, CacheError>;

/// Why a cache entry is being thrown out, for the invalidation audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationReason {
    Deleted,
    Disabled,
    Expired,
    Administrative,
}

impl InvalidationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvalidationReason::Deleted => "deleted",
            InvalidationReason::Disabled => "disabled",
            InvalidationReason::Expired => "expired",
            InvalidationReason::Administrative => "administrative",
        }
    }
}

impl Display for InvalidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A volatile lookup tier mapping short codes to original URLs.
///
/// Every entry carries a TTL; the cache may lose data at any time and is
/// never the only copy of anything. Lookups degrade to the durable store
/// when a cache call fails.
#[async_trait]
pub trait UrlCache: Send + Sync + 'static {
    /// Returns the cached original URL, or `None` on a miss.
    async fn get(&self, code: &ShortCode) -> Result<Option<String>>;

    /// Stores the original URL under the code for at most `ttl`.
    async fn set(&self, code: &ShortCode, original_url: &str, ttl: Duration) -> Result<()>;

    /// Removes the entry for the code. Not an error if the entry is absent.
    async fn invalidate(&self, code: &ShortCode, reason: InvalidationReason) -> Result<()>;
}
