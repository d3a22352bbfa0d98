use crate::error::ResolveError;
use crate::recorder::AccessRecorder;
use curtail_core::{AccessContext, ReadStore, ShortCode, UrlCache, UrlStatus};
use jiff::Timestamp;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};
use typed_builder::TypedBuilder;

/// Tunables for the resolution path.
#[derive(Debug, Clone, TypedBuilder)]
pub struct ResolverSettings {
    /// TTL applied when a resolved url is written back to the cache.
    #[builder(default = Duration::from_secs(600))]
    pub cache_ttl: Duration,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Answers redirects with a cache-then-store lookup.
///
/// The cache is an accelerator, never an authority: a failed cache call
/// degrades the lookup to the store. Every attempt against an existing
/// record is handed to the [`AccessRecorder`] without blocking the
/// response; the resolver itself never writes to the event stream.
pub struct ResolverService<S, C> {
    store: Arc<S>,
    cache: Arc<C>,
    recorder: AccessRecorder,
    settings: ResolverSettings,
}

impl<S, C> Clone for ResolverService<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            recorder: self.recorder.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<S, C> ResolverService<S, C>
where
    S: ReadStore,
    C: UrlCache,
{
    pub fn new(store: S, cache: C, recorder: AccessRecorder, settings: ResolverSettings) -> Self {
        Self {
            store: Arc::new(store),
            cache: Arc::new(cache),
            recorder,
            settings,
        }
    }

    /// Resolves a short code to its original URL.
    ///
    /// Returns `None` when the code is unknown, expired, or disabled. An
    /// attempt against an active record past its expiry also returns
    /// `None`, but is still dispatched to the recorder, which is what
    /// flips the overdue record to expired.
    pub async fn resolve(
        &self,
        code: &ShortCode,
        context: AccessContext,
    ) -> Result<Option<String>, ResolveError> {
        let now = Timestamp::now();
        trace!(code = %code, "resolving short code");

        match self.cache.get(code).await {
            Ok(Some(url)) => {
                debug!(code = %code, "served from cache");
                self.recorder.dispatch(code, context, now);
                return Ok(Some(url));
            }
            Ok(None) => {}
            Err(e) => {
                warn!(code = %code, error = %e, "cache lookup failed, falling back to the store");
            }
        }

        let Some(record) = self.store.record(code).await? else {
            trace!(code = %code, "short code not found");
            return Ok(None);
        };

        if record.is_servable(now) {
            if let Err(e) = self
                .cache
                .set(code, &record.original_url, self.settings.cache_ttl)
                .await
            {
                warn!(code = %code, error = %e, "failed to cache resolved url");
            }
            debug!(code = %code, url = %record.original_url, "resolved short code");
            self.recorder.dispatch(code, context, now);
            return Ok(Some(record.original_url));
        }

        if record.status == UrlStatus::Active {
            // Active past expiry: the recorded attempt is what flips it.
            debug!(code = %code, "record is past its expiry");
            self.recorder.dispatch(code, context, now);
        } else {
            debug!(code = %code, status = %record.status, "record is not servable");
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSettings;
    use crate::sink::LogSink;
    use curtail_cache::MokaUrlCache;
    use curtail_core::{CreateUrl, OwnerId, ShortUrlAggregate, UrlStore};
    use curtail_storage::InMemoryStore;
    use jiff::SignedDuration;

    fn code(s: &str) -> ShortCode {
        ShortCode::parse(s).unwrap()
    }

    async fn seed(
        store: &InMemoryStore,
        code: &ShortCode,
        url: &str,
        created_at: Timestamp,
        expires_at: Option<Timestamp>,
    ) {
        let mut aggregate = ShortUrlAggregate::create(
            CreateUrl::builder()
                .short_code(code.clone())
                .original_url(url)
                .created_by(OwnerId::new("tester"))
                .expires_at(expires_at)
                .now(created_at)
                .build(),
        )
        .unwrap();
        store.save(&mut aggregate).await.unwrap();
    }

    fn resolver(store: &InMemoryStore) -> ResolverService<InMemoryStore, MokaUrlCache> {
        let cache = MokaUrlCache::new();
        let (recorder, _worker) = AccessRecorder::spawn(
            store.clone(),
            cache.clone(),
            LogSink,
            RecorderSettings::default(),
        );
        ResolverService::new(store.clone(), cache, recorder, ResolverSettings::default())
    }

    #[tokio::test]
    async fn resolve_existing_code() {
        let store = InMemoryStore::new();
        let c = code("abc123");
        seed(&store, &c, "https://example.com/page", Timestamp::now(), None).await;

        let service = resolver(&store);
        let url = service.resolve(&c, AccessContext::default()).await.unwrap();
        assert_eq!(url.as_deref(), Some("https://example.com/page"));
    }

    #[tokio::test]
    async fn resolve_nonexistent_code() {
        let service = resolver(&InMemoryStore::new());

        let url = service
            .resolve(&code("nope"), AccessContext::default())
            .await
            .unwrap();
        assert!(url.is_none());
    }

    #[tokio::test]
    async fn resolve_disabled_code() {
        let store = InMemoryStore::new();
        let c = code("muted1");
        seed(&store, &c, "https://example.com", Timestamp::now(), None).await;
        let mut aggregate = store.load(&c).await.unwrap().unwrap();
        assert!(aggregate.disable("abuse report", None, Timestamp::now()));
        store.save(&mut aggregate).await.unwrap();

        let service = resolver(&store);
        let url = service.resolve(&c, AccessContext::default()).await.unwrap();
        assert!(url.is_none());
    }

    #[tokio::test]
    async fn resolve_code_past_expiry() {
        let store = InMemoryStore::new();
        let c = code("stale1");
        let created_at = Timestamp::now() - SignedDuration::from_hours(2);
        let expires_at = Timestamp::now() - SignedDuration::from_hours(1);
        seed(&store, &c, "https://example.com", created_at, Some(expires_at)).await;

        let service = resolver(&store);
        let url = service.resolve(&c, AccessContext::default()).await.unwrap();
        assert!(url.is_none());
    }

    #[tokio::test]
    async fn resolve_not_yet_expired() {
        let store = InMemoryStore::new();
        let c = code("fresh1");
        let future = Timestamp::now() + SignedDuration::from_hours(1);
        seed(&store, &c, "https://example.com", Timestamp::now(), Some(future)).await;

        let service = resolver(&store);
        let url = service.resolve(&c, AccessContext::default()).await.unwrap();
        assert_eq!(url.as_deref(), Some("https://example.com"));
    }
}
