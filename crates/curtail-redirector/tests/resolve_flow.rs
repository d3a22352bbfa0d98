//! End-to-end resolution flow against the in-memory store and moka cache:
//! cache-then-store lookup, asynchronous access recording, lazy expiry
//! discovery, and disable.

use async_trait::async_trait;
use curtail_cache::MokaUrlCache;
use curtail_core::{
    AccessContext, AnalyticsSink, CreateUrl, OwnerId, ReadStore, ShortCode, ShortUrlAggregate,
    ShortUrlRecord, UrlStatus, UrlStore,
};
use curtail_redirector::{
    AccessRecorder, LogSink, RecorderSettings, ResolverService, ResolverSettings,
};
use curtail_shortener::{
    CreateRequest, FlakeCodeGenerator, GeneratorSettings, ShortenerService, ShortenerSettings,
};
use curtail_storage::InMemoryStore;
use jiff::{SignedDuration, Timestamp};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Store wrapper that counts projection reads, to prove which lookups
/// were answered by the cache alone.
#[derive(Debug, Clone)]
struct CountingStore {
    inner: InMemoryStore,
    record_reads: Arc<AtomicUsize>,
}

impl CountingStore {
    fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            record_reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn record_reads(&self) -> usize {
        self.record_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReadStore for CountingStore {
    async fn record(&self, code: &ShortCode) -> curtail_core::store::Result<Option<ShortUrlRecord>> {
        self.record_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.record(code).await
    }

    async fn exists(&self, code: &ShortCode) -> curtail_core::store::Result<bool> {
        self.inner.exists(code).await
    }
}

#[async_trait]
impl UrlStore for CountingStore {
    async fn load(
        &self,
        code: &ShortCode,
    ) -> curtail_core::store::Result<Option<ShortUrlAggregate>> {
        self.inner.load(code).await
    }

    async fn save(&self, aggregate: &mut ShortUrlAggregate) -> curtail_core::store::Result<()> {
        self.inner.save(aggregate).await
    }
}

/// Sink that remembers every access detail it was handed.
#[derive(Debug, Clone, Default)]
struct CollectingSink {
    seen: Arc<Mutex<Vec<(ShortCode, AccessContext)>>>,
}

#[async_trait]
impl AnalyticsSink for CollectingSink {
    async fn record_access(
        &self,
        code: &ShortCode,
        context: &AccessContext,
    ) -> curtail_core::analytics::Result<()> {
        self.seen.lock().unwrap().push((code.clone(), context.clone()));
        Ok(())
    }
}

fn owner() -> OwnerId {
    OwnerId::new("flow-tester")
}

fn generator() -> FlakeCodeGenerator {
    FlakeCodeGenerator::new(
        GeneratorSettings::builder()
            .machine_id(3)
            .epoch(Timestamp::from_second(1_600_000_000).unwrap())
            .build(),
    )
    .unwrap()
}

fn shortener<S: UrlStore + Clone>(
    store: &S,
    cache: &MokaUrlCache,
) -> ShortenerService<S, MokaUrlCache, FlakeCodeGenerator> {
    ShortenerService::new(
        store.clone(),
        cache.clone(),
        generator(),
        ShortenerSettings::default(),
    )
}

fn resolver<S: ReadStore + Clone>(
    store: &S,
    cache: &MokaUrlCache,
    recorder: AccessRecorder,
) -> ResolverService<S, MokaUrlCache> {
    ResolverService::new(
        store.clone(),
        cache.clone(),
        recorder,
        ResolverSettings::default(),
    )
}

#[tokio::test]
async fn second_resolve_is_served_without_a_store_read() -> anyhow::Result<()> {
    let store = CountingStore::new();
    let cache = MokaUrlCache::new();

    let mut aggregate = ShortUrlAggregate::create(
        CreateUrl::builder()
            .short_code(ShortCode::parse("abc123")?)
            .original_url("https://example.com")
            .created_by(owner())
            .now(Timestamp::now())
            .build(),
    )?;
    store.save(&mut aggregate).await?;

    let (recorder, _worker) =
        AccessRecorder::spawn(store.clone(), cache.clone(), LogSink, RecorderSettings::default());
    let service = resolver(&store, &cache, recorder);
    let code = ShortCode::parse("abc123")?;

    let first = service.resolve(&code, AccessContext::default()).await?;
    assert_eq!(first.as_deref(), Some("https://example.com"));
    assert_eq!(store.record_reads(), 1);

    let second = service.resolve(&code, AccessContext::default()).await?;
    assert_eq!(second.as_deref(), Some("https://example.com"));
    assert_eq!(store.record_reads(), 1);
    Ok(())
}

#[tokio::test]
async fn created_url_is_served_from_the_primed_cache() -> anyhow::Result<()> {
    let store = CountingStore::new();
    let cache = MokaUrlCache::new();
    let shortener = shortener(&store, &cache);

    let created = shortener
        .create(
            CreateRequest::builder()
                .original_url("https://example.com/launch")
                .created_by(owner())
                .build(),
        )
        .await?;

    let (recorder, _worker) =
        AccessRecorder::spawn(store.clone(), cache.clone(), LogSink, RecorderSettings::default());
    let service = resolver(&store, &cache, recorder);

    let url = service
        .resolve(&created.short_code, AccessContext::default())
        .await?;
    assert_eq!(url.as_deref(), Some("https://example.com/launch"));
    assert_eq!(store.record_reads(), 0);
    Ok(())
}

#[tokio::test]
async fn disable_stops_resolution_immediately() -> anyhow::Result<()> {
    let store = InMemoryStore::new();
    let cache = MokaUrlCache::new();
    let shortener = shortener(&store, &cache);

    let created = shortener
        .create(
            CreateRequest::builder()
                .original_url("https://example.com/retired")
                .created_by(owner())
                .build(),
        )
        .await?;
    let code = created.short_code.clone();

    let (recorder, _worker) =
        AccessRecorder::spawn(store.clone(), cache.clone(), LogSink, RecorderSettings::default());
    let service = resolver(&store, &cache, recorder);

    let before = service.resolve(&code, AccessContext::default()).await?;
    assert!(before.is_some());

    shortener.disable(&code, "abuse report", None).await?;

    let after = service.resolve(&code, AccessContext::default()).await?;
    assert!(after.is_none());

    // The record physically remains, only its status changed.
    let record = store.record(&code).await?.expect("record still stored");
    assert_eq!(record.status, UrlStatus::Disabled);
    Ok(())
}

#[tokio::test]
async fn overdue_access_flips_the_record_to_expired() -> anyhow::Result<()> {
    let store = InMemoryStore::new();
    let cache = MokaUrlCache::new();
    let shortener = shortener(&store, &cache);

    let created = shortener
        .create(
            CreateRequest::builder()
                .original_url("https://example.com/flash-sale")
                .created_by(owner())
                .expires_at(Some(Timestamp::now() + SignedDuration::from_millis(100)))
                .build(),
        )
        .await?;
    let code = created.short_code.clone();

    tokio::time::sleep(Duration::from_millis(200)).await;

    // The primed cache still answers, so this one access is served stale;
    // recording it is what discovers the expiry.
    let (recorder, worker) =
        AccessRecorder::spawn(store.clone(), cache.clone(), LogSink, RecorderSettings::default());
    let service = resolver(&store, &cache, recorder);
    let served = service.resolve(&code, AccessContext::default()).await?;
    assert!(served.is_some());

    drop(service);
    worker.await?;

    let record = store.record(&code).await?.expect("record still stored");
    assert_eq!(record.status, UrlStatus::Expired);
    assert_eq!(record.access_count, 0);

    // The recorder also invalidated the cache, so resolution now misses
    // it, sees the expired record, and answers negatively.
    let (recorder, _worker) =
        AccessRecorder::spawn(store.clone(), cache.clone(), LogSink, RecorderSettings::default());
    let service = resolver(&store, &cache, recorder);
    let gone = service.resolve(&code, AccessContext::default()).await?;
    assert!(gone.is_none());
    Ok(())
}

#[tokio::test]
async fn queued_recordings_drain_on_shutdown() -> anyhow::Result<()> {
    let store = InMemoryStore::new();
    let cache = MokaUrlCache::new();
    let shortener = shortener(&store, &cache);

    let created = shortener
        .create(
            CreateRequest::builder()
                .original_url("https://example.com/popular")
                .created_by(owner())
                .build(),
        )
        .await?;
    let code = created.short_code.clone();

    let (recorder, worker) =
        AccessRecorder::spawn(store.clone(), cache.clone(), LogSink, RecorderSettings::default());
    let service = resolver(&store, &cache, recorder);

    for _ in 0..5 {
        let url = service.resolve(&code, AccessContext::default()).await?;
        assert!(url.is_some());
    }

    drop(service);
    worker.await?;

    let record = store.record(&code).await?.expect("record still stored");
    assert_eq!(record.access_count, 5);
    assert!(record.last_accessed_at.is_some());
    Ok(())
}

#[tokio::test]
async fn sink_receives_each_served_access() -> anyhow::Result<()> {
    let store = InMemoryStore::new();
    let cache = MokaUrlCache::new();
    let shortener = shortener(&store, &cache);

    let created = shortener
        .create(
            CreateRequest::builder()
                .original_url("https://example.com/tracked")
                .created_by(owner())
                .build(),
        )
        .await?;
    let code = created.short_code.clone();

    let sink = CollectingSink::default();
    let (recorder, worker) = AccessRecorder::spawn(
        store.clone(),
        cache.clone(),
        sink.clone(),
        RecorderSettings::default(),
    );
    let service = resolver(&store, &cache, recorder);

    let context = AccessContext::builder()
        .ip_address("203.0.113.9")
        .user_agent("curl/8.5")
        .build();
    service.resolve(&code, context.clone()).await?;
    service.resolve(&code, AccessContext::default()).await?;

    drop(service);
    worker.await?;

    let seen = sink.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0, code);
    assert_eq!(seen[0].1, context);
    Ok(())
}
