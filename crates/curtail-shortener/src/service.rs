use crate::error::ShortenError;
use crate::generator::CodeGenerator;
use curtail_core::{
    CreateUrl, InvalidationReason, OwnerId, ShortCode, ShortUrlAggregate, StoreError, UrlCache,
    UrlStore,
};
use jiff::Timestamp;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use typed_builder::TypedBuilder;

/// Tunables for the creation and disable operations.
#[derive(Debug, Clone, TypedBuilder)]
pub struct ShortenerSettings {
    /// TTL applied when a freshly created url is primed into the cache.
    #[builder(default = Duration::from_secs(600))]
    pub cache_ttl: Duration,
    /// Fresh codes to try when generated codes collide in the store.
    #[builder(default = 4)]
    pub max_create_attempts: u32,
    /// Reload-and-retry rounds when a disable races another writer.
    #[builder(default = 3)]
    pub max_save_retries: u32,
}

impl Default for ShortenerSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Input for creating a shortened url.
#[derive(Debug, Clone, TypedBuilder)]
pub struct CreateRequest {
    #[builder(setter(into))]
    pub original_url: String,
    /// Caller-chosen alias; when absent a code is generated.
    #[builder(default, setter(strip_option, into))]
    pub custom_alias: Option<String>,
    pub created_by: OwnerId,
    #[builder(default)]
    pub expires_at: Option<Timestamp>,
    #[builder(default)]
    pub metadata: BTreeMap<String, String>,
}

/// What the caller gets back after a successful creation.
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedUrl {
    pub short_code: ShortCode,
    pub original_url: String,
    pub created_at: Timestamp,
    pub expires_at: Option<Timestamp>,
}

/// Drives the write path: creation with collision retry, disable with
/// synchronous cache invalidation.
///
/// The store is the system of record; the cache is primed after a durable
/// save and a priming failure never fails the operation. Invalidation on
/// disable is the one cache call that must succeed, otherwise a stale
/// entry would keep serving a url the owner just turned off.
pub struct ShortenerService<S, C, G> {
    store: Arc<S>,
    cache: Arc<C>,
    generator: Arc<G>,
    settings: ShortenerSettings,
}

impl<S, C, G> Clone for ShortenerService<S, C, G> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            generator: Arc::clone(&self.generator),
            settings: self.settings.clone(),
        }
    }
}

impl<S, C, G> ShortenerService<S, C, G>
where
    S: UrlStore,
    C: UrlCache,
    G: CodeGenerator,
{
    pub fn new(store: S, cache: C, generator: G, settings: ShortenerSettings) -> Self {
        Self {
            store: Arc::new(store),
            cache: Arc::new(cache),
            generator: Arc::new(generator),
            settings,
        }
    }

    /// Creates a shortened url, either under the requested alias or under
    /// a generated code.
    pub async fn create(&self, request: CreateRequest) -> Result<CreatedUrl, ShortenError> {
        let now = Timestamp::now();
        match request.custom_alias.as_deref() {
            Some(alias) => self.create_with_alias(alias, &request, now).await,
            None => self.create_generated(&request, now).await,
        }
    }

    async fn create_with_alias(
        &self,
        alias: &str,
        request: &CreateRequest,
        now: Timestamp,
    ) -> Result<CreatedUrl, ShortenError> {
        let code = ShortCode::custom(alias)?;
        if self.store.exists(&code).await? {
            return Err(ShortenError::AliasTaken(code));
        }

        let mut aggregate = self.build_aggregate(code.clone(), request, now)?;
        if let Err(err) = self.store.save(&mut aggregate).await {
            // Lost the race between the exists check and the insert.
            return Err(match err {
                StoreError::CodeTaken(_) => ShortenError::AliasTaken(code),
                other => other.into(),
            });
        }
        Ok(self.finish_create(&aggregate).await)
    }

    async fn create_generated(
        &self,
        request: &CreateRequest,
        now: Timestamp,
    ) -> Result<CreatedUrl, ShortenError> {
        for attempt in 0..self.settings.max_create_attempts {
            let code = self.generator.generate()?;
            let mut aggregate = self.build_aggregate(code, request, now)?;
            match self.store.save(&mut aggregate).await {
                Ok(()) => return Ok(self.finish_create(&aggregate).await),
                Err(StoreError::CodeTaken(code)) => {
                    warn!(attempt, code = %code, "generated code collided, retrying");
                }
                Err(other) => return Err(other.into()),
            }
        }
        Err(ShortenError::CodesExhausted {
            attempts: self.settings.max_create_attempts,
        })
    }

    fn build_aggregate(
        &self,
        code: ShortCode,
        request: &CreateRequest,
        now: Timestamp,
    ) -> Result<ShortUrlAggregate, ShortenError> {
        let params = CreateUrl::builder()
            .short_code(code)
            .original_url(request.original_url.clone())
            .created_by(request.created_by.clone())
            .expires_at(request.expires_at)
            .metadata(request.metadata.clone())
            .now(now)
            .build();
        Ok(ShortUrlAggregate::create(params)?)
    }

    async fn finish_create(&self, aggregate: &ShortUrlAggregate) -> CreatedUrl {
        let record = aggregate.record();
        if let Err(err) = self
            .cache
            .set(
                &record.short_code,
                &record.original_url,
                self.settings.cache_ttl,
            )
            .await
        {
            warn!(code = %record.short_code, error = %err, "failed to prime cache for new url");
        }
        CreatedUrl {
            short_code: record.short_code.clone(),
            original_url: record.original_url.clone(),
            created_at: record.created_at,
            expires_at: record.expires_at,
        }
    }

    /// Turns a url off and synchronously removes it from the cache.
    ///
    /// Idempotent: disabling a url that is already disabled or expired
    /// succeeds without emitting anything. The cache entry must be gone
    /// before this returns, so an invalidation failure fails the call.
    pub async fn disable(
        &self,
        code: &ShortCode,
        reason: &str,
        admin_notes: Option<String>,
    ) -> Result<(), ShortenError> {
        let now = Timestamp::now();
        let mut aggregate = self
            .store
            .load(code)
            .await?
            .ok_or_else(|| ShortenError::NotFound(code.clone()))?;

        let mut attempt = 0;
        loop {
            if !aggregate.disable(reason, admin_notes.clone(), now) {
                debug!(code = %code, status = %aggregate.record().status, "already inactive, nothing to persist");
                break;
            }
            match self.store.save(&mut aggregate).await {
                Ok(()) => break,
                Err(err) if err.is_retryable_conflict() && attempt < self.settings.max_save_retries => {
                    attempt += 1;
                    debug!(code = %code, attempt, "conflicting write while disabling, reloading");
                    aggregate = self
                        .store
                        .load(code)
                        .await?
                        .ok_or_else(|| ShortenError::NotFound(code.clone()))?;
                }
                Err(err) => return Err(err.into()),
            }
        }

        self.cache
            .invalidate(code, InvalidationReason::Disabled)
            .await?;
        Ok(())
    }
}
