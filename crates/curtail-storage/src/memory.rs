use async_trait::async_trait;
use curtail_core::store::Result;
use curtail_core::{
    DomainEvent, ReadStore, ShortCode, ShortUrlAggregate, ShortUrlRecord, StoreError, UrlStore,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// In-memory event store keyed by short code.
///
/// Each entry holds the ordered event stream plus the projected record;
/// clones share the same underlying map. The dashmap shard lock serializes
/// the expected-version check with the append, which is what arbitrates
/// optimistic concurrency, and a vacant-entry insert is the uniqueness
/// barrier for new codes.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    streams: Arc<DashMap<String, Stream>>,
}

#[derive(Debug)]
struct Stream {
    events: Vec<DomainEvent>,
    record: ShortUrlRecord,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored aggregates.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

#[async_trait]
impl ReadStore for InMemoryStore {
    async fn record(&self, code: &ShortCode) -> Result<Option<ShortUrlRecord>> {
        Ok(self
            .streams
            .get(code.as_str())
            .map(|stream| stream.record.clone()))
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        Ok(self.streams.contains_key(code.as_str()))
    }
}

#[async_trait]
impl UrlStore for InMemoryStore {
    async fn load(&self, code: &ShortCode) -> Result<Option<ShortUrlAggregate>> {
        let Some(stream) = self.streams.get(code.as_str()) else {
            return Ok(None);
        };
        let aggregate = ShortUrlAggregate::replay(stream.events.clone())?;
        Ok(Some(aggregate))
    }

    async fn save(&self, aggregate: &mut ShortUrlAggregate) -> Result<()> {
        if aggregate.pending_events().is_empty() {
            return Ok(());
        }

        let code = aggregate.short_code().as_str().to_string();
        let expected = aggregate.committed_version();

        match self.streams.entry(code) {
            Entry::Vacant(entry) => {
                if expected != 0 {
                    // The stream this aggregate was loaded from is gone.
                    return Err(StoreError::VersionConflict {
                        code: entry.key().clone(),
                        expected,
                    });
                }
                entry.insert(Stream {
                    events: aggregate.pending_events().to_vec(),
                    record: aggregate.record().clone(),
                });
            }
            Entry::Occupied(mut entry) => {
                if expected == 0 || entry.get().record.id != aggregate.id() {
                    // A first save lost the race for this code.
                    return Err(StoreError::CodeTaken(entry.key().clone()));
                }
                let stream = entry.get_mut();
                if stream.events.len() as u64 != expected {
                    return Err(StoreError::VersionConflict {
                        code: entry.key().clone(),
                        expected,
                    });
                }
                stream.events.extend_from_slice(aggregate.pending_events());
                stream.record = aggregate.record().clone();
            }
        }

        aggregate.mark_committed();
        Ok(())
    }
}
