use crate::aggregate::ShortUrlAggregate;
use crate::error::StoreError;
use crate::record::ShortUrlRecord;
use crate::shortcode::ShortCode;
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, StoreError>;

/// A read-only view of the durable store.
///
/// The resolution path only ever needs the materialized projection, never
/// the event stream itself.
#[async_trait]
pub trait ReadStore: Send + Sync + 'static {
    /// Retrieves the materialized record for a short code.
    /// Returns `None` if the code does not exist.
    async fn record(&self, code: &ShortCode) -> Result<Option<ShortUrlRecord>>;

    /// Checks whether a short code is already bound.
    async fn exists(&self, code: &ShortCode) -> Result<bool>;
}

/// The durable, authoritative store for short-url event streams.
#[async_trait]
pub trait UrlStore: ReadStore {
    /// Loads an aggregate by replaying its persisted event stream.
    /// Returns `None` if the code does not exist.
    async fn load(&self, code: &ShortCode) -> Result<Option<ShortUrlAggregate>>;

    /// Appends the aggregate's pending events and refreshes the projection.
    ///
    /// The append succeeds only while the persisted stream still sits at
    /// [`committed_version`][ShortUrlAggregate::committed_version]: a
    /// concurrent writer surfaces as [`StoreError::VersionConflict`], and a
    /// short-code collision on a first save as [`StoreError::CodeTaken`].
    /// On success the pending events are marked committed. Saving an
    /// aggregate with nothing pending is a no-op.
    async fn save(&self, aggregate: &mut ShortUrlAggregate) -> Result<()>;
}
