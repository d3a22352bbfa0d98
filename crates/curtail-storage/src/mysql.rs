use async_trait::async_trait;
use curtail_core::store::Result;
use curtail_core::{
    DomainEvent, EventPayload, ReadStore, ShortCode, ShortUrlAggregate, ShortUrlRecord,
    StoreError, UrlStore,
};
use jiff::Timestamp;
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

/// MySQL implementation of the store contract.
///
/// `short_url_events` is the append-only system of record, keyed by
/// `(aggregate_id, version)`; `short_urls` is the per-code projection the
/// read path serves from. A save writes both inside one transaction, so the
/// projection cannot drift from the stream. Short-code uniqueness rides on
/// the projection's primary key, stream concurrency on the event table's.
#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Creates a store from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a store by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Runs the embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

fn parse_timestamp_ms(ms: i64, column: &str) -> Result<Timestamp> {
    Timestamp::from_millisecond(ms)
        .map_err(|e| StoreError::InvalidData(format!("invalid {column} timestamp '{ms}': {e}")))
}

fn parse_opt_timestamp_ms(ms: Option<i64>, column: &str) -> Result<Option<Timestamp>> {
    ms.map(|value| parse_timestamp_ms(value, column)).transpose()
}

fn parse_column<T>(value: &str, column: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .parse()
        .map_err(|e| StoreError::InvalidData(format!("invalid {column} '{value}': {e}")))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StoreError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StoreError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StoreError::InvalidData(message),
        _ => StoreError::Query(message),
    }
}

fn record_from_row(row: &MySqlRow) -> Result<ShortUrlRecord> {
    let code_text: String = row.try_get("short_code").map_err(map_sqlx_error)?;
    let short_code = ShortCode::parse(&code_text)
        .map_err(|e| StoreError::InvalidData(format!("invalid short_code '{code_text}': {e}")))?;

    let aggregate_text: String = row.try_get("aggregate_id").map_err(map_sqlx_error)?;
    let status_text: String = row.try_get("status").map_err(map_sqlx_error)?;
    let metadata_text: String = row.try_get("metadata").map_err(map_sqlx_error)?;
    let metadata: BTreeMap<String, String> = serde_json::from_str(&metadata_text)
        .map_err(|e| StoreError::InvalidData(format!("invalid metadata: {e}")))?;

    let created_at_ms: i64 = row.try_get("created_at_ms").map_err(map_sqlx_error)?;
    let expires_at_ms: Option<i64> = row.try_get("expires_at_ms").map_err(map_sqlx_error)?;
    let last_accessed_at_ms: Option<i64> =
        row.try_get("last_accessed_at_ms").map_err(map_sqlx_error)?;
    let created_by: String = row.try_get("created_by").map_err(map_sqlx_error)?;

    Ok(ShortUrlRecord {
        id: parse_column(&aggregate_text, "aggregate_id")?,
        short_code,
        original_url: row.try_get("original_url").map_err(map_sqlx_error)?,
        status: parse_column(&status_text, "status")?,
        created_at: parse_timestamp_ms(created_at_ms, "created_at_ms")?,
        expires_at: parse_opt_timestamp_ms(expires_at_ms, "expires_at_ms")?,
        last_accessed_at: parse_opt_timestamp_ms(last_accessed_at_ms, "last_accessed_at_ms")?,
        access_count: row.try_get("access_count").map_err(map_sqlx_error)?,
        created_by: curtail_core::OwnerId::new(created_by),
        metadata,
    })
}

fn event_from_row(row: &MySqlRow) -> Result<DomainEvent> {
    let aggregate_text: String = row.try_get("aggregate_id").map_err(map_sqlx_error)?;
    let event_text: String = row.try_get("event_id").map_err(map_sqlx_error)?;
    let version: u64 = row.try_get("version").map_err(map_sqlx_error)?;
    let occurred_at_ms: i64 = row.try_get("occurred_at_ms").map_err(map_sqlx_error)?;
    let payload_text: String = row.try_get("payload").map_err(map_sqlx_error)?;
    let payload: EventPayload = serde_json::from_str(&payload_text)
        .map_err(|e| StoreError::InvalidData(format!("invalid event payload: {e}")))?;

    Ok(DomainEvent {
        aggregate_id: parse_column(&aggregate_text, "aggregate_id")?,
        event_id: parse_column(&event_text, "event_id")?,
        version,
        occurred_at: parse_timestamp_ms(occurred_at_ms, "occurred_at_ms")?,
        payload,
    })
}

#[async_trait]
impl ReadStore for MySqlStore {
    async fn record(&self, code: &ShortCode) -> Result<Option<ShortUrlRecord>> {
        let row = sqlx::query(
            r#"
            SELECT short_code, aggregate_id, original_url, status, created_at_ms,
                   expires_at_ms, last_accessed_at_ms, access_count, created_by,
                   version, metadata
            FROM short_urls
            WHERE short_code = ?
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        let exists = sqlx::query(
            r#"
            SELECT 1
            FROM short_urls
            WHERE short_code = ?
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .is_some();

        Ok(exists)
    }
}

#[async_trait]
impl UrlStore for MySqlStore {
    async fn load(&self, code: &ShortCode) -> Result<Option<ShortUrlAggregate>> {
        let rows = sqlx::query(
            r#"
            SELECT aggregate_id, event_id, version, occurred_at_ms, payload
            FROM short_url_events
            WHERE short_code = ?
            ORDER BY version ASC
            "#,
        )
        .bind(code.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if rows.is_empty() {
            return Ok(None);
        }

        let events = rows
            .iter()
            .map(event_from_row)
            .collect::<Result<Vec<_>>>()?;
        let aggregate = ShortUrlAggregate::replay(events)?;
        Ok(Some(aggregate))
    }

    async fn save(&self, aggregate: &mut ShortUrlAggregate) -> Result<()> {
        if aggregate.pending_events().is_empty() {
            return Ok(());
        }

        let record = aggregate.record();
        let code = record.short_code.as_str();
        let expected = aggregate.committed_version();

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        if expected == 0 {
            let metadata = serde_json::to_string(&record.metadata)
                .map_err(|e| StoreError::InvalidData(format!("metadata not serializable: {e}")))?;
            let result = sqlx::query(
                r#"
                INSERT INTO short_urls (short_code, aggregate_id, original_url, status,
                                        created_at_ms, expires_at_ms, last_accessed_at_ms,
                                        access_count, created_by, version, metadata)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(code)
            .bind(record.id.to_string())
            .bind(&record.original_url)
            .bind(record.status.as_str())
            .bind(record.created_at.as_millisecond())
            .bind(record.expires_at.map(|ts| ts.as_millisecond()))
            .bind(record.last_accessed_at.map(|ts| ts.as_millisecond()))
            .bind(record.access_count)
            .bind(record.created_by.as_str())
            .bind(aggregate.version())
            .bind(metadata)
            .execute(&mut *tx)
            .await;

            match result {
                Ok(_) => {}
                Err(err) if is_unique_violation(&err) => {
                    return Err(StoreError::CodeTaken(code.to_string()));
                }
                Err(err) => return Err(map_sqlx_error(err)),
            }
        } else {
            let result = sqlx::query(
                r#"
                UPDATE short_urls
                SET status = ?, last_accessed_at_ms = ?, access_count = ?, version = ?
                WHERE short_code = ? AND aggregate_id = ? AND version = ?
                "#,
            )
            .bind(record.status.as_str())
            .bind(record.last_accessed_at.map(|ts| ts.as_millisecond()))
            .bind(record.access_count)
            .bind(aggregate.version())
            .bind(code)
            .bind(record.id.to_string())
            .bind(expected)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            if result.rows_affected() == 0 {
                return Err(StoreError::VersionConflict {
                    code: code.to_string(),
                    expected,
                });
            }
        }

        for event in aggregate.pending_events() {
            let payload = serde_json::to_string(&event.payload).map_err(|e| {
                StoreError::InvalidData(format!("event payload not serializable: {e}"))
            })?;
            let result = sqlx::query(
                r#"
                INSERT INTO short_url_events (aggregate_id, version, event_id,
                                              short_code, occurred_at_ms, payload)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(event.aggregate_id.to_string())
            .bind(event.version)
            .bind(event.event_id.to_string())
            .bind(code)
            .bind(event.occurred_at.as_millisecond())
            .bind(payload)
            .execute(&mut *tx)
            .await;

            match result {
                Ok(_) => {}
                Err(err) if is_unique_violation(&err) => {
                    return Err(StoreError::VersionConflict {
                        code: code.to_string(),
                        expected,
                    });
                }
                Err(err) => return Err(map_sqlx_error(err)),
            }
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        aggregate.mark_committed();
        Ok(())
    }
}
