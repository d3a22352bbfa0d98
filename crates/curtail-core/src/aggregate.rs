use crate::error::{AccessError, ReplayError, ValidationError};
use crate::event::{AccessContext, DomainEvent, EventId, EventPayload};
use crate::record::{validate_metadata, AggregateId, OwnerId, ShortUrlRecord, UrlStatus};
use crate::shortcode::ShortCode;
use jiff::Timestamp;
use std::collections::BTreeMap;
use typed_builder::TypedBuilder;
use url::Url;

/// Input for bringing a new short url into existence.
#[derive(Debug, Clone, TypedBuilder)]
pub struct CreateUrl {
    pub short_code: ShortCode,
    #[builder(setter(into))]
    pub original_url: String,
    pub created_by: OwnerId,
    #[builder(default)]
    pub expires_at: Option<Timestamp>,
    #[builder(default)]
    pub metadata: BTreeMap<String, String>,
    pub now: Timestamp,
}

/// What `record_access` observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOutcome {
    /// The access was counted.
    Recorded,
    /// The access arrived past expiry; the record flipped to expired and
    /// the discovering access itself was not counted.
    Expired,
}

impl ShortUrlRecord {
    /// Folds the genesis event into the initial record state.
    fn originate(event: &DomainEvent) -> Result<Self, ReplayError> {
        match &event.payload {
            EventPayload::Created {
                short_code,
                original_url,
                created_by,
                expires_at,
                metadata,
            } => Ok(ShortUrlRecord {
                id: event.aggregate_id,
                short_code: short_code.clone(),
                original_url: original_url.clone(),
                status: UrlStatus::Active,
                created_at: event.occurred_at,
                expires_at: *expires_at,
                last_accessed_at: None,
                access_count: 0,
                created_by: created_by.clone(),
                metadata: metadata.clone(),
            }),
            other => Err(ReplayError::GenesisMismatch { kind: other.kind() }),
        }
    }

    /// Pure transition: folds one non-genesis event into the next state.
    fn evolve(&self, event: &DomainEvent) -> Result<Self, ReplayError> {
        match &event.payload {
            EventPayload::Created { .. } => Err(ReplayError::DuplicateGenesis {
                version: event.version,
            }),
            EventPayload::Accessed { .. } => {
                if self.status != UrlStatus::Active {
                    return Err(ReplayError::EventMismatch {
                        status: self.status,
                        kind: event.payload.kind(),
                    });
                }
                let mut next = self.clone();
                next.access_count += 1;
                next.last_accessed_at = Some(event.occurred_at);
                Ok(next)
            }
            EventPayload::Expired => {
                if self.status != UrlStatus::Active {
                    return Err(ReplayError::EventMismatch {
                        status: self.status,
                        kind: event.payload.kind(),
                    });
                }
                let mut next = self.clone();
                next.status = UrlStatus::Expired;
                Ok(next)
            }
            EventPayload::Disabled { .. } => {
                if self.status != UrlStatus::Active {
                    return Err(ReplayError::EventMismatch {
                        status: self.status,
                        kind: event.payload.kind(),
                    });
                }
                let mut next = self.clone();
                next.status = UrlStatus::Disabled;
                Ok(next)
            }
        }
    }
}

/// Event-sourced short url.
///
/// State only ever advances by applying events: commands validate against
/// the current record, append to the pending list, and fold the new event
/// in through the same pure transitions that replay uses.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortUrlAggregate {
    record: ShortUrlRecord,
    version: u64,
    pending: Vec<DomainEvent>,
}

impl ShortUrlAggregate {
    /// Creates a new aggregate, emitting the genesis event at version 1.
    pub fn create(params: CreateUrl) -> Result<Self, ValidationError> {
        validate_original_url(&params.original_url)?;
        if let Some(expires_at) = params.expires_at {
            if expires_at <= params.now {
                return Err(ValidationError::ExpiryNotInFuture {
                    expires_at,
                    now: params.now,
                });
            }
        }
        validate_metadata(&params.metadata)?;

        let event = DomainEvent {
            aggregate_id: AggregateId::new(),
            event_id: EventId::new(),
            version: 1,
            occurred_at: params.now,
            payload: EventPayload::Created {
                short_code: params.short_code,
                original_url: params.original_url,
                created_by: params.created_by,
                expires_at: params.expires_at,
                metadata: params.metadata,
            },
        };
        let record = ShortUrlRecord::originate(&event).expect("just built a creation event");

        Ok(Self {
            record,
            version: 1,
            pending: vec![event],
        })
    }

    /// Applies an access attempt observed at `now`.
    ///
    /// While active and unexpired this emits an access event and counts it.
    /// The first attempt at or past the expiry timestamp emits the expiry
    /// transition instead; that attempt is not counted. Terminal records
    /// refuse the access outright.
    pub fn record_access(
        &mut self,
        context: AccessContext,
        now: Timestamp,
    ) -> Result<AccessOutcome, AccessError> {
        if self.record.status != UrlStatus::Active {
            return Err(AccessError::NotActive {
                status: self.record.status,
            });
        }
        if self.record.past_expiry(now) {
            self.emit(EventPayload::Expired, now);
            return Ok(AccessOutcome::Expired);
        }
        self.emit(EventPayload::Accessed { context }, now);
        Ok(AccessOutcome::Recorded)
    }

    /// Turns the url off.
    ///
    /// Returns `false` without emitting anything when the record is not
    /// active anymore; disabling twice yields exactly one disabled event.
    pub fn disable(
        &mut self,
        reason: impl Into<String>,
        admin_notes: Option<String>,
        now: Timestamp,
    ) -> bool {
        if self.record.status != UrlStatus::Active {
            return false;
        }
        self.emit(
            EventPayload::Disabled {
                reason: reason.into(),
                admin_notes,
            },
            now,
        );
        true
    }

    fn emit(&mut self, payload: EventPayload, now: Timestamp) {
        let event = DomainEvent {
            aggregate_id: self.record.id,
            event_id: EventId::new(),
            version: self.version + 1,
            occurred_at: now,
            payload,
        };
        self.record = self
            .record
            .evolve(&event)
            .expect("commands emit only events valid for the current state");
        self.version = event.version;
        self.pending.push(event);
    }

    /// Rebuilds an aggregate purely from its persisted event stream.
    ///
    /// Events must arrive in ascending, gap-free version order starting at
    /// the genesis event.
    pub fn replay(events: Vec<DomainEvent>) -> Result<Self, ReplayError> {
        let mut iter = events.into_iter();
        let first = iter.next().ok_or(ReplayError::EmptyStream)?;
        if first.version != 1 {
            return Err(ReplayError::VersionGap {
                expected: 1,
                got: first.version,
            });
        }

        let mut record = ShortUrlRecord::originate(&first)?;
        let mut version = 1;
        for event in iter {
            if event.version != version + 1 {
                return Err(ReplayError::VersionGap {
                    expected: version + 1,
                    got: event.version,
                });
            }
            record = record.evolve(&event)?;
            version = event.version;
        }

        Ok(Self {
            record,
            version,
            pending: Vec::new(),
        })
    }

    /// Current materialized state.
    pub fn record(&self) -> &ShortUrlRecord {
        &self.record
    }

    pub fn short_code(&self) -> &ShortCode {
        &self.record.short_code
    }

    pub fn id(&self) -> AggregateId {
        self.record.id
    }

    /// Version of the last applied event.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Stream version this aggregate was loaded at; pending events sit
    /// above it.
    pub fn committed_version(&self) -> u64 {
        self.version - self.pending.len() as u64
    }

    /// Events emitted since load, in application order.
    pub fn pending_events(&self) -> &[DomainEvent] {
        &self.pending
    }

    /// Drops the pending events after a durable append. Called by stores
    /// once the append and projection update have succeeded.
    pub fn mark_committed(&mut self) {
        self.pending.clear();
    }
}

fn validate_original_url(input: &str) -> Result<(), ValidationError> {
    let url =
        Url::parse(input).map_err(|e| ValidationError::InvalidUrl(format!("'{input}': {e}")))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ValidationError::InvalidUrl(format!(
                "scheme must be http or https, got '{other}'"
            )))
        }
    }
    if url.host_str().is_none() {
        return Err(ValidationError::InvalidUrl(format!(
            "'{input}' has no host"
        )));
    }
    Ok(())
}
