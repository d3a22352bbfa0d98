use crate::record::{AggregateId, OwnerId};
use crate::shortcode::ShortCode;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;
use typed_builder::TypedBuilder;
use uuid::Uuid;

/// Identifies a single domain event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for EventId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Where an access came from, as captured at the redirect boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TypedBuilder)]
pub struct AccessContext {
    #[builder(default, setter(strip_option, into))]
    pub ip_address: Option<String>,
    #[builder(default, setter(strip_option, into))]
    pub user_agent: Option<String>,
    #[builder(default, setter(strip_option, into))]
    pub referrer: Option<String>,
    #[builder(default, setter(strip_option, into))]
    pub geo: Option<String>,
    #[builder(default, setter(strip_option, into))]
    pub device: Option<String>,
}

/// What happened to a short url.
///
/// This is a closed set: state reconstruction matches on it exhaustively,
/// so adding a variant fails compilation everywhere a fold needs updating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// The short url came into existence.
    Created {
        short_code: ShortCode,
        original_url: String,
        created_by: OwnerId,
        expires_at: Option<Timestamp>,
        metadata: BTreeMap<String, String>,
    },
    /// A redirect was served and counted.
    Accessed { context: AccessContext },
    /// An access attempt arrived at or past the expiry timestamp.
    Expired,
    /// An operator or security process turned the url off.
    Disabled {
        reason: String,
        admin_notes: Option<String>,
    },
}

impl EventPayload {
    /// Stable name of the event kind, for logs and storage.
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::Created { .. } => "created",
            EventPayload::Accessed { .. } => "accessed",
            EventPayload::Expired => "expired",
            EventPayload::Disabled { .. } => "disabled",
        }
    }
}

/// One immutable entry in an aggregate's event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub aggregate_id: AggregateId,
    pub event_id: EventId,
    /// Position in the stream; the creation event is version 1.
    pub version: u64,
    pub occurred_at: Timestamp,
    pub payload: EventPayload,
}
