use crate::error::{UnknownStatus, ValidationError};
use crate::shortcode::ShortCode;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;
use uuid::Uuid;

/// Identifies one short-url aggregate across its whole event stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateId(Uuid);

impl AggregateId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AggregateId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for AggregateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for AggregateId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Opaque identifier of the principal that created a short url.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(owner: impl Into<String>) -> Self {
        Self(owner.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a short url.
///
/// `Suspended` is reserved for policy tooling; no transition in the current
/// command set produces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlStatus {
    Active,
    Expired,
    Disabled,
    Suspended,
}

impl UrlStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrlStatus::Active => "active",
            UrlStatus::Expired => "expired",
            UrlStatus::Disabled => "disabled",
            UrlStatus::Suspended => "suspended",
        }
    }
}

impl Display for UrlStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UrlStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UrlStatus::Active),
            "expired" => Ok(UrlStatus::Expired),
            "disabled" => Ok(UrlStatus::Disabled),
            "suspended" => Ok(UrlStatus::Suspended),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Materialized state of a short url, the fold of its event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortUrlRecord {
    pub id: AggregateId,
    pub short_code: ShortCode,
    pub original_url: String,
    pub status: UrlStatus,
    pub created_at: Timestamp,
    pub expires_at: Option<Timestamp>,
    pub last_accessed_at: Option<Timestamp>,
    pub access_count: u64,
    pub created_by: OwnerId,
    pub metadata: BTreeMap<String, String>,
}

impl ShortUrlRecord {
    /// True when the expiry timestamp exists and has been reached.
    pub fn past_expiry(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    /// True when the record may still serve redirects.
    pub fn is_servable(&self, now: Timestamp) -> bool {
        self.status == UrlStatus::Active && !self.past_expiry(now)
    }
}

pub const MAX_METADATA_ENTRIES: usize = 16;
pub const MAX_METADATA_KEY_BYTES: usize = 64;
pub const MAX_METADATA_VALUE_BYTES: usize = 256;

/// Validates a caller-supplied metadata map against the size bounds.
pub fn validate_metadata(metadata: &BTreeMap<String, String>) -> Result<(), ValidationError> {
    if metadata.len() > MAX_METADATA_ENTRIES {
        return Err(ValidationError::Metadata(format!(
            "at most {} entries allowed, got {}",
            MAX_METADATA_ENTRIES,
            metadata.len()
        )));
    }
    for (key, value) in metadata {
        if key.is_empty() || key.len() > MAX_METADATA_KEY_BYTES {
            return Err(ValidationError::Metadata(format!(
                "key length must be 1..={MAX_METADATA_KEY_BYTES} bytes: '{key}'"
            )));
        }
        if value.len() > MAX_METADATA_VALUE_BYTES {
            return Err(ValidationError::Metadata(format!(
                "value for '{key}' exceeds {MAX_METADATA_VALUE_BYTES} bytes"
            )));
        }
    }
    Ok(())
}
