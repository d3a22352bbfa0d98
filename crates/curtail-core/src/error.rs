use crate::record::UrlStatus;
use jiff::Timestamp;
use thiserror::Error;

/// Rejections raised while validating creation input.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid original url: {0}")]
    InvalidUrl(String),
    #[error("invalid alias: {0}")]
    InvalidAlias(String),
    #[error("expiry is not in the future: expires_at={expires_at}, now={now}")]
    ExpiryNotInFuture {
        expires_at: Timestamp,
        now: Timestamp,
    },
    #[error("invalid metadata: {0}")]
    Metadata(String),
}

/// Why an access could not be recorded against an aggregate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("record is {status} and no longer accepts accesses")]
    NotActive { status: UrlStatus },
}

/// A persisted event stream that cannot be folded back into an aggregate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReplayError {
    #[error("event stream is empty")]
    EmptyStream,
    #[error("first event must be a creation event, got {kind}")]
    GenesisMismatch { kind: &'static str },
    #[error("creation event appeared again at version {version}")]
    DuplicateGenesis { version: u64 },
    #[error("expected event version {expected}, got {got}")]
    VersionGap { expected: u64, got: u64 },
    #[error("{kind} event cannot apply to a {status} record")]
    EventMismatch {
        status: UrlStatus,
        kind: &'static str,
    },
}

/// Base62 decode failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Base62Error {
    #[error("empty input")]
    Empty,
    #[error("invalid base62 character '{char}' at position {position}")]
    InvalidChar { char: char, position: usize },
    #[error("value does not fit in 64 bits")]
    Overflow,
}

/// Errors surfaced by durable store implementations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The short code is already bound to another aggregate.
    #[error("short code already taken: {0}")]
    CodeTaken(String),
    /// The stream advanced past the version this save was based on.
    #[error("version conflict on '{code}': expected stream at {expected}")]
    VersionConflict { code: String, expected: u64 },
    #[error("store backend unavailable: {0}")]
    Unavailable(String),
    #[error("store operation timed out: {0}")]
    Timeout(String),
    #[error("store query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
}

impl StoreError {
    /// True for conflicts a caller resolves by regenerating or reloading
    /// and retrying, as opposed to infrastructure failures.
    pub fn is_retryable_conflict(&self) -> bool {
        matches!(self, Self::CodeTaken(_) | Self::VersionConflict { .. })
    }
}

impl From<ReplayError> for StoreError {
    fn from(err: ReplayError) -> Self {
        Self::InvalidData(err.to_string())
    }
}

/// Errors surfaced by cache implementations.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache operation timed out: {0}")]
    Timeout(String),
    #[error("cache operation failed: {0}")]
    Operation(String),
}

/// Errors surfaced by analytics sinks.
#[derive(Debug, Clone, Error)]
pub enum SinkError {
    #[error("analytics sink unavailable: {0}")]
    Unavailable(String),
    #[error("analytics sink rejected the access detail: {0}")]
    Rejected(String),
}

/// An unrecognized status string from a persisted projection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown url status: {0}")]
pub struct UnknownStatus(pub String);
