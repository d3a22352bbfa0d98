//! Core types and traits for the curtail URL shortener.
//!
//! This crate provides the domain model shared by the shortener and
//! redirector services: short codes and their base62 codec, the
//! event-sourced short-url aggregate, and the contracts for durable stores,
//! cache tiers, and analytics sinks.

pub mod aggregate;
pub mod analytics;
pub mod base62;
pub mod cache;
pub mod error;
pub mod event;
pub mod record;
pub mod shortcode;
pub mod store;

pub use aggregate::{AccessOutcome, CreateUrl, ShortUrlAggregate};
pub use analytics::AnalyticsSink;
pub use base62::Base62Code;
pub use cache::{InvalidationReason, UrlCache};
pub use error::{
    AccessError, Base62Error, CacheError, ReplayError, SinkError, StoreError, ValidationError,
};
pub use event::{AccessContext, DomainEvent, EventId, EventPayload};
pub use record::{AggregateId, OwnerId, ShortUrlRecord, UrlStatus};
pub use shortcode::ShortCode;
pub use store::{ReadStore, UrlStore};
