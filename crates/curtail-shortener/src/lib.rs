//! URL creation service and short code generation.
//!
//! [`ShortenerService`] drives the write path: it turns creation requests
//! into event-sourced aggregates, persists them through a
//! [`curtail_core::UrlStore`], and primes the cache tier. Candidate codes
//! come from a [`CodeGenerator`]; the store's uniqueness constraint stays
//! the final arbiter and collisions are retried with a fresh code.

pub mod error;
pub mod generator;
pub mod service;

pub use error::{GeneratorError, ShortenError};
pub use generator::{CodeGenerator, FlakeCodeGenerator, GeneratorSettings};
pub use service::{CreateRequest, CreatedUrl, ShortenerService, ShortenerSettings};
