//! Durable store implementations for curtail.
//!
//! Both stores speak the `UrlStore` contract from `curtail-core`: an
//! append-only event stream per aggregate plus a materialized projection
//! for reads, with optimistic concurrency on the stream version.

pub mod memory;
pub mod mysql;

pub use memory::InMemoryStore;
pub use mysql::MySqlStore;
