//! Cache tier implementations shared across curtail services.
//!
//! Both backends implement [`curtail_core::UrlCache`]: an in-process
//! [`MokaUrlCache`] for single-node setups and a [`RedisUrlCache`] for
//! sharing lookups across nodes.

pub mod moka;
pub mod redis;

pub use crate::moka::MokaUrlCache;
pub use crate::redis::RedisUrlCache;
