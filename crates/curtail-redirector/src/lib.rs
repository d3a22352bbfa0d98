//! Redirect-side resolution for curtail.
//!
//! [`ResolverService`] answers "where does this code point" with a
//! cache-then-store lookup and hands every access attempt to an
//! [`AccessRecorder`], which persists it off the request path. The
//! resolver itself never touches the event stream.

pub mod error;
pub mod recorder;
pub mod service;
pub mod sink;

pub use error::ResolveError;
pub use recorder::{AccessRecorder, RecorderSettings};
pub use service::{ResolverService, ResolverSettings};
pub use sink::LogSink;
