use curtail_core::StoreError;
use thiserror::Error;

/// Errors surfaced by the resolve path.
///
/// A cache failure is never one of these; lookups degrade to the store
/// and the failure is only logged.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}
