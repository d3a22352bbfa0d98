use curtail_core::{CacheError, ShortCode, StoreError, ValidationError};
use thiserror::Error;

/// Errors from short code generation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeneratorError {
    #[error("id generation failed: {0}")]
    Id(#[from] curtail_flake::Error),
    #[error("could not produce an unseen code after {attempts} attempts")]
    Saturated { attempts: u32 },
}

/// Errors from the creation and disable operations.
#[derive(Debug, Clone, Error)]
pub enum ShortenError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
    #[error("alias already taken: {0}")]
    AliasTaken(ShortCode),
    #[error("no short url for code: {0}")]
    NotFound(ShortCode),
    #[error("could not find a free short code after {attempts} attempts")]
    CodesExhausted { attempts: u32 },
    #[error("code generation failed: {0}")]
    Generator(#[from] GeneratorError),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}
