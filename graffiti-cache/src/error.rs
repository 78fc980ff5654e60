//! Local error type for `graffiti-cache`.

use graffiti_types::error::{CoreError, ErrorCode};
use thiserror::Error;

/// Errors produced by the local inbox cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The underlying storage backend failed.
    #[error("cache backend error: {0}")]
    Backend(String),
    /// A cached value could not be (de)serialized.
    #[error("cache encoding error: {0}")]
    Encoding(String),
}

impl ErrorCode for CacheError {
    fn code(&self) -> &'static str {
        match self {
            Self::Backend(_) => "CACHE_BACKEND_ERROR",
            Self::Encoding(_) => "CACHE_ENCODING_ERROR",
        }
    }
}

impl From<CacheError> for CoreError {
    fn from(e: CacheError) -> Self {
        CoreError::Transport(e.to_string())
    }
}
