//! Local error type for `graffiti-engine`.

use graffiti_types::error::{CoreError, ErrorCode};
use thiserror::Error;

/// Errors produced by the announcement and discovery engines.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The requested object, or a service an operation depends on, does not
    /// exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// A mutation was attempted against an object owned by another actor
    /// (§4.I "actor in URL must equal session actor").
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// A caller-supplied schema failed to compile.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// An object was found but does not satisfy the caller's schema; a
    /// server-side protocol violation when encountered mid-stream (§7).
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    /// An identity, object, or message violated a cryptographic or
    /// structural invariant.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    /// Identity resolution, an external collaborator, failed.
    #[error("identity resolution failed: {0}")]
    IdentityResolution(String),
    /// Object encoding or validation failed.
    #[error(transparent)]
    Protocol(#[from] graffiti_protocol::ProtocolError),
    /// A lower-level transport failure.
    #[error(transparent)]
    Transport(#[from] graffiti_transport::TransportError),
}

impl ErrorCode for EngineError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "ENGINE_NOT_FOUND",
            Self::Forbidden(_) => "ENGINE_FORBIDDEN",
            Self::InvalidSchema(_) => "ENGINE_INVALID_SCHEMA",
            Self::SchemaMismatch(_) => "ENGINE_SCHEMA_MISMATCH",
            Self::ProtocolViolation(_) => "ENGINE_PROTOCOL_VIOLATION",
            Self::IdentityResolution(_) => "ENGINE_IDENTITY_RESOLUTION_FAILED",
            Self::Protocol(_) => "ENGINE_PROTOCOL_ERROR",
            Self::Transport(_) => "ENGINE_TRANSPORT_ERROR",
        }
    }
}

impl From<EngineError> for CoreError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::NotFound(_) => CoreError::NotFound(e.to_string()),
            EngineError::Forbidden(_) => CoreError::Forbidden(e.to_string()),
            EngineError::InvalidSchema(_) => CoreError::InvalidSchema(e.to_string()),
            EngineError::SchemaMismatch(_) => CoreError::SchemaMismatch(e.to_string()),
            EngineError::ProtocolViolation(_) => CoreError::ProtocolViolation(e.to_string()),
            EngineError::IdentityResolution(_) => CoreError::Transport(e.to_string()),
            EngineError::Protocol(p) => p.into(),
            EngineError::Transport(t) => t.into(),
        }
    }
}
