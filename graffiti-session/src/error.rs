//! Local error type for `graffiti-session`.

use graffiti_types::error::{CoreError, ErrorCode};
use thiserror::Error;

/// Errors produced by the session manager.
#[derive(Error, Debug)]
pub enum SessionError {
    /// A login or logout was requested for an actor that already has one in
    /// progress (§4.J "Concurrent logins for the same actor are rejected").
    #[error("a login or logout is already in progress for {0}")]
    AlreadyInProgress(String),
    /// No login or logout is in progress for the given actor.
    #[error("no login or logout is in progress for {0}")]
    NotInProgress(String),
    /// An authorization-group flow did not complete within its timeout (§5).
    #[error("authorization group timed out for endpoint {0}")]
    GroupTimeout(String),
    /// The external authorization collaborator failed to produce or revoke
    /// a token.
    #[error("authorization failed: {0}")]
    Authorization(String),
    /// No stored session exists for the given actor.
    #[error("no session is stored for {0}")]
    NoStoredSession(String),
    /// A requested service type is not advertised by the actor's identity
    /// document.
    #[error("identity document has no {0} service")]
    MissingService(String),
    /// A state transition was attempted that the login/logout state machine
    /// does not allow (§4.J).
    #[error("invalid session state transition: {0}")]
    InvalidTransition(String),
    /// The session store backend failed to read or write persisted state.
    #[error("session persistence error: {0}")]
    Persistence(String),
    /// A lower-level transport failure (fetching a service's `/auth`
    /// endpoint, or a revoke call).
    #[error(transparent)]
    Transport(#[from] graffiti_transport::TransportError),
}

impl ErrorCode for SessionError {
    fn code(&self) -> &'static str {
        match self {
            Self::AlreadyInProgress(_) => "SESSION_ALREADY_IN_PROGRESS",
            Self::NotInProgress(_) => "SESSION_NOT_IN_PROGRESS",
            Self::GroupTimeout(_) => "SESSION_GROUP_TIMEOUT",
            Self::Authorization(_) => "SESSION_AUTHORIZATION_FAILED",
            Self::NoStoredSession(_) => "SESSION_NOT_FOUND",
            Self::MissingService(_) => "SESSION_MISSING_SERVICE",
            Self::InvalidTransition(_) => "SESSION_INVALID_TRANSITION",
            Self::Persistence(_) => "SESSION_PERSISTENCE_ERROR",
            Self::Transport(_) => "SESSION_TRANSPORT_ERROR",
        }
    }
}

impl From<SessionError> for CoreError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::AlreadyInProgress(_) => CoreError::ProtocolViolation(e.to_string()),
            SessionError::NotInProgress(_) | SessionError::NoStoredSession(_) => {
                CoreError::NotFound(e.to_string())
            }
            SessionError::MissingService(_) => CoreError::NotFound(e.to_string()),
            SessionError::GroupTimeout(_) | SessionError::Authorization(_) => {
                CoreError::Unauthorized(e.to_string())
            }
            SessionError::InvalidTransition(_) => CoreError::ProtocolViolation(e.to_string()),
            SessionError::Persistence(_) => CoreError::Transport(e.to_string()),
            SessionError::Transport(t) => t.into(),
        }
    }
}
