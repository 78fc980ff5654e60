//! Local error type for `graffiti-transport`.

use graffiti_types::error::{CoreError, ErrorCode};
use thiserror::Error;

/// Errors produced by the inbox and storage bucket HTTP clients.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The HTTP client itself failed (connection, TLS, timeout).
    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),
    /// The server responded with a non-success status; mapped per the §6
    /// status table.
    #[error("http {status}: {message}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The response body, or a short description if the body was empty
        /// or unreadable.
        message: String,
    },
    /// A streamed response body exceeded its declared or enforced size cap.
    #[error("response body exceeded {max} bytes (got at least {got})")]
    Truncated {
        /// The caller's configured maximum.
        max: usize,
        /// The number of bytes actually read before the cap tripped.
        got: usize,
    },
    /// A response body ended before reaching its declared `Content-Length`.
    #[error("response body truncated: expected {expected} bytes, got {got}")]
    UnexpectedEof {
        /// The declared length.
        expected: usize,
        /// The number of bytes actually received.
        got: usize,
    },
    /// A local cache operation failed.
    #[error(transparent)]
    Cache(#[from] graffiti_cache::CacheError),
    /// Object encoding or validation failed.
    #[error(transparent)]
    Protocol(#[from] graffiti_protocol::ProtocolError),
    /// A CBOR request or response body could not be (de)serialized.
    #[error("codec error: {0}")]
    Codec(String),
}

impl ErrorCode for TransportError {
    fn code(&self) -> &'static str {
        match self {
            Self::Http(_) => "TRANSPORT_HTTP_ERROR",
            Self::Status { .. } => "TRANSPORT_STATUS_ERROR",
            Self::Truncated { .. } => "TRANSPORT_TRUNCATED",
            Self::UnexpectedEof { .. } => "TRANSPORT_UNEXPECTED_EOF",
            Self::Cache(_) => "TRANSPORT_CACHE_ERROR",
            Self::Protocol(_) => "TRANSPORT_PROTOCOL_ERROR",
            Self::Codec(_) => "TRANSPORT_CODEC_ERROR",
        }
    }
}

impl From<TransportError> for CoreError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Http(err) => CoreError::Transport(err.to_string()),
            TransportError::Status { status, message } => {
                CoreError::from_http_status(status, message)
            }
            TransportError::Truncated { .. } | TransportError::UnexpectedEof { .. } => {
                CoreError::TooLarge(e.to_string())
            }
            TransportError::Cache(c) => c.into(),
            TransportError::Protocol(p) => p.into(),
            TransportError::Codec(msg) => CoreError::ProtocolViolation(msg),
        }
    }
}
