//! The unified error taxonomy for the graffiti protocol client (§7).

use thiserror::Error;

/// A trait for assigning a stable, machine-readable string code to an error,
/// independent of its human-readable `Display` message.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// The error taxonomy shared by every layer of the client core.
///
/// Variants correspond one-to-one with the kinds enumerated in §7 of the
/// specification. Lower layers (crypto, protocol, transport) define their
/// own local error enums and convert into this one at crate boundaries so
/// callers only ever match on one type.
#[derive(Error, Debug)]
pub enum CoreError {
    /// The requested object, actor service, bucket value, or cursor entry
    /// does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller did not present valid credentials for the operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The caller presented valid credentials but is not allowed to perform
    /// the operation (e.g. mutating another actor's object).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A size limit was exceeded: an envelope over 32 KiB, a `Content-Length`
    /// over the caller's `max_bytes`, or a stream that grew past it.
    #[error("too large: {0}")]
    TooLarge(String),

    /// The server-side cursor for a paged stream has expired, or the locally
    /// cached cursor `version` no longer matches.
    #[error("cursor expired: {0}")]
    CursorExpired(String),

    /// A caller-supplied schema does not compile.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// An object was found but does not satisfy the caller's schema.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// The media type requested by the caller cannot be produced.
    #[error("not acceptable: {0}")]
    NotAcceptable(String),

    /// A server (or another actor's announcement) violated the protocol's
    /// cryptographic or structural invariants: a hash mismatch, a missing or
    /// extra attestation, an object outside the stated schema, or mixed
    /// public/private envelope flags.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// A transport-level failure not otherwise classified (connection reset,
    /// malformed response body, DNS failure).
    #[error("transport error: {0}")]
    Transport(String),
}

impl ErrorCode for CoreError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::TooLarge(_) => "TOO_LARGE",
            Self::CursorExpired(_) => "CURSOR_EXPIRED",
            Self::InvalidSchema(_) => "INVALID_SCHEMA",
            Self::SchemaMismatch(_) => "SCHEMA_MISMATCH",
            Self::NotAcceptable(_) => "NOT_ACCEPTABLE",
            Self::ProtocolViolation(_) => "PROTOCOL_VIOLATION",
            Self::Transport(_) => "TRANSPORT_ERROR",
        }
    }
}

impl CoreError {
    /// Maps an HTTP status code to the `CoreError` variant it designates,
    /// per the status mapping table in §6. Unlisted statuses fall through to
    /// `CoreError::Transport`, carrying the status code in the message.
    pub fn from_http_status(status: u16, context: impl Into<String>) -> Self {
        let context = context.into();
        match status {
            401 => Self::Unauthorized(context),
            403 => Self::Forbidden(context),
            404 => Self::NotFound(context),
            410 => Self::CursorExpired(context),
            413 => Self::TooLarge(context),
            other => Self::Transport(format!("http {other}: {context}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_spec_table() {
        assert!(matches!(
            CoreError::from_http_status(401, "x"),
            CoreError::Unauthorized(_)
        ));
        assert!(matches!(
            CoreError::from_http_status(403, "x"),
            CoreError::Forbidden(_)
        ));
        assert!(matches!(
            CoreError::from_http_status(404, "x"),
            CoreError::NotFound(_)
        ));
        assert!(matches!(
            CoreError::from_http_status(410, "x"),
            CoreError::CursorExpired(_)
        ));
        assert!(matches!(
            CoreError::from_http_status(413, "x"),
            CoreError::TooLarge(_)
        ));
        assert!(matches!(
            CoreError::from_http_status(500, "x"),
            CoreError::Transport(_)
        ));
    }

    #[test]
    fn every_variant_has_a_stable_code() {
        let errs: Vec<CoreError> = vec![
            CoreError::NotFound("a".into()),
            CoreError::Unauthorized("a".into()),
            CoreError::Forbidden("a".into()),
            CoreError::TooLarge("a".into()),
            CoreError::CursorExpired("a".into()),
            CoreError::InvalidSchema("a".into()),
            CoreError::SchemaMismatch("a".into()),
            CoreError::NotAcceptable("a".into()),
            CoreError::ProtocolViolation("a".into()),
            CoreError::Transport("a".into()),
        ];
        let codes: std::collections::BTreeSet<&'static str> =
            errs.iter().map(|e| e.code()).collect();
        assert_eq!(codes.len(), errs.len(), "error codes must be unique");
    }
}
