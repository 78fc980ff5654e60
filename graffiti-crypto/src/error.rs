//! Local error type for `graffiti-crypto`.

use graffiti_types::error::{CoreError, ErrorCode};
use thiserror::Error;

/// Errors produced by content addressing and attestation primitives.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// A signature or MAC failed cryptographic verification.
    #[error("signature verification failed")]
    VerificationFailed,
    /// Key, ticket, or address material was malformed.
    #[error("invalid key material: {0}")]
    InvalidKey(String),
    /// A hash digest or address had an unexpected length.
    #[error("invalid hash length: expected {expected}, got {got}")]
    InvalidHashLength {
        /// The expected length in bytes.
        expected: usize,
        /// The actual length in bytes.
        got: usize,
    },
    /// A content address did not carry a recognized multihash prefix.
    #[error("unsupported hash method: {0:#x} {1:#x}")]
    UnsupportedMethod(u8, u8),
    /// A string-encoded value was missing its method prefix or was not
    /// valid base64url.
    #[error("malformed encoded string: {0}")]
    MalformedEncoding(String),
    /// A generic failure from the underlying cryptographic library.
    #[error("cryptographic operation failed: {0}")]
    OperationFailed(String),
}

impl ErrorCode for CryptoError {
    fn code(&self) -> &'static str {
        match self {
            Self::VerificationFailed => "CRYPTO_VERIFICATION_FAILED",
            Self::InvalidKey(_) => "CRYPTO_INVALID_KEY",
            Self::InvalidHashLength { .. } => "CRYPTO_INVALID_HASH_LENGTH",
            Self::UnsupportedMethod(_, _) => "CRYPTO_UNSUPPORTED_METHOD",
            Self::MalformedEncoding(_) => "CRYPTO_MALFORMED_ENCODING",
            Self::OperationFailed(_) => "CRYPTO_OPERATION_FAILED",
        }
    }
}

impl From<dcrypt::Error> for CryptoError {
    fn from(e: dcrypt::Error) -> Self {
        CryptoError::OperationFailed(e.to_string())
    }
}

impl From<CryptoError> for CoreError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::VerificationFailed => {
                CoreError::ProtocolViolation("signature verification failed".into())
            }
            CryptoError::UnsupportedMethod(a, b) => CoreError::ProtocolViolation(format!(
                "unsupported content address method: {a:#x} {b:#x}"
            )),
            other => CoreError::ProtocolViolation(other.to_string()),
        }
    }
}
