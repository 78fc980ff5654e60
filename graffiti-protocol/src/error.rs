//! Local error type for `graffiti-protocol`.

use graffiti_types::error::{CoreError, ErrorCode};
use thiserror::Error;

/// Errors produced by object encoding and validation.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The encoded envelope exceeded the 32 KiB size gate (§3 invariant 6).
    #[error("envelope exceeds the maximum allowed size")]
    TooLarge,
    /// A CBOR encode or decode operation failed.
    #[error("canonical codec error: {0}")]
    Codec(String),
    /// An object URL did not match the `graffiti:` grammar.
    #[error("malformed object url: {0}")]
    MalformedUrl(String),
    /// The content address recomputed over the supplied bytes did not match
    /// the address carried in the object URL (§3 invariant 1).
    #[error("content address does not match object bytes")]
    AddressMismatch,
    /// The decoded envelope's `v` field did not match the caller's expected
    /// value byte-for-byte.
    #[error("decoded value does not match expected value")]
    ValueMismatch,
    /// A tag had no corresponding channel attestation at the same index, or
    /// the attestation at that index failed to verify (§3 invariant 2).
    #[error("tag/attestation mismatch at index {0}")]
    AttestationMismatch(usize),
    /// A public envelope carried allowed attestations, or a private one was
    /// missing them (§3 invariant 4).
    #[error("envelope crosses the public/private attestation invariant")]
    AllowedInvariantViolation,
    /// An allowed-list attestation failed to validate against the supplied
    /// ticket (§3 invariant 3).
    #[error("allowed attestation failed to validate")]
    AllowedAttestationInvalid,
    /// Combined channels + recipients exceeded the configured fan-out cap.
    #[error("fan-out of {0} exceeds the configured maximum")]
    FanoutTooLarge(usize),
    /// A lower-level cryptographic primitive failed.
    #[error(transparent)]
    Crypto(#[from] graffiti_crypto::CryptoError),
}

impl ErrorCode for ProtocolError {
    fn code(&self) -> &'static str {
        match self {
            Self::TooLarge => "PROTOCOL_TOO_LARGE",
            Self::Codec(_) => "PROTOCOL_CODEC_ERROR",
            Self::MalformedUrl(_) => "PROTOCOL_MALFORMED_URL",
            Self::AddressMismatch => "PROTOCOL_ADDRESS_MISMATCH",
            Self::ValueMismatch => "PROTOCOL_VALUE_MISMATCH",
            Self::AttestationMismatch(_) => "PROTOCOL_ATTESTATION_MISMATCH",
            Self::AllowedInvariantViolation => "PROTOCOL_ALLOWED_INVARIANT_VIOLATION",
            Self::AllowedAttestationInvalid => "PROTOCOL_ALLOWED_ATTESTATION_INVALID",
            Self::FanoutTooLarge(_) => "PROTOCOL_FANOUT_TOO_LARGE",
            Self::Crypto(_) => "PROTOCOL_CRYPTO_ERROR",
        }
    }
}

impl From<ProtocolError> for CoreError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::TooLarge | ProtocolError::FanoutTooLarge(_) => {
                CoreError::TooLarge(e.to_string())
            }
            ProtocolError::MalformedUrl(_) | ProtocolError::AddressMismatch => {
                CoreError::NotFound(e.to_string())
            }
            ProtocolError::ValueMismatch => CoreError::SchemaMismatch(e.to_string()),
            ProtocolError::AttestationMismatch(_)
            | ProtocolError::AllowedInvariantViolation
            | ProtocolError::AllowedAttestationInvalid
            | ProtocolError::Codec(_) => CoreError::ProtocolViolation(e.to_string()),
            ProtocolError::Crypto(c) => c.into(),
        }
    }
}
