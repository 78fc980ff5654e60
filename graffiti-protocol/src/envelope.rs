//! The canonical binary envelope (§3, §4.E) and the CBOR codec wrapper used
//! to (de)serialize it and the message metadata deterministically.

use crate::error::ProtocolError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

/// Encodes `value` to canonical CBOR bytes.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf).map_err(|e| ProtocolError::Codec(e.to_string()))?;
    Ok(buf)
}

/// Decodes canonical CBOR bytes back into `T`.
pub fn from_canonical_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::Codec(e.to_string()))
}

/// The binary-encoded map hashed to produce an object's content address:
/// `{v, c, a?, n}` (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// The post's arbitrary JSON-like value.
    pub v: serde_json::Value,
    /// One channel attestation per channel, in tag order.
    pub c: Vec<ByteBuf>,
    /// One allowed-list attestation per recipient, present only for private
    /// objects.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub a: Option<Vec<ByteBuf>>,
    /// 32 fresh random bytes, giving unique content addresses even for
    /// structurally identical posts (§3 invariant 7).
    pub n: ByteBuf,
}

impl Envelope {
    /// Encodes this envelope to canonical bytes, rejecting anything over the
    /// 32 KiB size gate (§3 invariant 6).
    pub fn to_bytes_checked(&self) -> Result<Vec<u8>, ProtocolError> {
        let bytes = to_canonical_bytes(self)?;
        if bytes.len() > graffiti_types::config::MAX_ENVELOPE_BYTES {
            return Err(ProtocolError::TooLarge);
        }
        Ok(bytes)
    }

    /// Decodes an envelope from bytes, rejecting anything over the 32 KiB
    /// size gate before even attempting to parse it.
    pub fn from_bytes_checked(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() > graffiti_types::config::MAX_ENVELOPE_BYTES {
            return Err(ProtocolError::TooLarge);
        }
        from_canonical_bytes(bytes)
    }
}
