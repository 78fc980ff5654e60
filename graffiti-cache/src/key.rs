//! The per-query cache key (§4.F): `SHA-256(binary-encoded {url, type, body?})`.
//!
//! Single-writer-per-query-key (§5) is enforced in [`crate::lock`] keyed by
//! this same value, so two callers issuing an identical query always
//! contend on the same lock and read the same cache entry.

use crate::error::CacheError;
use graffiti_crypto::address::sha256_digest;
use std::fmt;

/// A stable identifier for one `(endpoint, query shape)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey(pub [u8; 32]);

impl CacheKey {
    /// Derives the cache key for a query or export request.
    ///
    /// The inputs are concatenated with explicit length prefixes rather than
    /// joined with a separator, so no value's content can shift a field
    /// boundary.
    pub fn for_request(
        url: &str,
        request_type: &str,
        body: Option<&[u8]>,
    ) -> Result<Self, CacheError> {
        let mut buf = Vec::new();
        write_framed(&mut buf, url.as_bytes());
        write_framed(&mut buf, request_type.as_bytes());
        write_framed(&mut buf, body.unwrap_or(&[]));
        let digest = sha256_digest(&buf).map_err(|e| CacheError::Encoding(e.to_string()))?;
        Ok(CacheKey(digest))
    }

    /// Renders the key as a lowercase hex string, suitable as a map key or
    /// table row id.
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    /// Parses a key previously rendered by [`to_hex`](Self::to_hex), e.g. the
    /// `cacheKey` field of a serialized [`graffiti_types::cursor::InboxCursor`].
    pub fn from_hex(s: &str) -> Result<Self, CacheError> {
        let bytes = hex::decode(s).map_err(|e| CacheError::Encoding(e.to_string()))?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| CacheError::Encoding(format!("expected 32 bytes, got {}", v.len())))?;
        Ok(CacheKey(array))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

fn write_framed(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u64).to_be_bytes());
    buf.extend_from_slice(bytes);
}
