//! Content addresses: multihash-prefixed SHA-256 of arbitrary bytes (§4.B).

use crate::error::CryptoError;
use dcrypt::algorithms::hash::sha2::Sha256 as DcryptSha256;
use dcrypt::algorithms::hash::HashFunction as DcryptHashFunction;
use dcrypt::algorithms::ByteSerializable;

/// The multihash code for SHA-256, as a single-byte varint.
const MULTIHASH_CODE_SHA256: u8 = 0x12;
/// The multihash length field for a 32-byte digest, as a single-byte
/// varint.
const MULTIHASH_LEN_32: u8 = 0x20;

/// The total length, in bytes, of a content address (2-byte multihash
/// prefix + 32-byte SHA-256 digest).
pub const ADDRESS_LEN: usize = 34;

/// A multihash-prefixed content hash: `0x12 0x20 || SHA256(bytes)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(pub [u8; ADDRESS_LEN]);

/// The hash method a content address was registered under. Only SHA-256 is
/// supported; the type exists so `method_of` has something meaningful to
/// return and so the scheme can grow new methods without breaking callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// SHA-256, multihash code `0x12`.
    Sha2_256,
}

impl Address {
    /// Borrows the address as raw bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Parses a content address from exactly [`ADDRESS_LEN`] bytes,
    /// validating its multihash prefix.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != ADDRESS_LEN {
            return Err(CryptoError::InvalidHashLength {
                expected: ADDRESS_LEN,
                got: bytes.len(),
            });
        }
        let mut buf = [0u8; ADDRESS_LEN];
        buf.copy_from_slice(bytes);
        let addr = Address(buf);
        // Validates the prefix eagerly so malformed addresses fail fast.
        method_of(&addr)?;
        Ok(addr)
    }

    /// Returns the 32-byte SHA-256 digest portion of the address.
    pub fn digest(&self) -> &[u8] {
        &self.0[2..]
    }
}

/// Registers `bytes` under `method`, returning its content address.
///
/// Only `"sha2-256"` is supported. Addresses are idempotent (hashing the
/// same bytes twice yields the same address) and effectively unique
/// (different bytes yield different addresses, modulo SHA-256 collision
/// resistance).
pub fn register(method: &str, bytes: &[u8]) -> Result<Address, CryptoError> {
    match method {
        "sha2-256" => Ok(sha256_address(bytes)?),
        other => Err(CryptoError::InvalidKey(format!(
            "unsupported content address method: {other}"
        ))),
    }
}

/// Computes the raw 32-byte SHA-256 digest of `bytes`, without a multihash
/// prefix. Used both by [`sha256_address`] and by callers that need a plain
/// content digest (e.g. cache keys).
pub fn sha256_digest(bytes: &[u8]) -> Result<[u8; 32], CryptoError> {
    let digest = DcryptSha256::digest(bytes).map_err(dcrypt::Error::from)?;
    let digest_bytes = digest.to_bytes();
    digest_bytes
        .try_into()
        .map_err(|v: Vec<u8>| CryptoError::InvalidHashLength {
            expected: 32,
            got: v.len(),
        })
}

/// Computes the SHA-256 content address of `bytes` directly.
pub fn sha256_address(bytes: &[u8]) -> Result<Address, CryptoError> {
    let digest_bytes = sha256_digest(bytes)?;
    let mut out = [0u8; ADDRESS_LEN];
    out[0] = MULTIHASH_CODE_SHA256;
    out[1] = MULTIHASH_LEN_32;
    out[2..].copy_from_slice(&digest_bytes);
    Ok(Address(out))
}

/// Recovers the hash method a content address was registered under,
/// validating the two-byte multihash prefix and overall length.
pub fn method_of(address: &Address) -> Result<Method, CryptoError> {
    if address.0.len() != ADDRESS_LEN {
        return Err(CryptoError::InvalidHashLength {
            expected: ADDRESS_LEN,
            got: address.0.len(),
        });
    }
    match (address.0[0], address.0[1]) {
        (MULTIHASH_CODE_SHA256, MULTIHASH_LEN_32) => Ok(Method::Sha2_256),
        (code, len) => Err(CryptoError::UnsupportedMethod(code, len)),
    }
}
