//! Self-describing byte codec (§4.A).
//!
//! Arbitrary bytes are encoded as a single-character method prefix followed
//! by the encoded body. Only the `u` (URL-safe base64, no padding) method is
//! implemented; the prefix makes the scheme extensible to other methods
//! without a breaking change to callers that only ever decode.

use crate::error::CryptoError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

const METHOD_BASE64URL: char = 'u';

/// Encodes bytes as `u` + URL-safe base64 without padding.
pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 1);
    out.push(METHOD_BASE64URL);
    out.push_str(&URL_SAFE_NO_PAD.encode(bytes));
    out
}

/// Decodes a string produced by [`encode`]. Fails if the leading method
/// character is absent or unrecognized, or if the body is not valid
/// base64url.
pub fn decode(s: &str) -> Result<Vec<u8>, CryptoError> {
    let mut chars = s.chars();
    match chars.next() {
        Some(METHOD_BASE64URL) => URL_SAFE_NO_PAD
            .decode(chars.as_str())
            .map_err(|e| CryptoError::MalformedEncoding(e.to_string())),
        Some(other) => Err(CryptoError::MalformedEncoding(format!(
            "unrecognized codec method prefix: {other:?}"
        ))),
        None => Err(CryptoError::MalformedEncoding("empty string".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_bytes() {
        let cases: &[&[u8]] = &[b"", b"hello", &[0u8, 255, 128, 1, 2, 3]];
        for case in cases {
            let encoded = encode(case);
            assert!(encoded.starts_with('u'));
            let decoded = decode(&encoded).expect("decode");
            assert_eq!(&decoded, case);
        }
    }

    #[test]
    fn rejects_missing_prefix() {
        let err = decode("aGVsbG8").unwrap_err();
        assert!(matches!(err, CryptoError::MalformedEncoding(_)));
    }

    #[test]
    fn rejects_invalid_base64_body() {
        let err = decode("u!!!not-base64!!!").unwrap_err();
        assert!(matches!(err, CryptoError::MalformedEncoding(_)));
    }

    #[test]
    fn rejects_empty_string() {
        assert!(decode("").is_err());
    }
}
