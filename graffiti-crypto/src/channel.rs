//! Channel attestations: per-channel Ed25519 keypairs derived from the
//! channel's secret string (§4.C).
//!
//! A channel is a secret capability string; anyone who knows it can derive
//! the same keypair and therefore sign (write) or verify (read) on its
//! behalf, without the channel string itself ever appearing on the wire.

use crate::error::CryptoError;
use dcrypt::algorithms::hash::sha2::Sha256 as DcryptSha256;
use dcrypt::algorithms::hash::HashFunction as DcryptHashFunction;
use dcrypt::algorithms::ByteSerializable;
#[allow(unused_imports)]
use dcrypt::api::Signature as DcryptSignatureTrait;
use dcrypt::sign::eddsa;
use zeroize::Zeroize;

const PUBLIC_ID_PREFIX: u8 = 0x00;
/// Length in bytes of a channel public id: one prefix byte + a 32-byte
/// Ed25519 public key.
pub const CHANNEL_PUBLIC_ID_LEN: usize = 33;

/// A channel's publishable identity: `0x00 || ed25519_pub(sha256(channel))`.
/// Does not reveal the channel string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelPublicId(pub [u8; CHANNEL_PUBLIC_ID_LEN]);

/// An Ed25519 signature of `UTF-8(actor)` under a channel's derived key,
/// proving the signer knows the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelAttestation(pub Vec<u8>);

fn derive_seed(channel: &str) -> Result<[u8; 32], CryptoError> {
    let digest = DcryptSha256::digest(channel.as_bytes()).map_err(dcrypt::Error::from)?;
    let bytes = digest.to_bytes();
    bytes
        .try_into()
        .map_err(|v: Vec<u8>| CryptoError::InvalidHashLength {
            expected: 32,
            got: v.len(),
        })
}

fn derive_secret_key(channel: &str) -> Result<eddsa::Ed25519SecretKey, CryptoError> {
    let mut seed = derive_seed(channel)?;
    let key = eddsa::Ed25519SecretKey::from_seed(&seed)
        .map_err(|e| CryptoError::OperationFailed(format!("{e:?}")));
    seed.zeroize();
    key
}

/// Derives the channel's Ed25519 keypair and returns its publishable id.
/// Idempotent: the same channel string always yields the same public id.
pub fn register(channel: &str) -> Result<ChannelPublicId, CryptoError> {
    let sk = derive_secret_key(channel)?;
    let pk = sk
        .public_key()
        .map_err(|e| CryptoError::OperationFailed(format!("{e:?}")))?;
    let pk_bytes = pk.to_bytes();
    if pk_bytes.len() != 32 {
        return Err(CryptoError::InvalidKey(
            "derived channel public key was not 32 bytes".into(),
        ));
    }
    let mut out = [0u8; CHANNEL_PUBLIC_ID_LEN];
    out[0] = PUBLIC_ID_PREFIX;
    out[1..].copy_from_slice(&pk_bytes);
    Ok(ChannelPublicId(out))
}

/// Signs `UTF-8(actor)` under `channel`'s derived key, returning the
/// attestation and the channel's public id.
pub fn attest(
    actor: &str,
    channel: &str,
) -> Result<(ChannelAttestation, ChannelPublicId), CryptoError> {
    let sk = derive_secret_key(channel)?;
    let signature = eddsa::Ed25519::sign(actor.as_bytes(), &sk).map_err(dcrypt::Error::from)?;
    let public_id = register(channel)?;
    Ok((ChannelAttestation(signature.to_bytes()), public_id))
}

/// Verifies that `attestation` is a valid signature of `UTF-8(actor)` under
/// the channel whose public id is `public_id`.
///
/// Requires the public id's leading byte to be `0x00`; any other value (or
/// wrong length) fails closed rather than attempting verification.
pub fn validate(
    attestation: &ChannelAttestation,
    actor: &str,
    public_id: &ChannelPublicId,
) -> bool {
    validate_checked(attestation, actor, public_id).unwrap_or(false)
}

fn validate_checked(
    attestation: &ChannelAttestation,
    actor: &str,
    public_id: &ChannelPublicId,
) -> Result<bool, CryptoError> {
    if public_id.0[0] != PUBLIC_ID_PREFIX {
        return Err(CryptoError::InvalidKey(
            "channel public id missing 0x00 prefix".into(),
        ));
    }
    let pk = eddsa::Ed25519PublicKey::from_bytes(&public_id.0[1..])
        .map_err(|e| CryptoError::InvalidKey(format!("{e:?}")))?;
    let sig = eddsa::Ed25519Signature::from_bytes(&attestation.0)
        .map_err(|e| CryptoError::InvalidKey(format!("{e:?}")))?;
    match eddsa::Ed25519::verify(actor.as_bytes(), &sig, &pk) {
        Ok(()) => Ok(true),
        Err(_) => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attestation_validates_for_matching_actor_and_channel() {
        let (att, public_id) = attest("did:web:a.test", "my-secret-channel").expect("attest");
        assert!(validate(&att, "did:web:a.test", &public_id));
    }

    #[test]
    fn attestation_fails_for_wrong_actor() {
        let (att, public_id) = attest("did:web:a.test", "my-secret-channel").expect("attest");
        assert!(!validate(&att, "did:web:mallory.test", &public_id));
    }

    #[test]
    fn attestation_fails_for_wrong_public_id() {
        let (att, _) = attest("did:web:a.test", "my-secret-channel").expect("attest");
        let other_id = register("a-different-channel").expect("register");
        assert!(!validate(&att, "did:web:a.test", &other_id));
    }

    #[test]
    fn register_is_idempotent() {
        let a = register("channel-x").expect("register");
        let b = register("channel-x").expect("register");
        assert_eq!(a, b);
    }

    #[test]
    fn register_differs_across_channels() {
        let a = register("channel-x").expect("register");
        let b = register("channel-y").expect("register");
        assert_ne!(a, b);
    }

    #[test]
    fn public_id_has_zero_prefix_byte() {
        let id = register("channel-z").expect("register");
        assert_eq!(id.0[0], 0x00);
        assert_eq!(id.0.len(), CHANNEL_PUBLIC_ID_LEN);
    }
}
