//! Allowed attestations: per-recipient tickets proving inclusion in a
//! private object's allowed list, without revealing the other recipients
//! (§4.D).

use crate::error::CryptoError;
use dcrypt::algorithms::hash::sha2::Sha256 as DcryptSha256;
use dcrypt::algorithms::mac::Hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use subtle::ConstantTimeEq;

const TICKET_PREFIX: [u8; 3] = [0x00, 0x12, 0x20];
/// Length in bytes of an allowed ticket: 3 prefix bytes + 32 random bytes.
pub const TICKET_LEN: usize = 35;

/// A single-recipient capability: proof the holder is eligible to read a
/// private object, without revealing any other recipient's ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedTicket(pub [u8; TICKET_LEN]);

/// An HMAC-SHA-256 binding a ticket to the one recipient actor it was
/// issued to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedAttestation(pub Vec<u8>);

impl AllowedTicket {
    /// The 32 random bytes making up this ticket's body (used as the HMAC
    /// key).
    pub fn body(&self) -> &[u8] {
        &self.0[3..]
    }
}

/// Mints a fresh ticket for `actor` and the HMAC attestation binding them.
pub fn attest(actor: &str) -> Result<(AllowedAttestation, AllowedTicket), CryptoError> {
    let mut random = [0u8; 32];
    OsRng.fill_bytes(&mut random);
    let mut ticket_bytes = [0u8; TICKET_LEN];
    ticket_bytes[..3].copy_from_slice(&TICKET_PREFIX);
    ticket_bytes[3..].copy_from_slice(&random);
    let ticket = AllowedTicket(ticket_bytes);

    let mac = Hmac::<DcryptSha256>::mac(ticket.body(), actor.as_bytes())
        .map_err(dcrypt::Error::from)?;
    Ok((AllowedAttestation(mac.to_vec()), ticket))
}

/// Verifies that `attestation` binds `ticket` to `actor`, using a
/// constant-time comparison of the recomputed MAC.
pub fn validate(attestation: &AllowedAttestation, actor: &str, ticket: &AllowedTicket) -> bool {
    validate_checked(attestation, actor, ticket).unwrap_or(false)
}

fn validate_checked(
    attestation: &AllowedAttestation,
    actor: &str,
    ticket: &AllowedTicket,
) -> Result<bool, CryptoError> {
    if ticket.0[..3] != TICKET_PREFIX {
        return Err(CryptoError::InvalidKey(
            "allowed ticket missing expected multihash-style prefix".into(),
        ));
    }
    let expected =
        Hmac::<DcryptSha256>::mac(ticket.body(), actor.as_bytes()).map_err(dcrypt::Error::from)?;
    let expected_bytes: &[u8] = &expected;
    if expected_bytes.len() != attestation.0.len() {
        return Ok(false);
    }
    Ok(bool::from(expected_bytes.ct_eq(&attestation.0[..])))
}
