//! `encode`/`validate`: the pipeline binding a post's bytes to its URL,
//! channel attestations, and allowed-list tickets (§4.E).

use crate::envelope::{to_canonical_bytes, Envelope};
use crate::error::ProtocolError;
use crate::url::{decode_url, encode_url};
use graffiti_crypto::address::sha256_address;
use graffiti_crypto::allowed::{self, AllowedAttestation, AllowedTicket};
use graffiti_crypto::channel::{self, ChannelAttestation, ChannelPublicId};
use graffiti_types::actor::ActorId;
use graffiti_types::config::MAX_FANOUT;
use graffiti_types::message::Tag;
use graffiti_types::object::{Object, PartialObject};
use rand::rngs::OsRng;
use rand::RngCore;
use serde_bytes::ByteBuf;

/// Everything `encode` produces for a freshly authored post.
#[derive(Debug, Clone)]
pub struct EncodedObject {
    /// The public-facing object (unmasked).
    pub object: Object,
    /// Tags the announcement engine files this object's messages under.
    pub tags: Vec<Tag>,
    /// The canonical envelope bytes, already bucket-ready.
    pub object_bytes: Vec<u8>,
    /// One ticket per recipient, present only for private objects.
    pub allowed_tickets: Option<Vec<AllowedTicket>>,
}

/// Encodes `partial` authored by `actor` into a content-addressed object,
/// its filing tags, and the envelope bytes to store in a bucket.
pub fn encode(partial: &PartialObject, actor: &str) -> Result<EncodedObject, ProtocolError> {
    let fanout = partial.channels.len() + partial.allowed.as_ref().map_or(0, |a| a.len());
    if fanout > MAX_FANOUT {
        return Err(ProtocolError::FanoutTooLarge(fanout));
    }

    let mut tags = Vec::with_capacity(partial.channels.len());
    let mut attestations = Vec::with_capacity(partial.channels.len());
    for channel in &partial.channels {
        let (attestation, public_id) = channel::attest(actor, channel)?;
        tags.push(Tag(public_id.0.to_vec()));
        attestations.push(ByteBuf::from(attestation.0));
    }

    let mut allowed_attestations = None;
    let mut allowed_tickets = None;
    if let Some(recipients) = &partial.allowed {
        let mut atts = Vec::with_capacity(recipients.len());
        let mut tickets = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let (attestation, ticket) = allowed::attest(recipient)?;
            atts.push(ByteBuf::from(attestation.0));
            tickets.push(ticket);
        }
        allowed_attestations = Some(atts);
        allowed_tickets = Some(tickets);
    }

    let mut nonce = [0u8; 32];
    OsRng.fill_bytes(&mut nonce);

    let envelope = Envelope {
        v: partial.value.clone(),
        c: attestations,
        a: allowed_attestations,
        n: ByteBuf::from(nonce.to_vec()),
    };
    let object_bytes = envelope.to_bytes_checked()?;

    let address = sha256_address(&object_bytes)?;
    let url = encode_url(actor, &address);

    let object = Object {
        url,
        actor: actor.to_string(),
        value: partial.value.clone(),
        channels: partial.channels.clone(),
        allowed: partial.allowed.clone(),
    };

    Ok(EncodedObject {
        object,
        tags,
        object_bytes,
        allowed_tickets,
    })
}

/// The private-object context a validator must supply to check allowed-list
/// attestations; omit for public objects (§4.E).
pub enum PrivateValidation<'a> {
    /// The author validating their own self-announcement: they already know
    /// the full recipient list and hold every ticket.
    SelfCase {
        /// The object's recipients, in the same order as `allowed_tickets`.
        recipients: &'a [ActorId],
        /// The tickets minted for each recipient during `encode`.
        allowed_tickets: &'a [AllowedTicket],
    },
    /// A single recipient validating the copy addressed to them.
    RecipientCase {
        /// The validating recipient's actor id.
        recipient: &'a str,
        /// The ticket this recipient was handed out-of-band.
        allowed_ticket: &'a AllowedTicket,
        /// This recipient's index into the envelope's `a` list.
        allowed_index: usize,
    },
}

/// Validates `object_bytes` against `url`, the caller's `expected_value`,
/// the tags the message was actually filed under, and (for private objects)
/// the caller's allowed-list context.
pub fn validate(
    url: &str,
    expected_value: &serde_json::Value,
    received_tags: &[Tag],
    object_bytes: &[u8],
    private_info: Option<&PrivateValidation<'_>>,
) -> Result<(), ProtocolError> {
    let (actor, address) = decode_url(url)?;

    let recomputed = sha256_address(object_bytes)?;
    if recomputed != address {
        return Err(ProtocolError::AddressMismatch);
    }

    let envelope = Envelope::from_bytes_checked(object_bytes)?;

    let expected_bytes = to_canonical_bytes(expected_value)?;
    let got_bytes = to_canonical_bytes(&envelope.v)?;
    if expected_bytes != got_bytes {
        return Err(ProtocolError::ValueMismatch);
    }

    for (i, tag) in received_tags.iter().enumerate() {
        let public_id: [u8; 33] = tag
            .0
            .as_slice()
            .try_into()
            .map_err(|_| ProtocolError::AttestationMismatch(i))?;
        let attestation_bytes = envelope
            .c
            .get(i)
            .ok_or(ProtocolError::AttestationMismatch(i))?;
        let ok = channel::validate(
            &ChannelAttestation(attestation_bytes.to_vec()),
            &actor,
            &ChannelPublicId(public_id),
        );
        if !ok {
            return Err(ProtocolError::AttestationMismatch(i));
        }
    }

    match private_info {
        None => {
            if envelope.a.is_some() {
                return Err(ProtocolError::AllowedInvariantViolation);
            }
        }
        Some(PrivateValidation::SelfCase {
            recipients,
            allowed_tickets,
        }) => {
            let atts = envelope
                .a
                .as_ref()
                .ok_or(ProtocolError::AllowedInvariantViolation)?;
            if atts.len() != allowed_tickets.len() || atts.len() != recipients.len() {
                return Err(ProtocolError::AllowedAttestationInvalid);
            }
            for ((att, ticket), recipient) in atts
                .iter()
                .zip(allowed_tickets.iter())
                .zip(recipients.iter())
            {
                let ok = allowed::validate(
                    &AllowedAttestation(att.to_vec()),
                    recipient,
                    ticket,
                );
                if !ok {
                    return Err(ProtocolError::AllowedAttestationInvalid);
                }
            }
        }
        Some(PrivateValidation::RecipientCase {
            recipient,
            allowed_ticket,
            allowed_index,
        }) => {
            let atts = envelope
                .a
                .as_ref()
                .ok_or(ProtocolError::AllowedInvariantViolation)?;
            let att = atts
                .get(*allowed_index)
                .ok_or(ProtocolError::AllowedAttestationInvalid)?;
            let ok = allowed::validate(
                &AllowedAttestation(att.to_vec()),
                recipient,
                allowed_ticket,
            );
            if !ok {
                return Err(ProtocolError::AllowedAttestationInvalid);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encode_then_validate_round_trips_a_public_object() {
        let partial = PartialObject {
            value: json!({"m": "hi"}),
            channels: vec!["c1".into()],
            allowed: None,
        };
        let encoded = encode(&partial, "did:web:a.test").expect("encode");
        assert_eq!(encoded.object.actor, "did:web:a.test");
        assert!(!encoded.object.is_private());

        validate(
            &encoded.object.url,
            &partial.value,
            &encoded.tags,
            &encoded.object_bytes,
            None,
        )
        .expect("validate");
    }

    #[test]
    fn encode_then_validate_round_trips_a_private_object() {
        let partial = PartialObject {
            value: json!({"m": "secret"}),
            channels: vec![],
            allowed: Some(vec!["did:web:b.test".into()]),
        };
        let encoded = encode(&partial, "did:web:a.test").expect("encode");
        let tickets = encoded.allowed_tickets.clone().expect("tickets");

        validate(
            &encoded.object.url,
            &partial.value,
            &[],
            &encoded.object_bytes,
            Some(&PrivateValidation::SelfCase {
                recipients: &["did:web:b.test".to_string()],
                allowed_tickets: &tickets,
            }),
        )
        .expect("self validate");

        validate(
            &encoded.object.url,
            &partial.value,
            &[],
            &encoded.object_bytes,
            Some(&PrivateValidation::RecipientCase {
                recipient: "did:web:b.test",
                allowed_ticket: &tickets[0],
                allowed_index: 0,
            }),
        )
        .expect("recipient validate");
    }

    #[test]
    fn validate_rejects_tampered_value() {
        let partial = PartialObject {
            value: json!({"m": "hi"}),
            channels: vec![],
            allowed: None,
        };
        let encoded = encode(&partial, "did:web:a.test").expect("encode");
        let wrong_value = json!({"m": "tampered"});
        let err = validate(
            &encoded.object.url,
            &wrong_value,
            &[],
            &encoded.object_bytes,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ProtocolError::ValueMismatch));
    }

    #[test]
    fn validate_rejects_address_mismatch() {
        let partial = PartialObject {
            value: json!({"m": "hi"}),
            channels: vec![],
            allowed: None,
        };
        let encoded = encode(&partial, "did:web:a.test").expect("encode");
        let other = encode(
            &PartialObject {
                value: json!({"m": "other"}),
                channels: vec![],
                allowed: None,
            },
            "did:web:a.test",
        )
        .expect("encode");
        let err = validate(
            &encoded.object.url,
            &partial.value,
            &[],
            &other.object_bytes,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ProtocolError::AddressMismatch));
    }

    #[test]
    fn validate_rejects_public_envelope_crossing_into_private() {
        let partial = PartialObject {
            value: json!({"m": "hi"}),
            channels: vec![],
            allowed: Some(vec!["did:web:b.test".into()]),
        };
        let encoded = encode(&partial, "did:web:a.test").expect("encode");
        let err = validate(
            &encoded.object.url,
            &partial.value,
            &[],
            &encoded.object_bytes,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ProtocolError::AllowedInvariantViolation));
    }

    #[test]
    fn encode_rejects_fanout_beyond_the_cap() {
        let channels: Vec<String> = (0..MAX_FANOUT + 1).map(|i| format!("c{i}")).collect();
        let partial = PartialObject {
            value: json!({}),
            channels,
            allowed: None,
        };
        let err = encode(&partial, "did:web:a.test").unwrap_err();
        assert!(matches!(err, ProtocolError::FanoutTooLarge(_)));
    }

    #[test]
    fn encode_rejects_an_oversized_value() {
        let partial = PartialObject {
            value: json!({"blob": "x".repeat(64 * 1024)}),
            channels: vec![],
            allowed: None,
        };
        let err = encode(&partial, "did:web:a.test").unwrap_err();
        assert!(matches!(err, ProtocolError::TooLarge));
    }
}
