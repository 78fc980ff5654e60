//! The polymorphic message metadata (§3): a tagged sum discriminated by
//! which of the keys `a`/`i` (recipient) or `s`/`n` (self) are present,
//! rather than by an explicit tag field (§9 REDESIGN note on polymorphic
//! metadata envelopes).

use graffiti_types::message::AnnouncementReceipt;
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

/// Metadata attached to the masked copy sent to one private recipient's
/// personal inbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipientMetadata {
    /// The storage bucket key holding the announced object's bytes.
    pub k: ByteBuf,
    /// The prior self-announcement message id this one tombstones, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub t: Option<String>,
    /// This recipient's allowed-list attestation.
    pub a: ByteBuf,
    /// This recipient's index in the object's allowed list.
    pub i: u64,
}

/// Metadata attached to the self-announcement: the unmasked copy kept in the
/// author's own personal inbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelfMetadata {
    /// The storage bucket key holding the announced object's bytes.
    pub k: ByteBuf,
    /// The prior self-announcement message id this one tombstones, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub t: Option<String>,
    /// The allowed-list tickets, present only for private objects (the
    /// author already knows their own recipient list).
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub s: Option<Vec<ByteBuf>>,
    /// Receipts from every dispatch made during this announcement.
    pub n: Vec<AnnouncementReceipt>,
}

/// Metadata attached to masked copies sent to shared (public) inboxes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BaseMetadata {
    /// The storage bucket key holding the announced object's bytes.
    pub k: ByteBuf,
    /// The prior message id this one tombstones, if any.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub t: Option<String>,
}

/// A message's binary-encoded metadata map, decoded by which discriminating
/// keys are present. Variant order matters: `deny_unknown_fields` makes each
/// variant's attempt fail unless the input is shaped exactly like it, so
/// trying the most specific shapes first (recipient, then self, then base)
/// is sufficient to pick the right one unambiguously.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Metadata {
    /// Carries `a`/`i`: a per-recipient delivery.
    Recipient(RecipientMetadata),
    /// Carries `n` (and optionally `s`): the self-announcement.
    SelfAnnouncement(SelfMetadata),
    /// Carries neither: a shared-inbox delivery.
    Base(BaseMetadata),
}

impl Metadata {
    /// The storage bucket key common to every variant.
    pub fn bucket_key(&self) -> &[u8] {
        match self {
            Metadata::Recipient(m) => &m.k,
            Metadata::SelfAnnouncement(m) => &m.k,
            Metadata::Base(m) => &m.k,
        }
    }

    /// The prior tombstoned message id, if this announcement supersedes one.
    pub fn prior_message_id(&self) -> Option<&str> {
        match self {
            Metadata::Recipient(m) => m.t.as_deref(),
            Metadata::SelfAnnouncement(m) => m.t.as_deref(),
            Metadata::Base(m) => m.t.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{from_canonical_bytes, to_canonical_bytes};

    #[test]
    fn recipient_metadata_round_trips_and_is_recognized() {
        let m = Metadata::Recipient(RecipientMetadata {
            k: ByteBuf::from(vec![1, 2, 3]),
            t: None,
            a: ByteBuf::from(vec![9u8; 32]),
            i: 2,
        });
        let bytes = to_canonical_bytes(&m).expect("encode");
        let back: Metadata = from_canonical_bytes(&bytes).expect("decode");
        assert_eq!(m, back);
        assert!(matches!(back, Metadata::Recipient(_)));
    }

    #[test]
    fn self_metadata_round_trips_and_is_recognized() {
        let m = Metadata::SelfAnnouncement(SelfMetadata {
            k: ByteBuf::from(vec![4, 5, 6]),
            t: Some("prior-id".into()),
            s: Some(vec![ByteBuf::from(vec![7u8; 35])]),
            n: vec![AnnouncementReceipt {
                id: "msg-1".into(),
                endpoint: Some("https://inbox.example".into()),
                actor: None,
            }],
        });
        let bytes = to_canonical_bytes(&m).expect("encode");
        let back: Metadata = from_canonical_bytes(&bytes).expect("decode");
        assert_eq!(m, back);
        assert!(matches!(back, Metadata::SelfAnnouncement(_)));
    }

    #[test]
    fn base_metadata_round_trips_and_is_recognized() {
        let m = Metadata::Base(BaseMetadata {
            k: ByteBuf::from(vec![8, 9]),
            t: None,
        });
        let bytes = to_canonical_bytes(&m).expect("encode");
        let back: Metadata = from_canonical_bytes(&bytes).expect("decode");
        assert_eq!(m, back);
        assert!(matches!(back, Metadata::Base(_)));
    }

    #[test]
    fn bucket_key_and_prior_message_id_are_accessible_uniformly() {
        let m = Metadata::Base(BaseMetadata {
            k: ByteBuf::from(vec![1]),
            t: Some("tombstoned".into()),
        });
        assert_eq!(m.bucket_key(), &[1]);
        assert_eq!(m.prior_message_id(), Some("tombstoned"));
    }
}
