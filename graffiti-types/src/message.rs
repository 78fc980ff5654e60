//! Messages: the wire envelope carrying a tagged object between an
//! announcer and an inbox (§3).

use crate::actor::ActorId;
use crate::object::Object;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An opaque tag a message is filed under. Tags are channel public ids or a
/// single `UTF-8(object_url)` tag for per-URL lookup; they never reveal a
/// channel's secret string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag(pub Vec<u8>);

impl Tag {
    /// Builds the tag used for per-URL lookup: `UTF-8(object_url)`.
    pub fn for_url(url: &str) -> Self {
        Tag(url.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for Tag {
    fn from(bytes: Vec<u8>) -> Self {
        Tag(bytes)
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        struct BytesVisitor;
        impl<'de> serde::de::Visitor<'de> for BytesVisitor {
            type Value = Vec<u8>;
            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "a byte string")
            }
            fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                Ok(v.to_vec())
            }
            fn visit_byte_buf<E: serde::de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
                Ok(v)
            }
        }
        Ok(Tag(d.deserialize_bytes(BytesVisitor)?))
    }
}

pub(crate) mod serde_bytes_vec {
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        struct BytesVisitor;
        impl<'de> serde::de::Visitor<'de> for BytesVisitor {
            type Value = Vec<u8>;
            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "a byte string")
            }
            fn visit_bytes<E: serde::de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
                Ok(v.to_vec())
            }
            fn visit_byte_buf<E: serde::de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
                Ok(v)
            }
        }
        d.deserialize_bytes(BytesVisitor)
    }
}

/// A record of one announcement dispatch, kept so a later tombstone can
/// reference the prior message id for garbage collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncementReceipt {
    /// The id the destination inbox assigned to the announcement.
    pub id: String,
    /// The inbox endpoint, present for shared-inbox receipts.
    #[serde(rename = "e", skip_serializing_if = "Option::is_none", default)]
    pub endpoint: Option<String>,
    /// The recipient actor, present for personal-inbox receipts.
    #[serde(rename = "a", skip_serializing_if = "Option::is_none", default)]
    pub actor: Option<ActorId>,
}

/// The wire message: tags, the (possibly masked) object, and opaque,
/// binary-encoded metadata. Metadata's shape is defined and (de)serialized
/// by `graffiti-protocol`; this crate only carries it as bytes, matching the
/// wire contract in §3/§6.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Tags this message is filed under.
    pub t: Vec<Tag>,
    /// The (possibly masked) object.
    pub o: Object,
    /// Binary-encoded metadata map.
    #[serde(with = "serde_bytes_vec")]
    pub m: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_for_url_is_utf8_of_the_url() {
        let tag = Tag::for_url("graffiti:a:b");
        assert_eq!(tag.0, b"graffiti:a:b".to_vec());
    }
}
