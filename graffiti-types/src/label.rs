//! Server-assigned labels on inbox messages (§3).

use crate::message::Message;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The label a server has attached to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Label {
    /// Not yet validated by either the server or a reader.
    Unlabeled = 0,
    /// Verified valid, either by a reader's own validation or because the
    /// server vouches for it.
    Valid = 1,
    /// Known garbage: superseded, malformed, or explicitly discarded.
    Trash = 2,
    /// Failed cryptographic or schema validation.
    Invalid = 3,
}

impl Label {
    /// Converts from the wire's integer representation.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Unlabeled),
            1 => Some(Self::Valid),
            2 => Some(Self::Trash),
            3 => Some(Self::Invalid),
            _ => None,
        }
    }

    /// Converts to the wire's integer representation.
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl Serialize for Label {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for Label {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let v = u8::deserialize(d)?;
        Label::from_u8(v).ok_or_else(|| serde::de::Error::custom(format!("invalid label: {v}")))
    }
}

/// A message as a server returns it: its assigned id, the message itself,
/// and the server's current label for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledMessage {
    /// The server-assigned message id.
    pub id: String,
    /// The underlying message.
    pub m: Message,
    /// The server's current label.
    pub l: Label,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_roundtrips_through_u8() {
        for l in [Label::Unlabeled, Label::Valid, Label::Trash, Label::Invalid] {
            assert_eq!(Label::from_u8(l.as_u8()), Some(l));
        }
    }

    #[test]
    fn unknown_u8_is_none() {
        assert_eq!(Label::from_u8(99), None);
    }
}
