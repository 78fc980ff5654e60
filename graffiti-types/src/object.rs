//! The public-facing object: what a caller posts and reads back (§3).

use crate::actor::ActorId;
use serde::{Deserialize, Serialize};

/// A public-facing post. `allowed = None` means public; `Some(ids)`
/// (including an empty vec) means private to exactly those actors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    /// The object's content-addressed URL (`graffiti:...`).
    pub url: String,
    /// The actor who authored the object.
    pub actor: ActorId,
    /// The arbitrary JSON-like payload.
    pub value: serde_json::Value,
    /// Channels this object was written to.
    pub channels: Vec<String>,
    /// `None` for public objects; `Some(recipients)` for private ones.
    pub allowed: Option<Vec<ActorId>>,
}

impl Object {
    /// Returns `true` if this object is private (has a non-null `allowed`).
    pub fn is_private(&self) -> bool {
        self.allowed.is_some()
    }

    /// Returns a copy of this object with `channels` cleared and `allowed`
    /// reduced to `None` (the public masked form used for shared-inbox
    /// deliveries, invariant 5 / §4.H).
    pub fn masked_public(&self) -> Object {
        Object {
            url: self.url.clone(),
            actor: self.actor.clone(),
            value: self.value.clone(),
            channels: Vec::new(),
            allowed: None,
        }
    }

    /// Returns a copy of this object with `channels` cleared and `allowed`
    /// reduced to the single given recipient (the per-recipient masked form
    /// used for personal-inbox deliveries, invariant 5 / §4.H).
    pub fn masked_for_recipient(&self, recipient: &ActorId) -> Object {
        Object {
            url: self.url.clone(),
            actor: self.actor.clone(),
            value: self.value.clone(),
            channels: Vec::new(),
            allowed: Some(vec![recipient.clone()]),
        }
    }
}

/// A partially specified object, as supplied by a caller to `post` before
/// encoding assigns it a url and actor-stamped identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialObject {
    /// The arbitrary JSON-like payload.
    pub value: serde_json::Value,
    /// Channels to write to.
    #[serde(default)]
    pub channels: Vec<String>,
    /// `None` for public; `Some(recipients)` for private.
    #[serde(default)]
    pub allowed: Option<Vec<ActorId>>,
}
