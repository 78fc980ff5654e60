//! Opaque, serializable stream cursors (§4.F, §4.I, §6).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The resumable position of a single inbox query or export stream.
///
/// Serializes to the shape specified in §4.F: `{cacheKey, version, numSeen,
/// schema}`. `version` is rotated whenever the server-side cursor
/// invalidates; a mismatch between a resumed cursor's `version` and the
/// cache's on resume is a `CursorExpired`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboxCursor {
    /// SHA-256 of the binary-encoded `{url, type, body?}` request, see
    /// `graffiti_transport::inbox`.
    #[serde(rename = "cacheKey")]
    pub cache_key: String,
    /// Rotates whenever the server cursor this refers to is invalidated.
    pub version: String,
    /// Count of messages yielded so far under this `version`.
    #[serde(rename = "numSeen")]
    pub num_seen: u64,
    /// The schema the stream was opened with, carried so resuming enforces
    /// the same validation.
    pub schema: serde_json::Value,
}

/// The resumable position of a [`discover`](crate) stream across many
/// inboxes: one opaque server cursor per endpoint, plus the channel set the
/// stream was opened with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DiscoverCursor {
    /// The channels this discovery stream was opened with.
    pub channels: Vec<String>,
    /// Per-endpoint opaque cursor strings.
    pub cursors: BTreeMap<String, String>,
}
