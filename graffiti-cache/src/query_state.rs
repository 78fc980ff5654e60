//! Per-query cache state persisted in the `q` store (§4.F, §6):
//! `{cursor, version, messageIds, waitTil?}`.

use serde::{Deserialize, Serialize};

/// The server-side continuation cursor, the dedup set of message ids already
/// yielded, and the rate-limit deadline for one query's cached progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryCacheEntry {
    /// The opaque server cursor for the next page, `None` once caught up.
    #[serde(default)]
    pub cursor: Option<String>,
    /// Rotated whenever the server invalidates its cursor; a mismatch on
    /// resume surfaces `CursorExpired` (§4.F).
    pub version: String,
    /// Message ids already yielded for this query, so a resumed stream never
    /// re-emits one.
    #[serde(default)]
    pub message_ids: Vec<String>,
    /// Unix epoch milliseconds before which the next page fetch must not be
    /// issued, set from an honored `Retry-After` header.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub wait_until_epoch_millis: Option<i64>,
}

impl QueryCacheEntry {
    /// Starts a fresh entry for a brand-new query with the given `version`.
    pub fn fresh(version: impl Into<String>) -> Self {
        Self {
            cursor: None,
            version: version.into(),
            message_ids: Vec::new(),
            wait_until_epoch_millis: None,
        }
    }

    /// Returns `true` if `message_id` has already been yielded for this
    /// query.
    pub fn has_seen(&self, message_id: &str) -> bool {
        self.message_ids.iter().any(|m| m == message_id)
    }

    /// Records `message_id` as yielded.
    pub fn mark_seen(&mut self, message_id: impl Into<String>) {
        self.message_ids.push(message_id.into());
    }
}
