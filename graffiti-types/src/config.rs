//! Process-wide configuration recognized by the client core (§6).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The maximum size, in bytes, of an object envelope (§3 invariant 6).
pub const MAX_ENVELOPE_BYTES: usize = 32 * 1024;

/// The maximum number of bytes the discovery pipeline will read back from a
/// sender's storage bucket while validating an unlabeled message (§4.I).
pub const MAX_OBJECT_SIZE_BYTES: usize = MAX_ENVELOPE_BYTES;

/// An upper bound on combined channels + recipients in a single object, so
/// oversized fan-out is rejected before a bucket write is attempted (§9 open
/// questions).
pub const MAX_FANOUT: usize = 1000;

/// Process-wide configuration for the client core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraffitiConfig {
    /// Fallback public inboxes consulted for anonymous reads when no
    /// session is active.
    #[serde(default)]
    pub default_inbox_endpoints: Vec<String>,
    /// URL shown in a login UI; not otherwise consulted by the core.
    #[serde(default)]
    pub identity_creator_endpoint: Option<String>,
    /// Timeout applied to individual HTTP requests.
    #[serde(with = "duration_millis", default = "default_http_timeout")]
    pub http_timeout: Duration,
    /// Timeout for a single login or logout authorization-group flow (§5).
    #[serde(with = "duration_millis", default = "default_auth_group_timeout")]
    pub auth_group_timeout: Duration,
    /// Directory under which the local inbox cache and session store are
    /// persisted. `None` selects an in-memory-only backend.
    #[serde(default)]
    pub cache_dir: Option<std::path::PathBuf>,
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_auth_group_timeout() -> Duration {
    Duration::from_secs(5 * 60)
}

impl Default for GraffitiConfig {
    fn default() -> Self {
        Self {
            default_inbox_endpoints: Vec::new(),
            identity_creator_endpoint: None,
            http_timeout: default_http_timeout(),
            auth_group_timeout: default_auth_group_timeout(),
            cache_dir: None,
        }
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_timeouts() {
        let c = GraffitiConfig::default();
        assert_eq!(c.auth_group_timeout, Duration::from_secs(300));
        assert!(c.http_timeout > Duration::ZERO);
    }

    #[test]
    fn config_round_trips_through_json() {
        let c = GraffitiConfig {
            default_inbox_endpoints: vec!["https://inbox.example".into()],
            ..Default::default()
        };
        let s = serde_json::to_string(&c).unwrap();
        let back: GraffitiConfig = serde_json::from_str(&s).unwrap();
        assert_eq!(c, back);
    }
}
