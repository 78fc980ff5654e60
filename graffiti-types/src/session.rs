//! Sessions: the resolved, authorized view of an actor's services (§3, §4.J).

use crate::actor::ActorId;
use serde::{Deserialize, Serialize};

/// An endpoint paired with the bearer token authorizing calls to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizedEndpoint {
    /// The service's HTTPS base URL.
    pub endpoint: String,
    /// The bearer token authorizing calls to this endpoint. Opaque to the
    /// core; passed by value (§5 "Shared-resource policy").
    pub token: String,
}

/// A logged-in actor's resolved session: which services it can reach and
/// with what credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// The actor this session authenticates as.
    pub actor: ActorId,
    /// The actor's own storage bucket.
    pub storage_bucket: AuthorizedEndpoint,
    /// The actor's own personal inbox.
    pub personal_inbox: AuthorizedEndpoint,
    /// Shared inboxes this actor is configured to announce public posts to.
    #[serde(default)]
    pub shared_inboxes: Vec<AuthorizedEndpoint>,
}

/// The durable form of a session, persisted across process restarts
/// (`graffiti-sessions-logged-in`, §6). Distinct from [`Session`] because
/// persistence groups tokens by authorization endpoint rather than by
/// resolved service, matching how the session manager acquires them (§4.J).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    /// The actor this stored session authenticates as.
    pub actor: ActorId,
    /// One bearer token per distinct authorization endpoint group.
    pub tokens_by_auth_endpoint: std::collections::BTreeMap<String, String>,
}
