//! Actors and identity documents.
//!
//! Identity resolution itself (`resolve(actor_id) -> IdentityDocument`) is an
//! external collaborator (§1) and is not implemented here. This module only
//! defines the shape of its result, since every consumer in this workspace
//! (the inbox/bucket clients, the session manager) needs to read it.

use serde::{Deserialize, Serialize};

/// An opaque actor identifier, typically a `did:web:` or `did:plc:` string.
pub type ActorId = String;

/// A single service endpoint advertised by an actor's identity document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    /// The service's identifier within the identity document (e.g. an
    /// `#service-name` fragment).
    pub id: String,
    /// The service type, e.g. `"PersonalInbox"`, `"StorageBucket"`, or
    /// `"SharedInbox"`.
    #[serde(rename = "type")]
    pub service_type: String,
    /// The HTTPS base URL of the service.
    pub endpoint: String,
}

/// The document returned by identity resolution: the set of services an
/// actor advertises, plus any identifiers known to be equivalent to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct IdentityDocument {
    /// The actor this document describes.
    pub id: ActorId,
    /// Services advertised by this actor.
    pub services: Vec<ServiceEndpoint>,
    /// Other actor identifiers known to resolve to the same underlying
    /// identity.
    #[serde(default)]
    pub equivalent_ids: Vec<ActorId>,
}

impl IdentityDocument {
    /// Returns the first service of the given type, if any.
    pub fn find_service(&self, service_type: &str) -> Option<&ServiceEndpoint> {
        self.services
            .iter()
            .find(|s| s.service_type == service_type)
    }

    /// Returns every service of the given type, in document order.
    pub fn find_services<'a>(
        &'a self,
        service_type: &'a str,
    ) -> impl Iterator<Item = &'a ServiceEndpoint> {
        self.services
            .iter()
            .filter(move |s| s.service_type == service_type)
    }
}

/// The well-known service type string for an actor's personal inbox.
pub const SERVICE_PERSONAL_INBOX: &str = "PersonalInbox";
/// The well-known service type string for an actor's storage bucket.
pub const SERVICE_STORAGE_BUCKET: &str = "StorageBucket";
/// The well-known service type string for an authorization endpoint.
pub const SERVICE_AUTHORIZATION: &str = "Authorization";
