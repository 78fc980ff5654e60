//! The authorization collaborator interface (§1, §4.J): an OAuth-like
//! component, external to this core, that exchanges `(authorization_endpoint,
//! actor, service_endpoints)` for a bearer token covering every endpoint in
//! that group, and can later revoke it.

use async_trait::async_trait;
use graffiti_types::actor::ActorId;

/// Produces and revokes bearer tokens for one authorization-endpoint group.
/// The core only ever consumes the resulting token by value; it never
/// interprets its contents.
#[async_trait]
pub trait AuthorizationClient: Send + Sync {
    /// Runs the authorization flow for `actor` against `auth_endpoint`,
    /// covering every endpoint in `service_endpoints`, returning the bearer
    /// token on success.
    async fn authorize(
        &self,
        auth_endpoint: &str,
        actor: &ActorId,
        service_endpoints: &[String],
    ) -> Result<String, String>;

    /// Revokes a previously issued `token` for `actor` at `auth_endpoint`.
    async fn revoke(
        &self,
        auth_endpoint: &str,
        actor: &ActorId,
        token: &str,
    ) -> Result<(), String>;
}
