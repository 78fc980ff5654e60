//! The identity resolution collaborator interface (§1): `resolve(actor_id)
//! -> IdentityDocument`, external to this core and not implemented here.

use async_trait::async_trait;
use graffiti_types::actor::{ActorId, IdentityDocument};

/// Resolves an actor id to the identity document listing its services.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Looks up `actor`'s current identity document.
    async fn resolve(&self, actor: &ActorId) -> Result<IdentityDocument, String>;
}
