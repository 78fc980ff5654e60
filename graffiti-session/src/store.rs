//! Session persistence (§6): the `graffiti-sessions-logged-in`,
//! `graffiti-login-in-progress`, and `graffiti-logout-in-progress` records,
//! surviving process restarts or (in a browser) page redirects (§4.J).

use crate::error::SessionError;
use async_trait::async_trait;
use graffiti_types::actor::ActorId;
use graffiti_types::session::StoredSession;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One authorization-endpoint group discovered while grouping an actor's
/// services (§4.J), persisted so an interrupted login/logout can resume
/// without re-deriving the grouping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthGroup {
    /// The authorization endpoint governing every service in this group.
    pub auth_endpoint: String,
    /// The service endpoints this group's token will cover.
    pub service_endpoints: Vec<String>,
}

/// A login flow in progress: the groups being acquired and the tokens
/// collected so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginInProgress {
    /// The actor logging in.
    pub actor: ActorId,
    /// Every authorization-endpoint group this login must acquire a token
    /// for.
    pub groups: Vec<AuthGroup>,
    /// Tokens collected so far, keyed by authorization endpoint.
    #[serde(default)]
    pub tokens: BTreeMap<String, String>,
}

impl LoginInProgress {
    /// `true` once every group in [`groups`](Self::groups) has a token.
    pub fn is_complete(&self) -> bool {
        self.groups
            .iter()
            .all(|g| self.tokens.contains_key(&g.auth_endpoint))
    }
}

/// A logout flow in progress: the groups whose tokens still need revoking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutInProgress {
    /// The actor logging out.
    pub actor: ActorId,
    /// Tokens not yet revoked, keyed by authorization endpoint.
    pub remaining_tokens: BTreeMap<String, String>,
}

impl LogoutInProgress {
    /// `true` once every token has been revoked.
    pub fn is_complete(&self) -> bool {
        self.remaining_tokens.is_empty()
    }
}

/// Persists logged-in sessions and in-flight login/logout records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Lists every currently logged-in, persisted session.
    async fn list_sessions(&self) -> Result<Vec<StoredSession>, SessionError>;
    /// Inserts or overwrites a persisted session.
    async fn put_session(&self, session: StoredSession) -> Result<(), SessionError>;
    /// Removes a persisted session.
    async fn delete_session(&self, actor: &str) -> Result<(), SessionError>;

    /// Fetches the in-progress login record for `actor`, if any.
    async fn get_login_in_progress(
        &self,
        actor: &str,
    ) -> Result<Option<LoginInProgress>, SessionError>;
    /// Lists every in-progress login record, for startup resume.
    async fn list_logins_in_progress(&self) -> Result<Vec<LoginInProgress>, SessionError>;
    /// Inserts or overwrites an in-progress login record.
    async fn put_login_in_progress(&self, record: LoginInProgress) -> Result<(), SessionError>;
    /// Removes an in-progress login record.
    async fn delete_login_in_progress(&self, actor: &str) -> Result<(), SessionError>;

    /// Fetches the in-progress logout record for `actor`, if any.
    async fn get_logout_in_progress(
        &self,
        actor: &str,
    ) -> Result<Option<LogoutInProgress>, SessionError>;
    /// Lists every in-progress logout record, for startup resume.
    async fn list_logouts_in_progress(&self) -> Result<Vec<LogoutInProgress>, SessionError>;
    /// Inserts or overwrites an in-progress logout record.
    async fn put_logout_in_progress(&self, record: LogoutInProgress) -> Result<(), SessionError>;
    /// Removes an in-progress logout record.
    async fn delete_logout_in_progress(&self, actor: &str) -> Result<(), SessionError>;
}

#[derive(Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    sessions: Vec<StoredSession>,
    #[serde(default)]
    logins_in_progress: Vec<LoginInProgress>,
    #[serde(default)]
    logouts_in_progress: Vec<LogoutInProgress>,
}

/// An in-memory session store, for anonymous or short-lived processes that
/// need no durability across restarts.
#[derive(Default)]
pub struct InMemorySessionStore {
    doc: Mutex<Document>,
}

impl InMemorySessionStore {
    /// Builds an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// A JSON-file-backed session store, persisting across process restarts
/// (§6). Every mutation rewrites the whole file under a single mutex,
/// matching the cache crate's single-writer discipline (§5) at a much
/// smaller write volume than the inbox cache.
pub struct FileSessionStore {
    path: PathBuf,
    doc: Mutex<Document>,
}

impl FileSessionStore {
    /// Opens (or creates) the session store backed by the JSON file at
    /// `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let path = path.into();
        let doc = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| SessionError::Persistence(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Document::default(),
            Err(e) => return Err(SessionError::Persistence(e.to_string())),
        };
        Ok(Self {
            path,
            doc: Mutex::new(doc),
        })
    }

    async fn persist(&self, doc: &Document) -> Result<(), SessionError> {
        let bytes =
            serde_json::to_vec_pretty(doc).map_err(|e| SessionError::Persistence(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SessionError::Persistence(e.to_string()))?;
        }
        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| SessionError::Persistence(e.to_string()))
    }
}

macro_rules! impl_session_store {
    ($ty:ty, $persist:expr) => {
        #[async_trait]
        impl SessionStore for $ty {
            async fn list_sessions(&self) -> Result<Vec<StoredSession>, SessionError> {
                Ok(self.doc.lock().await.sessions.clone())
            }

            async fn put_session(&self, session: StoredSession) -> Result<(), SessionError> {
                let mut doc = self.doc.lock().await;
                doc.sessions.retain(|s| s.actor != session.actor);
                doc.sessions.push(session);
                $persist(self, &doc).await
            }

            async fn delete_session(&self, actor: &str) -> Result<(), SessionError> {
                let mut doc = self.doc.lock().await;
                doc.sessions.retain(|s| s.actor != actor);
                $persist(self, &doc).await
            }

            async fn get_login_in_progress(
                &self,
                actor: &str,
            ) -> Result<Option<LoginInProgress>, SessionError> {
                Ok(self
                    .doc
                    .lock()
                    .await
                    .logins_in_progress
                    .iter()
                    .find(|r| r.actor == actor)
                    .cloned())
            }

            async fn list_logins_in_progress(&self) -> Result<Vec<LoginInProgress>, SessionError> {
                Ok(self.doc.lock().await.logins_in_progress.clone())
            }

            async fn put_login_in_progress(
                &self,
                record: LoginInProgress,
            ) -> Result<(), SessionError> {
                let mut doc = self.doc.lock().await;
                doc.logins_in_progress.retain(|r| r.actor != record.actor);
                doc.logins_in_progress.push(record);
                $persist(self, &doc).await
            }

            async fn delete_login_in_progress(&self, actor: &str) -> Result<(), SessionError> {
                let mut doc = self.doc.lock().await;
                doc.logins_in_progress.retain(|r| r.actor != actor);
                $persist(self, &doc).await
            }

            async fn get_logout_in_progress(
                &self,
                actor: &str,
            ) -> Result<Option<LogoutInProgress>, SessionError> {
                Ok(self
                    .doc
                    .lock()
                    .await
                    .logouts_in_progress
                    .iter()
                    .find(|r| r.actor == actor)
                    .cloned())
            }

            async fn list_logouts_in_progress(&self) -> Result<Vec<LogoutInProgress>, SessionError> {
                Ok(self.doc.lock().await.logouts_in_progress.clone())
            }

            async fn put_logout_in_progress(
                &self,
                record: LogoutInProgress,
            ) -> Result<(), SessionError> {
                let mut doc = self.doc.lock().await;
                doc.logouts_in_progress.retain(|r| r.actor != record.actor);
                doc.logouts_in_progress.push(record);
                $persist(self, &doc).await
            }

            async fn delete_logout_in_progress(&self, actor: &str) -> Result<(), SessionError> {
                let mut doc = self.doc.lock().await;
                doc.logouts_in_progress.retain(|r| r.actor != actor);
                $persist(self, &doc).await
            }
        }
    };
}

async fn noop_persist(_store: &InMemorySessionStore, _doc: &Document) -> Result<(), SessionError> {
    Ok(())
}

async fn file_persist(store: &FileSessionStore, doc: &Document) -> Result<(), SessionError> {
    store.persist(doc).await
}

impl_session_store!(InMemorySessionStore, noop_persist);
impl_session_store!(FileSessionStore, file_persist);

/// Convenience alias for a shared, trait-object session store.
pub type SharedSessionStore = Arc<dyn SessionStore>;
