//! The session manager (§4.J): groups an actor's services by authorization
//! endpoint, drives one authorization flow per group, and resolves stored
//! sessions back into per-service tokens.

use crate::auth_client::AuthorizationClient;
use crate::error::SessionError;
use crate::state::{Event, LoginState};
use crate::store::{AuthGroup, LoginInProgress, LogoutInProgress, SessionStore};
use graffiti_transport::auth::fetch_auth_endpoint;
use graffiti_transport::clock::Clock;
use graffiti_transport::retry::RetryPolicy;
use graffiti_types::actor::{ActorId, IdentityDocument};
use graffiti_types::session::{AuthorizedEndpoint, Session, StoredSession};
use reqwest::Client;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Orchestrates login, logout, and session resolution for one client
/// process. Holds no per-actor state of its own beyond what `store`
/// persists, so a process restart resumes cleanly from disk (§4.J, §9).
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    authorization: Arc<dyn AuthorizationClient>,
    http: Client,
    clock: Arc<dyn Clock>,
    retry_policy: RetryPolicy,
    group_timeout: Duration,
}

impl SessionManager {
    /// Builds a session manager over the given persistence, authorization
    /// collaborator, and HTTP client.
    pub fn new(
        store: Arc<dyn SessionStore>,
        authorization: Arc<dyn AuthorizationClient>,
        http: Client,
        clock: Arc<dyn Clock>,
        retry_policy: RetryPolicy,
        group_timeout: Duration,
    ) -> Self {
        Self {
            store,
            authorization,
            http,
            clock,
            retry_policy,
            group_timeout,
        }
    }

    /// Groups `identity`'s services by the authorization endpoint each one
    /// reports via `GET /auth` (§6).
    async fn group_services_by_auth_endpoint(
        &self,
        identity: &IdentityDocument,
    ) -> Result<Vec<AuthGroup>, SessionError> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for service in &identity.services {
            let auth_endpoint = fetch_auth_endpoint(
                &self.http,
                &self.clock,
                &self.retry_policy,
                &service.endpoint,
            )
            .await?;
            groups
                .entry(auth_endpoint)
                .or_default()
                .push(service.endpoint.clone());
        }
        Ok(groups
            .into_iter()
            .map(|(auth_endpoint, service_endpoints)| AuthGroup {
                auth_endpoint,
                service_endpoints,
            })
            .collect())
    }

    /// Starts (or resumes, if one is already persisted) a login for
    /// `identity`, acquiring one bearer token per authorization group and
    /// persisting the resulting [`StoredSession`] on success.
    ///
    /// Rejects a fresh login request while one is already in progress for
    /// the same actor (§4.J).
    pub async fn login(&self, identity: &IdentityDocument) -> Result<StoredSession, SessionError> {
        if self.store.get_logout_in_progress(&identity.id).await?.is_some() {
            return Err(SessionError::AlreadyInProgress(identity.id.clone()));
        }
        if self.store.get_login_in_progress(&identity.id).await?.is_some() {
            return Err(SessionError::AlreadyInProgress(identity.id.clone()));
        }

        let groups = self.group_services_by_auth_endpoint(identity).await?;
        let record = LoginInProgress {
            actor: identity.id.clone(),
            groups,
            tokens: BTreeMap::new(),
        };
        self.store.put_login_in_progress(record.clone()).await?;

        self.drive_login(identity, record).await
    }

    async fn drive_login(
        &self,
        identity: &IdentityDocument,
        mut record: LoginInProgress,
    ) -> Result<StoredSession, SessionError> {
        let mut state = LoginState::LoggingIn {
            groups_total: record.groups.len(),
            groups_complete: record.tokens.len(),
        };

        for group in record.groups.clone() {
            if record.tokens.contains_key(&group.auth_endpoint) {
                continue;
            }
            let token = tokio::time::timeout(
                self.group_timeout,
                self.authorization.authorize(
                    &group.auth_endpoint,
                    &identity.id,
                    &group.service_endpoints,
                ),
            )
            .await
            .map_err(|_| SessionError::GroupTimeout(group.auth_endpoint.clone()))?
            .map_err(SessionError::Authorization)?;

            record.tokens.insert(group.auth_endpoint.clone(), token);
            self.store.put_login_in_progress(record.clone()).await?;
            state = state
                .apply(Event::AuthGroupComplete)
                .map_err(SessionError::InvalidTransition)?;
        }

        state
            .apply(Event::LoginComplete)
            .map_err(SessionError::InvalidTransition)?;

        let stored = StoredSession {
            actor: identity.id.clone(),
            tokens_by_auth_endpoint: record.tokens,
        };
        self.store.put_session(stored.clone()).await?;
        self.store.delete_login_in_progress(&identity.id).await?;
        Ok(stored)
    }

    /// Starts (or resumes) a logout for `actor`, revoking every token in its
    /// stored session and removing it from persistence.
    pub async fn logout(&self, actor: &str) -> Result<(), SessionError> {
        if self.store.get_login_in_progress(actor).await?.is_some() {
            return Err(SessionError::AlreadyInProgress(actor.to_string()));
        }

        let record = match self.store.get_logout_in_progress(actor).await? {
            Some(existing) => existing,
            None => {
                let stored = self
                    .store
                    .list_sessions()
                    .await?
                    .into_iter()
                    .find(|s| s.actor == actor)
                    .ok_or_else(|| SessionError::NoStoredSession(actor.to_string()))?;
                let record = LogoutInProgress {
                    actor: actor.to_string(),
                    remaining_tokens: stored.tokens_by_auth_endpoint,
                };
                self.store.put_logout_in_progress(record.clone()).await?;
                record
            }
        };

        self.drive_logout(record).await
    }

    async fn drive_logout(&self, mut record: LogoutInProgress) -> Result<(), SessionError> {
        let groups_total = record.remaining_tokens.len();
        let mut state = LoginState::LoggingOut {
            groups_total,
            groups_complete: 0,
        };

        for (auth_endpoint, token) in record.remaining_tokens.clone() {
            tokio::time::timeout(
                self.group_timeout,
                self.authorization.revoke(&auth_endpoint, &record.actor, &token),
            )
            .await
            .map_err(|_| SessionError::GroupTimeout(auth_endpoint.clone()))?
            .map_err(SessionError::Authorization)?;

            record.remaining_tokens.remove(&auth_endpoint);
            self.store.put_logout_in_progress(record.clone()).await?;
            state = state
                .apply(Event::LogoutGroupComplete)
                .map_err(SessionError::InvalidTransition)?;
        }

        state
            .apply(Event::LogoutComplete)
            .map_err(SessionError::InvalidTransition)?;

        self.store.delete_session(&record.actor).await?;
        self.store.delete_logout_in_progress(&record.actor).await?;
        Ok(())
    }

    /// Resumes every login and logout left in progress by a prior process
    /// (after a restart or, in a browser, a redirect back from an
    /// authorization endpoint), returning how many of each were resumed.
    ///
    /// Identity documents must be supplied by the caller via `identities`,
    /// keyed by actor, since resolving them is an external collaborator
    /// (§1) this crate does not own.
    pub async fn resume_pending(
        &self,
        identities: &BTreeMap<ActorId, IdentityDocument>,
    ) -> Result<(usize, usize), SessionError> {
        let mut logins_resumed = 0;
        for record in self.store.list_logins_in_progress().await? {
            let Some(identity) = identities.get(&record.actor) else {
                continue;
            };
            self.drive_login(identity, record).await?;
            logins_resumed += 1;
        }

        let mut logouts_resumed = 0;
        for record in self.store.list_logouts_in_progress().await? {
            self.drive_logout(record).await?;
            logouts_resumed += 1;
        }

        Ok((logins_resumed, logouts_resumed))
    }

    /// Resolves a persisted session against `identity`'s current service
    /// list, re-deriving the authorization-endpoint grouping and looking up
    /// each resulting group's token (§3, §4.J).
    pub async fn resolve_session(
        &self,
        identity: &IdentityDocument,
        stored: &StoredSession,
    ) -> Result<Session, SessionError> {
        let storage_bucket = self
            .resolve_endpoint(identity, stored, graffiti_types::actor::SERVICE_STORAGE_BUCKET)
            .await?;
        let personal_inbox = self
            .resolve_endpoint(identity, stored, graffiti_types::actor::SERVICE_PERSONAL_INBOX)
            .await?;

        let mut shared_inboxes = Vec::new();
        for service in identity.find_services("SharedInbox") {
            let auth_endpoint = fetch_auth_endpoint(
                &self.http,
                &self.clock,
                &self.retry_policy,
                &service.endpoint,
            )
            .await?;
            if let Some(token) = stored.tokens_by_auth_endpoint.get(&auth_endpoint) {
                shared_inboxes.push(AuthorizedEndpoint {
                    endpoint: service.endpoint.clone(),
                    token: token.clone(),
                });
            }
        }

        Ok(Session {
            actor: identity.id.clone(),
            storage_bucket,
            personal_inbox,
            shared_inboxes,
        })
    }

    async fn resolve_endpoint(
        &self,
        identity: &IdentityDocument,
        stored: &StoredSession,
        service_type: &str,
    ) -> Result<AuthorizedEndpoint, SessionError> {
        let service = identity
            .find_service(service_type)
            .ok_or_else(|| SessionError::MissingService(service_type.to_string()))?;
        let auth_endpoint = fetch_auth_endpoint(
            &self.http,
            &self.clock,
            &self.retry_policy,
            &service.endpoint,
        )
        .await?;
        let token = stored
            .tokens_by_auth_endpoint
            .get(&auth_endpoint)
            .ok_or_else(|| SessionError::MissingService(service_type.to_string()))?;
        Ok(AuthorizedEndpoint {
            endpoint: service.endpoint.clone(),
            token: token.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemorySessionStore;
    use async_trait::async_trait;
    use graffiti_transport::clock::FakeClock;
    use graffiti_types::actor::ServiceEndpoint;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StubAuthorizer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AuthorizationClient for StubAuthorizer {
        async fn authorize(
            &self,
            auth_endpoint: &str,
            _actor: &ActorId,
            _service_endpoints: &[String],
        ) -> Result<String, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("token-for-{auth_endpoint}"))
        }

        async fn revoke(
            &self,
            _auth_endpoint: &str,
            _actor: &ActorId,
            _token: &str,
        ) -> Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    async fn identity_with_auth_server(server: &MockServer) -> IdentityDocument {
        Mock::given(method("GET"))
            .and(path("/auth"))
            .respond_with(ResponseTemplate::new(200).set_body_string(server.uri()))
            .mount(server)
            .await;
        IdentityDocument {
            id: "did:web:a.test".into(),
            services: vec![
                ServiceEndpoint {
                    id: "#bucket".into(),
                    service_type: graffiti_types::actor::SERVICE_STORAGE_BUCKET.into(),
                    endpoint: server.uri(),
                },
                ServiceEndpoint {
                    id: "#inbox".into(),
                    service_type: graffiti_types::actor::SERVICE_PERSONAL_INBOX.into(),
                    endpoint: server.uri(),
                },
            ],
            equivalent_ids: vec![],
        }
    }

    fn manager(store: Arc<dyn SessionStore>, authorizer: Arc<dyn AuthorizationClient>) -> SessionManager {
        SessionManager::new(
            store,
            authorizer,
            Client::new(),
            Arc::new(FakeClock::new(0)),
            RetryPolicy::default(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn login_groups_services_sharing_an_auth_endpoint_into_one_token() {
        let server = MockServer::start().await;
        let identity = identity_with_auth_server(&server).await;
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        let authorizer = Arc::new(StubAuthorizer {
            calls: AtomicUsize::new(0),
        });
        let mgr = manager(store.clone(), authorizer.clone());

        let stored = mgr.login(&identity).await.expect("login");
        assert_eq!(stored.tokens_by_auth_endpoint.len(), 1);
        assert_eq!(authorizer.calls.load(Ordering::SeqCst), 1);
        assert!(store.get_login_in_progress(&identity.id).await.unwrap().is_none());
        assert_eq!(store.list_sessions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_login_for_same_actor_is_rejected() {
        let server = MockServer::start().await;
        let identity = identity_with_auth_server(&server).await;
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        store
            .put_login_in_progress(LoginInProgress {
                actor: identity.id.clone(),
                groups: vec![],
                tokens: BTreeMap::new(),
            })
            .await
            .unwrap();
        let authorizer = Arc::new(StubAuthorizer {
            calls: AtomicUsize::new(0),
        });
        let mgr = manager(store, authorizer);

        let err = mgr.login(&identity).await.unwrap_err();
        assert!(matches!(err, SessionError::AlreadyInProgress(_)));
    }

    #[tokio::test]
    async fn logout_revokes_tokens_and_clears_the_session() {
        let server = MockServer::start().await;
        let identity = identity_with_auth_server(&server).await;
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        let authorizer = Arc::new(StubAuthorizer {
            calls: AtomicUsize::new(0),
        });
        let mgr = manager(store.clone(), authorizer.clone());

        mgr.login(&identity).await.expect("login");
        mgr.logout(&identity.id).await.expect("logout");
        assert!(store.list_sessions().await.unwrap().is_empty());
        assert_eq!(authorizer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn logout_without_a_stored_session_fails() {
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        let authorizer = Arc::new(StubAuthorizer {
            calls: AtomicUsize::new(0),
        });
        let mgr = manager(store, authorizer);
        let err = mgr.logout("did:web:nobody.test").await.unwrap_err();
        assert!(matches!(err, SessionError::NoStoredSession(_)));
    }

    #[tokio::test]
    async fn resolve_session_looks_up_tokens_by_auth_endpoint() {
        let server = MockServer::start().await;
        let identity = identity_with_auth_server(&server).await;
        let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
        let authorizer = Arc::new(StubAuthorizer {
            calls: AtomicUsize::new(0),
        });
        let mgr = manager(store, authorizer);

        let stored = mgr.login(&identity).await.expect("login");
        let session = mgr.resolve_session(&identity, &stored).await.expect("resolve");
        assert_eq!(session.actor, identity.id);
        assert_eq!(session.storage_bucket.endpoint, server.uri());
        assert_eq!(session.personal_inbox.endpoint, server.uri());
    }
}
