//! The announcement engine (§4.H): encodes a post, stores its bytes, fans
//! out masked copies to every destination, and files a self-announcement
//! that is this operation's only required delivery.

use crate::error::EngineError;
use crate::identity::IdentityResolver;
use graffiti_crypto::allowed::AllowedTicket;
use graffiti_protocol::envelope::to_canonical_bytes;
use graffiti_protocol::metadata::{BaseMetadata, Metadata, RecipientMetadata, SelfMetadata};
use graffiti_protocol::object::encode;
use graffiti_transport::{InboxClient, StorageBucketClient};
use graffiti_types::actor::SERVICE_PERSONAL_INBOX;
use graffiti_types::message::{AnnouncementReceipt, Message, Tag};
use graffiti_types::object::{Object, PartialObject};
use graffiti_types::session::Session;
use rand::rngs::OsRng;
use rand::RngCore;
use serde_bytes::ByteBuf;

fn fresh_bucket_key() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    graffiti_crypto::codec::encode(&bytes)
}

fn filing_tags(tags: &[Tag], url: &str) -> Vec<Tag> {
    let mut filing = tags.to_vec();
    filing.push(Tag::for_url(url));
    filing
}

/// Authors `partial` as `session.actor`, stores it, and dispatches it to
/// every recipient or shared inbox it names, returning the resulting
/// public-facing object.
///
/// Deliveries to individual recipients and shared inboxes are
/// best-effort: a failed one is logged and skipped. The self-announcement
/// to the author's own personal inbox is not — its failure fails the whole
/// operation, since it is the only durable record of the dispatch and the
/// only way a later `delete` can find what to tombstone.
pub async fn post(
    identity: &dyn IdentityResolver,
    bucket: &StorageBucketClient,
    inbox: &InboxClient,
    session: &Session,
    partial: &PartialObject,
) -> Result<Object, EngineError> {
    let encoded = encode(partial, &session.actor)?;
    let key = fresh_bucket_key();
    bucket
        .put(
            &session.storage_bucket.endpoint,
            &key,
            encoded.object_bytes.clone(),
            &session.storage_bucket.token,
        )
        .await?;

    let filing = filing_tags(&encoded.tags, &encoded.object.url);
    let mut receipts = Vec::new();

    if let Some(recipients) = &encoded.object.allowed {
        let tickets: &[AllowedTicket] = encoded.allowed_tickets.as_deref().ok_or_else(|| {
            EngineError::ProtocolViolation(
                "encoded private object is missing its allowed-list tickets".into(),
            )
        })?;
        for (index, (recipient, ticket)) in recipients.iter().zip(tickets.iter()).enumerate() {
            match dispatch_to_recipient(
                identity,
                inbox,
                recipient,
                index,
                ticket,
                &key,
                None,
                &filing,
                &encoded.object,
            )
            .await
            {
                Ok(receipt) => receipts.push(receipt),
                Err(e) => tracing::warn!(
                    recipient = %recipient,
                    url = %encoded.object.url,
                    error = %e,
                    "failed to deliver private announcement to recipient"
                ),
            }
        }
    } else {
        for shared in &session.shared_inboxes {
            match dispatch_to_shared_inbox(inbox, shared, &key, None, &filing, &encoded.object)
                .await
            {
                Ok(receipt) => receipts.push(receipt),
                Err(e) => tracing::warn!(
                    endpoint = %shared.endpoint,
                    url = %encoded.object.url,
                    error = %e,
                    "failed to deliver public announcement to shared inbox"
                ),
            }
        }
    }

    let tickets_for_self = encoded
        .allowed_tickets
        .as_ref()
        .map(|tickets| tickets.iter().map(|t| ByteBuf::from(t.0.to_vec())).collect());
    let self_metadata = Metadata::SelfAnnouncement(SelfMetadata {
        k: ByteBuf::from(key.clone().into_bytes()),
        t: None,
        s: tickets_for_self,
        n: receipts,
    });
    let self_message = Message {
        t: filing.clone(),
        o: encoded.object.clone(),
        m: to_canonical_bytes(&self_metadata)?,
    };
    inbox
        .send(&session.personal_inbox.endpoint, &self_message)
        .await?;

    Ok(encoded.object)
}

/// Sends one recipient's masked copy, either a fresh announcement
/// (`tombstone_of: None`) or a tombstone re-announcement referencing the
/// prior message id delivered to this same recipient.
pub(crate) async fn dispatch_to_recipient(
    identity: &dyn IdentityResolver,
    inbox: &InboxClient,
    recipient: &str,
    index: usize,
    ticket: &AllowedTicket,
    key: &str,
    tombstone_of: Option<&str>,
    filing: &[Tag],
    object: &Object,
) -> Result<AnnouncementReceipt, EngineError> {
    let recipient = recipient.to_string();
    let doc = identity
        .resolve(&recipient)
        .await
        .map_err(EngineError::IdentityResolution)?;
    let inbox_service = doc
        .find_service(SERVICE_PERSONAL_INBOX)
        .ok_or_else(|| EngineError::NotFound(format!("{recipient} has no personal inbox")))?;

    let metadata = Metadata::Recipient(RecipientMetadata {
        k: ByteBuf::from(key.as_bytes().to_vec()),
        t: tombstone_of.map(str::to_string),
        a: ByteBuf::from(ticket.0.to_vec()),
        i: index as u64,
    });
    let message = Message {
        t: filing.to_vec(),
        o: object.masked_for_recipient(&recipient),
        m: to_canonical_bytes(&metadata)?,
    };
    let id = inbox.send(&inbox_service.endpoint, &message).await?;
    Ok(AnnouncementReceipt {
        id,
        endpoint: None,
        actor: Some(recipient),
    })
}

/// Sends one shared inbox's masked copy, either a fresh announcement or a
/// tombstone re-announcement referencing the prior message id delivered to
/// this same shared inbox.
pub(crate) async fn dispatch_to_shared_inbox(
    inbox: &InboxClient,
    shared: &graffiti_types::session::AuthorizedEndpoint,
    key: &str,
    tombstone_of: Option<&str>,
    filing: &[Tag],
    object: &Object,
) -> Result<AnnouncementReceipt, EngineError> {
    let metadata = Metadata::Base(BaseMetadata {
        k: ByteBuf::from(key.as_bytes().to_vec()),
        t: tombstone_of.map(str::to_string),
    });
    let message = Message {
        t: filing.to_vec(),
        o: object.masked_public(),
        m: to_canonical_bytes(&metadata)?,
    };
    let id = inbox.send(&shared.endpoint, &message).await?;
    Ok(AnnouncementReceipt {
        id,
        endpoint: Some(shared.endpoint.clone()),
        actor: None,
    })
}

/// Builds the filing tags for `object`: its channel public ids in
/// attestation order, plus a trailing per-URL tag. `get`/`delete` query by
/// the URL tag; `discover` queries by channel tags; carrying both lets a
/// single dispatch serve either lookup path, including the all-channels
/// case where a private object would otherwise have no reachable tag at
/// all.
pub(crate) fn filing_tags_for(tags: &[Tag], url: &str) -> Vec<Tag> {
    filing_tags(tags, url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use graffiti_cache::InMemoryInboxCache;
    use graffiti_types::actor::{ActorId, IdentityDocument, ServiceEndpoint, SERVICE_PERSONAL_INBOX};
    use graffiti_types::session::AuthorizedEndpoint;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StubIdentity {
        inbox_endpoint: String,
    }

    #[async_trait]
    impl IdentityResolver for StubIdentity {
        async fn resolve(&self, actor: &ActorId) -> Result<IdentityDocument, String> {
            Ok(IdentityDocument {
                id: actor.clone(),
                services: vec![ServiceEndpoint {
                    id: "#inbox".into(),
                    service_type: SERVICE_PERSONAL_INBOX.into(),
                    endpoint: self.inbox_endpoint.clone(),
                }],
                equivalent_ids: vec![],
            })
        }
    }

    fn inbox_client() -> InboxClient {
        InboxClient::new(reqwest::Client::new(), Arc::new(InMemoryInboxCache::new()))
    }

    fn bucket_client() -> StorageBucketClient {
        StorageBucketClient::new(reqwest::Client::new())
    }

    async fn mount_ok(server: &MockServer, method_name: &str, path: &str, id: &str) {
        #[derive(serde::Serialize)]
        struct R<'a> {
            id: &'a str,
        }
        let body = to_canonical_bytes(&R { id }).unwrap();
        Mock::given(method(method_name))
            .and(path_regex(path))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(server)
            .await;
    }

    fn session(bucket: &MockServer, inbox: &MockServer) -> Session {
        Session {
            actor: "did:web:a.test".into(),
            storage_bucket: AuthorizedEndpoint {
                endpoint: bucket.uri(),
                token: "bucket-tok".into(),
            },
            personal_inbox: AuthorizedEndpoint {
                endpoint: inbox.uri(),
                token: "inbox-tok".into(),
            },
            shared_inboxes: vec![],
        }
    }

    #[tokio::test]
    async fn public_post_dispatches_to_shared_inboxes_and_self() {
        let bucket_server = MockServer::start().await;
        let inbox_server = MockServer::start().await;
        let shared_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path_regex("/value/.*"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&bucket_server)
            .await;
        mount_ok(&inbox_server, "PUT", "/send", "self-msg").await;
        mount_ok(&shared_server, "PUT", "/send", "shared-msg").await;

        let mut s = session(&bucket_server, &inbox_server);
        s.shared_inboxes = vec![AuthorizedEndpoint {
            endpoint: shared_server.uri(),
            token: String::new(),
        }];

        let identity = StubIdentity {
            inbox_endpoint: inbox_server.uri(),
        };
        let object = post(
            &identity,
            &bucket_client(),
            &inbox_client(),
            &s,
            &PartialObject {
                value: json!({"m": "hi"}),
                channels: vec!["c1".into()],
                allowed: None,
            },
        )
        .await
        .expect("post");

        assert!(!object.is_private());
        assert_eq!(object.actor, "did:web:a.test");
    }

    #[tokio::test]
    async fn private_post_dispatches_masked_copies_to_each_recipient() {
        let bucket_server = MockServer::start().await;
        let inbox_server = MockServer::start().await;
        let recipient_inbox = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path_regex("/value/.*"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&bucket_server)
            .await;
        mount_ok(&inbox_server, "PUT", "/send", "self-msg").await;
        mount_ok(&recipient_inbox, "PUT", "/send", "recipient-msg").await;

        let s = session(&bucket_server, &inbox_server);
        let identity = StubIdentity {
            inbox_endpoint: recipient_inbox.uri(),
        };
        let object = post(
            &identity,
            &bucket_client(),
            &inbox_client(),
            &s,
            &PartialObject {
                value: json!({"m": "secret"}),
                channels: vec![],
                allowed: Some(vec!["did:web:b.test".into()]),
            },
        )
        .await
        .expect("post");

        assert!(object.is_private());
    }

    #[tokio::test]
    async fn self_announcement_failure_fails_the_whole_post() {
        let bucket_server = MockServer::start().await;
        let inbox_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path_regex("/value/.*"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&bucket_server)
            .await;
        Mock::given(method("PUT"))
            .and(path_regex("/send"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&inbox_server)
            .await;

        let s = session(&bucket_server, &inbox_server);
        let identity = StubIdentity {
            inbox_endpoint: inbox_server.uri(),
        };
        let err = post(
            &identity,
            &bucket_client(),
            &inbox_client(),
            &s,
            &PartialObject {
                value: json!({"m": "hi"}),
                channels: vec![],
                allowed: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::Transport(_)));
    }

    #[tokio::test]
    async fn a_failed_recipient_delivery_does_not_fail_the_post() {
        let bucket_server = MockServer::start().await;
        let inbox_server = MockServer::start().await;
        let recipient_inbox = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path_regex("/value/.*"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&bucket_server)
            .await;
        mount_ok(&inbox_server, "PUT", "/send", "self-msg").await;
        Mock::given(method("PUT"))
            .and(path_regex("/send"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&recipient_inbox)
            .await;

        let s = session(&bucket_server, &inbox_server);
        let identity = StubIdentity {
            inbox_endpoint: recipient_inbox.uri(),
        };
        let object = post(
            &identity,
            &bucket_client(),
            &inbox_client(),
            &s,
            &PartialObject {
                value: json!({"m": "secret"}),
                channels: vec![],
                allowed: Some(vec!["did:web:b.test".into()]),
            },
        )
        .await
        .expect("post still succeeds");
        assert!(object.is_private());
    }
}
