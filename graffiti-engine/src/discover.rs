//! `get`, `delete`, and `discover` (§4.I): merges per-endpoint query
//! streams, lazily validates untrusted messages against their sender's
//! bucket bytes, and tracks tombstone state across a discovery batch.

use crate::announce::{dispatch_to_recipient, dispatch_to_shared_inbox, filing_tags_for};
use crate::error::EngineError;
use crate::identity::IdentityResolver;
use futures::channel::mpsc;
use futures::StreamExt;
use graffiti_crypto::allowed::{AllowedTicket, TICKET_LEN};
use graffiti_crypto::channel;
use graffiti_protocol::envelope::{from_canonical_bytes, to_canonical_bytes};
use graffiti_protocol::metadata::{Metadata, SelfMetadata};
use graffiti_protocol::object::{validate, PrivateValidation};
use graffiti_transport::error::TransportError;
use graffiti_transport::{InboxClient, StorageBucketClient};
use graffiti_types::actor::{SERVICE_STORAGE_BUCKET};
use graffiti_types::config::MAX_OBJECT_SIZE_BYTES;
use graffiti_types::cursor::{DiscoverCursor, InboxCursor};
use graffiti_types::label::{Label, LabeledMessage};
use graffiti_types::message::{Message, Tag};
use graffiti_types::object::Object;
use graffiti_types::session::Session;
use std::collections::{BTreeMap, HashSet};

/// One endpoint `get`/`discover` may query, paired with the bearer token (if
/// any) authorizing calls to it.
#[derive(Debug, Clone)]
struct Destination {
    endpoint: String,
    token: Option<String>,
}

fn destinations_for(session: Option<&Session>, default_inbox_endpoints: &[String]) -> Vec<Destination> {
    match session {
        Some(s) => {
            let mut out = vec![Destination {
                endpoint: s.personal_inbox.endpoint.clone(),
                token: Some(s.personal_inbox.token.clone()),
            }];
            out.extend(s.shared_inboxes.iter().map(|e| Destination {
                endpoint: e.endpoint.clone(),
                token: Some(e.token.clone()),
            }));
            out
        }
        None => default_inbox_endpoints
            .iter()
            .map(|e| Destination {
                endpoint: e.clone(),
                token: None,
            })
            .collect(),
    }
}

/// One object yielded from a `discover` batch.
#[derive(Debug, Clone)]
pub enum DiscoverEvent {
    /// A live, validated object, its `channels` filtered to the requested
    /// channels whose tags actually matched.
    Object(Object),
    /// A prior object at this URL has been tombstoned.
    Tombstone { url: String },
    /// One endpoint's stream surfaced an error; other endpoints continue.
    EndpointError { endpoint: String, error: String },
}

/// The result of a single `discover` invocation: every event produced this
/// round, plus a cursor resuming each endpoint's stream from where it left
/// off.
#[derive(Debug, Clone)]
pub struct DiscoverResult {
    /// Events in arrival order (no cross-endpoint ordering guarantee, §5).
    pub events: Vec<DiscoverEvent>,
    /// Resumable position across every endpoint queried this round.
    pub cursor: DiscoverCursor,
}

/// Outcome of running the per-message processing matrix (§7) on one
/// `unlabeled` or already-decided message.
enum Outcome {
    Valid(Object),
    Tombstone,
    Skip,
}

async fn relabel(inbox: &InboxClient, endpoint: &str, id: &str, label: Label, token: Option<&str>) {
    let Some(token) = token else { return };
    if let Err(e) = inbox.label(endpoint, id, label, token).await {
        tracing::warn!(endpoint = %endpoint, id = %id, error = %e, "failed to relabel message");
    }
}

/// Applies the discovery matrix in §7 to one labeled message: drops
/// trash/invalid, yields server-vouched `valid` directly, and for
/// `unlabeled` fetches the sender's bucket bytes to validate, relabeling the
/// server's copy when a token is available.
async fn process_message(
    identity: &dyn IdentityResolver,
    bucket: &StorageBucketClient,
    inbox: &InboxClient,
    endpoint: &str,
    token: Option<&str>,
    labeled: &LabeledMessage,
    self_actor: Option<&str>,
) -> Result<Outcome, EngineError> {
    match labeled.l {
        Label::Trash | Label::Invalid => return Ok(Outcome::Skip),
        Label::Valid => return Ok(Outcome::Valid(labeled.m.o.clone())),
        Label::Unlabeled => {}
    }

    let metadata: Metadata = match from_canonical_bytes(&labeled.m.m) {
        Ok(m) => m,
        Err(_) => {
            relabel(inbox, endpoint, &labeled.id, Label::Invalid, token).await;
            return Ok(Outcome::Skip);
        }
    };

    let object = &labeled.m.o;
    let key = match String::from_utf8(metadata.bucket_key().to_vec()) {
        Ok(k) => k,
        Err(_) => {
            relabel(inbox, endpoint, &labeled.id, Label::Invalid, token).await;
            return Ok(Outcome::Skip);
        }
    };

    let sender_bucket_endpoint = match identity.resolve(&object.actor).await {
        Ok(doc) => doc.find_service(SERVICE_STORAGE_BUCKET).map(|s| s.endpoint.clone()),
        Err(_) => None,
    };
    let Some(sender_bucket_endpoint) = sender_bucket_endpoint else {
        relabel(inbox, endpoint, &labeled.id, Label::Invalid, token).await;
        return Ok(Outcome::Skip);
    };

    let fetch = bucket
        .get(&sender_bucket_endpoint, &key, Some(MAX_OBJECT_SIZE_BYTES))
        .await;

    let bytes = match fetch {
        Err(TransportError::Status { status: 404, .. }) => {
            return Ok(if metadata.prior_message_id().is_some() {
                relabel(inbox, endpoint, &labeled.id, Label::Trash, token).await;
                if let Some(prior_id) = metadata.prior_message_id() {
                    relabel(inbox, endpoint, prior_id, Label::Trash, token).await;
                }
                Outcome::Tombstone
            } else {
                relabel(inbox, endpoint, &labeled.id, Label::Invalid, token).await;
                Outcome::Skip
            });
        }
        Err(_) => {
            relabel(inbox, endpoint, &labeled.id, Label::Invalid, token).await;
            return Ok(Outcome::Skip);
        }
        Ok(bytes) => bytes,
    };

    let received_tags: Vec<Tag> = labeled
        .m
        .t
        .iter()
        .filter(|t| t.0 != object.url.as_bytes())
        .cloned()
        .collect();

    let mut recipient_ticket: Option<AllowedTicket> = None;
    let mut self_tickets: Vec<AllowedTicket> = Vec::new();
    let private_info = match &metadata {
        Metadata::Recipient(rm) if object.allowed.is_some() => {
            let Ok(ticket_bytes) = <[u8; TICKET_LEN]>::try_from(rm.a.as_slice()) else {
                relabel(inbox, endpoint, &labeled.id, Label::Invalid, token).await;
                return Ok(Outcome::Skip);
            };
            recipient_ticket = Some(AllowedTicket(ticket_bytes));
            let Some(recipient) = self_actor else {
                relabel(inbox, endpoint, &labeled.id, Label::Invalid, token).await;
                return Ok(Outcome::Skip);
            };
            recipient_ticket
                .as_ref()
                .map(|ticket| PrivateValidation::RecipientCase {
                    recipient,
                    allowed_ticket: ticket,
                    allowed_index: rm.i as usize,
                })
        }
        Metadata::SelfAnnouncement(sm) if object.allowed.is_some() => {
            let Some(recipients) = object.allowed.as_ref() else {
                relabel(inbox, endpoint, &labeled.id, Label::Invalid, token).await;
                return Ok(Outcome::Skip);
            };
            let Some(ticket_bufs) = sm.s.as_ref() else {
                relabel(inbox, endpoint, &labeled.id, Label::Invalid, token).await;
                return Ok(Outcome::Skip);
            };
            for tb in ticket_bufs {
                let Ok(ticket_bytes) = <[u8; TICKET_LEN]>::try_from(tb.as_slice()) else {
                    relabel(inbox, endpoint, &labeled.id, Label::Invalid, token).await;
                    return Ok(Outcome::Skip);
                };
                self_tickets.push(AllowedTicket(ticket_bytes));
            }
            Some(PrivateValidation::SelfCase {
                recipients,
                allowed_tickets: &self_tickets,
            })
        }
        _ if object.allowed.is_some() => {
            relabel(inbox, endpoint, &labeled.id, Label::Invalid, token).await;
            return Ok(Outcome::Skip);
        }
        _ => None,
    };

    match validate(&object.url, &object.value, &received_tags, &bytes, private_info.as_ref()) {
        Ok(()) => {
            relabel(inbox, endpoint, &labeled.id, Label::Valid, token).await;
            Ok(Outcome::Valid(object.clone()))
        }
        Err(_) => {
            relabel(inbox, endpoint, &labeled.id, Label::Invalid, token).await;
            Ok(Outcome::Skip)
        }
    }
}

/// Looks up `url` across the caller's inbox set (personal + shared if
/// logged in, else the configured default public inboxes), trying each in
/// turn and reducing its stream to the last non-tombstoned match (§4.I).
pub async fn get(
    identity: &dyn IdentityResolver,
    bucket: &StorageBucketClient,
    inbox: &InboxClient,
    session: Option<&Session>,
    default_inbox_endpoints: &[String],
    url: &str,
    schema: &serde_json::Value,
) -> Result<Object, EngineError> {
    let destinations = destinations_for(session, default_inbox_endpoints);
    let self_actor = session.map(|s| s.actor.as_str());
    let tag = Tag::for_url(url);

    'endpoints: for dest in &destinations {
        let mut query = inbox.query(
            dest.endpoint.clone(),
            vec![tag.clone()],
            schema.clone(),
            dest.token.clone(),
        )?;
        let mut last: Option<Outcome> = None;
        loop {
            let page = query.next().await?;
            let Some(messages) = page else { break };
            for labeled in &messages {
                if labeled.m.o.url != url {
                    continue;
                }
                last = Some(
                    process_message(
                        identity,
                        bucket,
                        inbox,
                        &dest.endpoint,
                        dest.token.as_deref(),
                        labeled,
                        self_actor,
                    )
                    .await?,
                );
            }
            if query.is_exhausted() {
                break;
            }
        }
        match last {
            Some(Outcome::Valid(object)) => {
                let validator = jsonschema::validator_for(schema)
                    .map_err(|e| EngineError::InvalidSchema(e.to_string()))?;
                if validator.is_valid(&object.value) {
                    return Ok(object);
                }
                continue 'endpoints;
            }
            _ => continue 'endpoints,
        }
    }
    Err(EngineError::NotFound(url.to_string()))
}

/// Tombstones `url`, which must be owned by `session.actor`: deletes its
/// bucket bytes, then re-announces to every destination the original
/// announcement reached, referencing that destination's prior message id
/// so servers can collapse the pair (§4.I, §4.H tombstone note).
pub async fn delete(
    identity: &dyn IdentityResolver,
    bucket: &StorageBucketClient,
    inbox: &InboxClient,
    session: &Session,
    url: &str,
) -> Result<(), EngineError> {
    let (actor, _) = graffiti_protocol::url::decode_url(url)?;
    if actor != session.actor {
        return Err(EngineError::Forbidden(format!(
            "{url} is not owned by {}",
            session.actor
        )));
    }

    let tag = Tag::for_url(url);
    let mut query = inbox.query(
        session.personal_inbox.endpoint.clone(),
        vec![tag],
        serde_json::Value::Null,
        Some(session.personal_inbox.token.clone()),
    )?;

    let mut found: Option<(String, SelfMetadata, Object)> = None;
    loop {
        let page = query.next().await?;
        let Some(messages) = page else { break };
        for labeled in &messages {
            if labeled.m.o.url != url {
                continue;
            }
            if matches!(labeled.l, Label::Trash | Label::Invalid) {
                continue;
            }
            if let Ok(Metadata::SelfAnnouncement(sm)) = from_canonical_bytes::<Metadata>(&labeled.m.m) {
                found = Some((labeled.id.clone(), sm, labeled.m.o.clone()));
            }
        }
        if query.is_exhausted() {
            break;
        }
    }

    let (prior_self_id, metadata, object) =
        found.ok_or_else(|| EngineError::NotFound(url.to_string()))?;

    let key = String::from_utf8(metadata.k.to_vec())
        .map_err(|e| EngineError::ProtocolViolation(e.to_string()))?;
    bucket
        .delete(&session.storage_bucket.endpoint, &key, &session.storage_bucket.token)
        .await?;

    let mut channel_tags = Vec::with_capacity(object.channels.len());
    for ch in &object.channels {
        let public_id = channel::register(ch)?;
        channel_tags.push(Tag(public_id.0.to_vec()));
    }
    let filing = filing_tags_for(&channel_tags, url);

    let mut new_receipts = Vec::new();
    if let Some(recipients) = &object.allowed {
        let tickets = metadata.s.as_ref().ok_or_else(|| {
            EngineError::ProtocolViolation("private self-announcement missing tickets".into())
        })?;
        for (index, (recipient, ticket_buf)) in recipients.iter().zip(tickets.iter()).enumerate() {
            let ticket_bytes = <[u8; TICKET_LEN]>::try_from(ticket_buf.as_slice())
                .map_err(|_| EngineError::ProtocolViolation("malformed allowed ticket".into()))?;
            let ticket = AllowedTicket(ticket_bytes);
            let prior_id = metadata
                .n
                .iter()
                .find(|r| r.actor.as_deref() == Some(recipient.as_str()))
                .map(|r| r.id.as_str());
            match dispatch_to_recipient(
                identity, inbox, recipient, index, &ticket, &key, prior_id, &filing, &object,
            )
            .await
            {
                Ok(receipt) => new_receipts.push(receipt),
                Err(e) => tracing::warn!(
                    recipient = %recipient,
                    url = %url,
                    error = %e,
                    "failed to deliver tombstone to recipient"
                ),
            }
        }
    } else {
        for shared in &session.shared_inboxes {
            let prior_id = metadata
                .n
                .iter()
                .find(|r| r.endpoint.as_deref() == Some(shared.endpoint.as_str()))
                .map(|r| r.id.as_str());
            match dispatch_to_shared_inbox(inbox, shared, &key, prior_id, &filing, &object).await {
                Ok(receipt) => new_receipts.push(receipt),
                Err(e) => tracing::warn!(
                    endpoint = %shared.endpoint,
                    url = %url,
                    error = %e,
                    "failed to deliver tombstone to shared inbox"
                ),
            }
        }
    }

    let self_metadata = Metadata::SelfAnnouncement(SelfMetadata {
        k: metadata.k.clone(),
        t: Some(prior_self_id),
        s: metadata.s.clone(),
        n: new_receipts,
    });
    let self_message = Message {
        t: filing,
        o: object,
        m: to_canonical_bytes(&self_metadata)?,
    };
    inbox
        .send(&session.personal_inbox.endpoint, &self_message)
        .await?;
    Ok(())
}

enum WorkerItem {
    Message(LabeledMessage),
    Cursor(InboxCursor),
}

/// Merges per-endpoint query streams filtered to `channels`' public-id tags,
/// validating each fresh message and tracking a URL → tombstone-state map
/// across the whole batch so a tombstone always wins over an earlier live
/// emission for the same URL (§4.I, §5 ordering guarantees).
pub async fn discover(
    identity: &dyn IdentityResolver,
    bucket: &StorageBucketClient,
    inbox: &InboxClient,
    session: Option<&Session>,
    default_inbox_endpoints: &[String],
    channels: &[String],
    schema: &serde_json::Value,
    resume: Option<&DiscoverCursor>,
) -> Result<DiscoverResult, EngineError> {
    let mut channel_tags = Vec::with_capacity(channels.len());
    for channel_name in channels {
        let public_id = channel::register(channel_name)?;
        channel_tags.push(Tag(public_id.0.to_vec()));
    }

    let destinations = destinations_for(session, default_inbox_endpoints);
    let self_actor_owned = session.map(|s| s.actor.clone());

    let mut queries = Vec::with_capacity(destinations.len());
    for dest in &destinations {
        let prior = resume.and_then(|c| c.cursors.get(&dest.endpoint));
        let opened = match prior {
            Some(serialized) => {
                let cursor: InboxCursor = serde_json::from_str(serialized).map_err(|e| {
                    EngineError::ProtocolViolation(format!("malformed discover cursor: {e}"))
                })?;
                inbox
                    .resume(cursor, dest.endpoint.clone(), "/query", channel_tags.clone(), dest.token.clone())
                    .await
            }
            None => inbox.query(dest.endpoint.clone(), channel_tags.clone(), schema.clone(), dest.token.clone()),
        };
        queries.push((dest.clone(), opened));
    }

    let (tx, mut rx) = mpsc::unbounded();
    let workers = queries.into_iter().map(|(dest, opened)| {
        let tx = tx.clone();
        async move {
            let mut query = match opened {
                Ok(q) => q,
                Err(e) => {
                    let _ = tx.unbounded_send((dest, Err(EngineError::from(e))));
                    return;
                }
            };
            loop {
                match query.next().await {
                    Ok(Some(messages)) => {
                        for m in messages {
                            let _ = tx.unbounded_send((dest.clone(), Ok(WorkerItem::Message(m))));
                        }
                        if query.is_exhausted() {
                            let _ = tx.unbounded_send((dest.clone(), Ok(WorkerItem::Cursor(query.cursor()))));
                            break;
                        }
                    }
                    Ok(None) => {
                        let _ = tx.unbounded_send((dest.clone(), Ok(WorkerItem::Cursor(query.cursor()))));
                        break;
                    }
                    Err(e) => {
                        let _ = tx.unbounded_send((dest, Err(EngineError::from(e))));
                        break;
                    }
                }
            }
        }
    });
    drop(tx);

    let mut events = Vec::new();
    let mut tombstoned: HashSet<String> = HashSet::new();
    let mut seen_live: HashSet<String> = HashSet::new();
    let mut cursors: BTreeMap<String, String> = BTreeMap::new();

    let processing = async {
        while let Some((dest, item)) = rx.next().await {
            match item {
                Ok(WorkerItem::Message(labeled)) => {
                    let outcome = process_message(
                        identity,
                        bucket,
                        inbox,
                        &dest.endpoint,
                        dest.token.as_deref(),
                        &labeled,
                        self_actor_owned.as_deref(),
                    )
                    .await;
                    match outcome {
                        Ok(Outcome::Tombstone) => {
                            if tombstoned.insert(labeled.m.o.url.clone()) {
                                events.push(DiscoverEvent::Tombstone {
                                    url: labeled.m.o.url.clone(),
                                });
                            }
                        }
                        Ok(Outcome::Valid(mut object)) => {
                            if tombstoned.contains(&object.url) {
                                continue;
                            }
                            let matched: Vec<String> = channels
                                .iter()
                                .zip(channel_tags.iter())
                                .filter(|(_, t)| labeled.m.t.contains(t))
                                .map(|(c, _)| c.clone())
                                .collect();
                            if matched.is_empty() {
                                events.push(DiscoverEvent::EndpointError {
                                    endpoint: dest.endpoint.clone(),
                                    error: format!(
                                        "{} matched none of the requested channel tags",
                                        object.url
                                    ),
                                });
                                continue;
                            }
                            object.channels = matched;
                            if seen_live.insert(object.url.clone()) {
                                events.push(DiscoverEvent::Object(object));
                            }
                        }
                        Ok(Outcome::Skip) => {}
                        Err(e) => events.push(DiscoverEvent::EndpointError {
                            endpoint: dest.endpoint.clone(),
                            error: e.to_string(),
                        }),
                    }
                }
                Ok(WorkerItem::Cursor(cursor)) => {
                    if let Ok(serialized) = serde_json::to_string(&cursor) {
                        cursors.insert(dest.endpoint.clone(), serialized);
                    }
                }
                Err(e) => {
                    events.push(DiscoverEvent::EndpointError {
                        endpoint: dest.endpoint.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
    };

    tokio::join!(futures::future::join_all(workers), processing);

    Ok(DiscoverResult {
        events,
        cursor: DiscoverCursor {
            channels: channels.to_vec(),
            cursors,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use graffiti_cache::InMemoryInboxCache;
    use graffiti_crypto::channel;
    use graffiti_protocol::object::encode as encode_object;
    use graffiti_types::actor::{ActorId, IdentityDocument, ServiceEndpoint, SERVICE_STORAGE_BUCKET};
    use graffiti_types::object::PartialObject;
    use graffiti_types::session::AuthorizedEndpoint;
    use serde_bytes::ByteBuf;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StubIdentity {
        bucket_endpoint: String,
    }

    #[async_trait]
    impl IdentityResolver for StubIdentity {
        async fn resolve(&self, actor: &ActorId) -> Result<IdentityDocument, String> {
            Ok(IdentityDocument {
                id: actor.clone(),
                services: vec![ServiceEndpoint {
                    id: "#bucket".into(),
                    service_type: SERVICE_STORAGE_BUCKET.into(),
                    endpoint: self.bucket_endpoint.clone(),
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

    async fn mount_query_page(server: &MockServer, messages: Vec<LabeledMessage>) {
        #[derive(serde::Serialize)]
        struct Page {
            results: Vec<LabeledMessage>,
            #[serde(rename = "hasMore")]
            has_more: bool,
        }
        let body = to_canonical_bytes(&Page {
            results: messages,
            has_more: false,
        })
        .unwrap();
        Mock::given(method("POST"))
            .and(path_regex("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn get_returns_not_found_when_no_endpoint_has_the_url() {
        let inbox_server = MockServer::start().await;
        mount_query_page(&inbox_server, vec![]).await;

        let identity = StubIdentity {
            bucket_endpoint: "https://bucket.test".into(),
        };
        let err = get(
            &identity,
            &bucket_client(),
            &inbox_client(),
            None,
            &[inbox_server.uri()],
            "graffiti:did%3Aweb%3Aa.test:uabc",
            &json!({}),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn get_validates_and_returns_a_publicly_labeled_valid_message() {
        let bucket_server = MockServer::start().await;
        let inbox_server = MockServer::start().await;

        let partial = PartialObject {
            value: json!({"m": "hi"}),
            channels: vec![],
            allowed: None,
        };
        let encoded = encode_object(&partial, "did:web:a.test").unwrap();
        let metadata = Metadata::Base(graffiti_protocol::metadata::BaseMetadata {
            k: ByteBuf::from(b"key1".to_vec()),
            t: None,
        });
        let message = Message {
            t: vec![Tag::for_url(&encoded.object.url)],
            o: encoded.object.clone(),
            m: to_canonical_bytes(&metadata).unwrap(),
        };
        let labeled = LabeledMessage {
            id: "msg-1".into(),
            m: message,
            l: Label::Valid,
        };
        mount_query_page(&inbox_server, vec![labeled]).await;

        let identity = StubIdentity {
            bucket_endpoint: bucket_server.uri(),
        };
        let object = get(
            &identity,
            &bucket_client(),
            &inbox_client(),
            None,
            &[inbox_server.uri()],
            &encoded.object.url,
            &json!({}),
        )
        .await
        .expect("get");
        assert_eq!(object.url, encoded.object.url);
    }

    #[tokio::test]
    async fn delete_rejects_an_object_not_owned_by_the_session_actor() {
        let identity = StubIdentity {
            bucket_endpoint: "https://bucket.test".into(),
        };
        let session = Session {
            actor: "did:web:a.test".into(),
            storage_bucket: AuthorizedEndpoint {
                endpoint: "https://bucket.a.test".into(),
                token: "tok".into(),
            },
            personal_inbox: AuthorizedEndpoint {
                endpoint: "https://inbox.a.test".into(),
                token: "tok".into(),
            },
            shared_inboxes: vec![],
        };
        let partial = PartialObject {
            value: json!({}),
            channels: vec![],
            allowed: None,
        };
        let encoded = encode_object(&partial, "did:web:mallory.test").unwrap();
        let err = delete(
            &identity,
            &bucket_client(),
            &inbox_client(),
            &session,
            &encoded.object.url,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
    }

    #[tokio::test]
    async fn discover_restores_matched_channels_on_a_masked_copy() {
        let bucket_server = MockServer::start().await;
        let inbox_server = MockServer::start().await;

        let partial = PartialObject {
            value: json!({"m": "hi"}),
            channels: vec!["c1".into(), "c2".into()],
            allowed: None,
        };
        let encoded = encode_object(&partial, "did:web:a.test").unwrap();
        let metadata = Metadata::Base(graffiti_protocol::metadata::BaseMetadata {
            k: ByteBuf::from(b"key1".to_vec()),
            t: None,
        });
        let mut filing = encoded.tags.clone();
        filing.push(Tag::for_url(&encoded.object.url));
        let message = Message {
            t: filing,
            o: encoded.object.masked_public(),
            m: to_canonical_bytes(&metadata).unwrap(),
        };
        let labeled = LabeledMessage {
            id: "msg-1".into(),
            m: message,
            l: Label::Valid,
        };
        mount_query_page(&inbox_server, vec![labeled]).await;

        let identity = StubIdentity {
            bucket_endpoint: bucket_server.uri(),
        };
        let result = discover(
            &identity,
            &bucket_client(),
            &inbox_client(),
            None,
            &[inbox_server.uri()],
            &["c1".to_string(), "c2".to_string()],
            &json!({}),
            None,
        )
        .await
        .expect("discover");

        let objects: Vec<&Object> = result
            .events
            .iter()
            .filter_map(|e| match e {
                DiscoverEvent::Object(o) => Some(o),
                _ => None,
            })
            .collect();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].channels, vec!["c1".to_string(), "c2".to_string()]);
    }
}
