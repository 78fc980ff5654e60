//! The inbox endpoint client (§4.F): `send`/`label`/`get`/`query`/`export`,
//! backed by the local cache and the single-writer-per-query-key advisory
//! lock.

use crate::clock::{Clock, SystemClock};
use crate::error::TransportError;
use crate::retry::{send_with_retry, RetryPolicy};
use graffiti_cache::lock::QueryLockTable;
use graffiti_cache::{CacheKey, InboxCache, QueryCacheEntry};
use graffiti_protocol::envelope::{from_canonical_bytes, to_canonical_bytes};
use graffiti_types::cursor::InboxCursor;
use graffiti_types::label::{Label, LabeledMessage};
use graffiti_types::message::{Message, Tag};
use rand::RngCore;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const QUERY_REQUEST_TYPE: &str = "query";
const EXPORT_REQUEST_TYPE: &str = "export";

#[derive(Debug, Serialize, Deserialize)]
struct SendResponse {
    id: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct LabelRequest {
    l: u8,
}

#[derive(Debug, Serialize, Deserialize)]
struct QueryRequestBody {
    tags: Vec<Tag>,
    schema: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct PageResponse {
    results: Vec<LabeledMessage>,
    #[serde(rename = "hasMore")]
    has_more: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    cursor: Option<String>,
}

fn fresh_version() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn composite_message_key(endpoint: &str, id: &str) -> String {
    format!(
        "{}:{}",
        graffiti_crypto::codec::encode(endpoint.as_bytes()),
        graffiti_crypto::codec::encode(id.as_bytes())
    )
}

struct Inner {
    http: Client,
    clock: Arc<dyn Clock>,
    retry_policy: RetryPolicy,
    cache: Arc<dyn InboxCache>,
    locks: QueryLockTable,
}

/// An inbox endpoint client.
#[derive(Clone)]
pub struct InboxClient(Arc<Inner>);

impl InboxClient {
    /// Builds a client over `cache`, which may be shared across many
    /// endpoints — cache keys are scoped per endpoint.
    pub fn new(http: Client, cache: Arc<dyn InboxCache>) -> Self {
        Self(Arc::new(Inner {
            http,
            clock: Arc::new(SystemClock),
            retry_policy: RetryPolicy::default(),
            cache,
            locks: QueryLockTable::new(),
        }))
    }

    /// Overrides the clock driving retry backoff and rate-limit waits.
    pub fn with_clock(self, clock: Arc<dyn Clock>) -> Self {
        Self(Arc::new(Inner {
            http: self.0.http.clone(),
            clock,
            retry_policy: self.0.retry_policy,
            cache: self.0.cache.clone(),
            locks: QueryLockTable::new(),
        }))
    }

    /// Overrides the retry/backoff policy.
    pub fn with_retry_policy(self, retry_policy: RetryPolicy) -> Self {
        Self(Arc::new(Inner {
            http: self.0.http.clone(),
            clock: self.0.clock.clone(),
            retry_policy,
            cache: self.0.cache.clone(),
            locks: QueryLockTable::new(),
        }))
    }

    /// Sends `message`, returning the server-assigned message id.
    pub async fn send(&self, endpoint: &str, message: &Message) -> Result<String, TransportError> {
        let body = to_canonical_bytes(message)?;
        let url = format!("{endpoint}/send");
        let bytes = execute(&self.0, || self.0.http.put(&url).body(body.clone())).await?;
        let resp: SendResponse = from_canonical_bytes(&bytes)?;
        Ok(resp.id)
    }

    /// Relabels message `id` at the server, then updates the local cache copy
    /// so offline validation of it is skipped afterward.
    pub async fn label(
        &self,
        endpoint: &str,
        id: &str,
        label: Label,
        token: &str,
    ) -> Result<(), TransportError> {
        let body = to_canonical_bytes(&LabelRequest { l: label.as_u8() })?;
        let url = format!("{endpoint}/label/{id}");
        let token = token.to_string();
        execute(&self.0, || {
            self.0
                .http
                .put(&url)
                .bearer_auth(&token)
                .body(body.clone())
        })
        .await?;

        let composite_key = composite_message_key(endpoint, id);
        if let Some(mut cached) = self.0.cache.get_message(&composite_key).await? {
            cached.l = label;
            self.0.cache.put_message(&composite_key, &cached).await?;
        }
        Ok(())
    }

    /// Fetches message `id`, preferring the local cache.
    pub async fn get(
        &self,
        endpoint: &str,
        id: &str,
        token: Option<&str>,
    ) -> Result<LabeledMessage, TransportError> {
        let composite_key = composite_message_key(endpoint, id);
        if let Some(cached) = self.0.cache.get_message(&composite_key).await? {
            return Ok(cached);
        }
        let url = format!("{endpoint}/message/{id}");
        let bytes = execute(&self.0, || {
            let builder = self.0.http.get(&url);
            match token {
                Some(t) => builder.bearer_auth(t),
                None => builder,
            }
        })
        .await?;
        let message: LabeledMessage = from_canonical_bytes(&bytes)?;
        self.0.cache.put_message(&composite_key, &message).await?;
        Ok(message)
    }

    /// Opens a fresh, resumable query stream over messages tagged with any of
    /// `tags` and matching `schema`.
    pub fn query(
        &self,
        endpoint: impl Into<String>,
        tags: Vec<Tag>,
        schema: serde_json::Value,
        token: Option<String>,
    ) -> Result<InboxQuery, TransportError> {
        let endpoint = endpoint.into();
        let body = to_canonical_bytes(&QueryRequestBody {
            tags: tags.clone(),
            schema: schema.clone(),
        })?;
        let cache_key = CacheKey::for_request(&endpoint, QUERY_REQUEST_TYPE, Some(&body))?;
        Ok(InboxQuery {
            inner: self.0.clone(),
            endpoint,
            path: "/query",
            tags,
            schema,
            token,
            cache_key,
            state: QueryCacheEntry::fresh(fresh_version()),
            exhausted: false,
            is_continuation: false,
        })
    }

    /// Opens a fresh export stream (keys and values, unfiltered).
    pub fn export(&self, endpoint: impl Into<String>, token: String) -> Result<InboxQuery, TransportError> {
        let endpoint = endpoint.into();
        let cache_key = CacheKey::for_request(&endpoint, EXPORT_REQUEST_TYPE, None)?;
        Ok(InboxQuery {
            inner: self.0.clone(),
            endpoint,
            path: "/export",
            tags: Vec::new(),
            schema: serde_json::Value::Null,
            token: Some(token),
            cache_key,
            state: QueryCacheEntry::fresh(fresh_version()),
            exhausted: false,
            is_continuation: false,
        })
    }

    /// Resumes a previously serialized query or export stream. A mismatch
    /// between `cursor.version` and the cache's current version for that key
    /// surfaces immediately as a `410`, mapped to `CursorExpired` by
    /// [`graffiti_types::error::CoreError::from_http_status`].
    pub async fn resume(
        &self,
        cursor: InboxCursor,
        endpoint: impl Into<String>,
        path: &'static str,
        tags: Vec<Tag>,
        token: Option<String>,
    ) -> Result<InboxQuery, TransportError> {
        let endpoint = endpoint.into();
        let cache_key = CacheKey::from_hex(&cursor.cache_key)?;
        let cached = self.0.cache.get_query_state(cache_key).await?;
        let state = match cached {
            Some(state) if state.version == cursor.version => state,
            _ => {
                self.0.cache.delete_query_state(cache_key).await?;
                return Err(TransportError::Status {
                    status: 410,
                    message: "cached cursor version does not match the resumed cursor".into(),
                });
            }
        };
        Ok(InboxQuery {
            inner: self.0.clone(),
            endpoint,
            path,
            tags,
            schema: cursor.schema,
            token,
            cache_key,
            state,
            exhausted: false,
            is_continuation: true,
        })
    }
}

async fn execute(
    inner: &Inner,
    build: impl FnMut() -> reqwest::RequestBuilder,
) -> Result<Vec<u8>, TransportError> {
    let resp = send_with_retry(&inner.clock, &inner.retry_policy, build).await?;
    let status = resp.status();
    let bytes = resp.bytes().await?;
    if status.is_success() {
        Ok(bytes.to_vec())
    } else {
        let message = String::from_utf8_lossy(&bytes).into_owned();
        Err(TransportError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

/// A resumable, single-writer-per-key query or export stream (§4.F).
///
/// Advance it with [`InboxQuery::next`]; the discovery pipeline races many of
/// these concurrently via a per-iterator `next()` (§4.I).
pub struct InboxQuery {
    inner: Arc<Inner>,
    endpoint: String,
    path: &'static str,
    tags: Vec<Tag>,
    schema: serde_json::Value,
    token: Option<String>,
    cache_key: CacheKey,
    state: QueryCacheEntry,
    exhausted: bool,
    is_continuation: bool,
}

impl InboxQuery {
    /// Fetches the next page of not-yet-seen messages, or `None` once this
    /// stream has caught up to the server's current state.
    pub async fn next(&mut self) -> Result<Option<Vec<LabeledMessage>>, TransportError> {
        if self.exhausted {
            return Ok(None);
        }
        let _lock = self.inner.locks.lock(self.cache_key).await;

        loop {
            if let Some(wait_until) = self.state.wait_until_epoch_millis {
                let now = self.inner.clock.now_millis();
                if wait_until > now {
                    self.inner
                        .clock
                        .sleep(Duration::from_millis((wait_until - now) as u64))
                        .await;
                }
                self.state.wait_until_epoch_millis = None;
            }

            let url = match &self.state.cursor {
                Some(c) => format!("{}{}?cursor={}", self.endpoint, self.path, c),
                None => format!("{}{}", self.endpoint, self.path),
            };
            let body = if self.state.cursor.is_some() || self.path == "/export" {
                Vec::new()
            } else {
                to_canonical_bytes(&QueryRequestBody {
                    tags: self.tags.clone(),
                    schema: self.schema.clone(),
                })?
            };
            let token = self.token.clone();
            let resp = send_with_retry(&self.inner.clock, &self.inner.retry_policy, || {
                let builder = if body.is_empty() {
                    self.inner.http.post(&url)
                } else {
                    self.inner.http.post(&url).body(body.clone())
                };
                match &token {
                    Some(t) => builder.bearer_auth(t),
                    None => builder,
                }
            })
            .await?;

            let status = resp.status();
            let headers = resp.headers().clone();

            if status.as_u16() == 410 {
                self.inner.cache.delete_query_state(self.cache_key).await?;
                if self.is_continuation {
                    self.exhausted = true;
                    return Err(TransportError::Status {
                        status: 410,
                        message: "server cursor expired".into(),
                    });
                }
                self.state = QueryCacheEntry::fresh(fresh_version());
                self.is_continuation = false;
                continue;
            }

            let bytes = resp.bytes().await?;
            if !status.is_success() {
                let message = String::from_utf8_lossy(&bytes).into_owned();
                return Err(TransportError::Status {
                    status: status.as_u16(),
                    message,
                });
            }

            let page: PageResponse = from_canonical_bytes(&bytes)?;
            let mut fresh_messages = Vec::with_capacity(page.results.len());
            for message in page.results {
                if !self.state.has_seen(&message.id) {
                    self.state.mark_seen(message.id.clone());
                    fresh_messages.push(message);
                }
            }
            self.state.cursor = page.cursor;
            if !page.has_more {
                self.exhausted = true;
            }
            if let Some(seconds) = headers
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<i64>().ok())
            {
                self.state.wait_until_epoch_millis =
                    Some(self.inner.clock.now_millis() + seconds * 1000);
            }
            self.inner
                .cache
                .put_query_state(self.cache_key, &self.state)
                .await?;

            return Ok(Some(fresh_messages));
        }
    }

    /// Serializes this stream's resumable position (§4.F cursor shape).
    pub fn cursor(&self) -> InboxCursor {
        InboxCursor {
            cache_key: self.cache_key.to_hex(),
            version: self.state.version.clone(),
            num_seen: self.state.message_ids.len() as u64,
            schema: self.schema.clone(),
        }
    }

    /// `true` once this stream has caught up to the server's current state.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use graffiti_cache::InMemoryInboxCache;
    use graffiti_types::object::Object;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_message() -> Message {
        Message {
            t: vec![Tag::for_url("graffiti:a:b")],
            o: Object {
                url: "graffiti:a:b".into(),
                actor: "did:web:a.test".into(),
                value: json!({"m": "hi"}),
                channels: vec![],
                allowed: None,
            },
            m: vec![1, 2, 3],
        }
    }

    fn sample_labeled(id: &str, label: Label) -> LabeledMessage {
        LabeledMessage {
            id: id.to_string(),
            m: sample_message(),
            l: label,
        }
    }

    fn client(server: &MockServer) -> InboxClient {
        let _ = server;
        InboxClient::new(
            reqwest::Client::new(),
            Arc::new(InMemoryInboxCache::new()),
        )
        .with_clock(Arc::new(FakeClock::new(0)))
    }

    #[tokio::test]
    async fn send_returns_the_server_assigned_id() {
        let server = MockServer::start().await;
        let body = to_canonical_bytes(&SendResponse { id: "msg-1".into() }).unwrap();
        Mock::given(method("PUT"))
            .and(path("/send"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&server)
            .await;

        let client = client(&server);
        let id = client
            .send(&server.uri(), &sample_message())
            .await
            .expect("send");
        assert_eq!(id, "msg-1");
    }

    #[tokio::test]
    async fn get_is_cache_first() {
        let server = MockServer::start().await;
        // No mock mounted for /message/{id}: a network hit would panic.
        let client = client(&server);
        let composite_key = composite_message_key(&server.uri(), "msg-1");
        let cached = sample_labeled("msg-1", Label::Valid);
        client
            .0
            .cache
            .put_message(&composite_key, &cached)
            .await
            .unwrap();

        let got = client.get(&server.uri(), "msg-1", None).await.unwrap();
        assert_eq!(got, cached);
    }

    #[tokio::test]
    async fn query_dedupes_across_pages_and_reports_exhaustion() {
        let server = MockServer::start().await;
        let page1 = to_canonical_bytes(&PageResponse {
            results: vec![sample_labeled("m1", Label::Valid)],
            has_more: true,
            cursor: Some("page2".into()),
        })
        .unwrap();
        let page2 = to_canonical_bytes(&PageResponse {
            results: vec![sample_labeled("m1", Label::Valid), sample_labeled("m2", Label::Valid)],
            has_more: false,
            cursor: None,
        })
        .unwrap();
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(page1))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(page2))
            .mount(&server)
            .await;

        let client = client(&server);
        let mut query = client
            .query(server.uri(), vec![], json!({}), None)
            .unwrap();

        let first = query.next().await.unwrap().unwrap();
        assert_eq!(first.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), vec!["m1"]);
        assert!(!query.is_exhausted());

        let second = query.next().await.unwrap().unwrap();
        assert_eq!(second.iter().map(|m| m.id.as_str()).collect::<Vec<_>>(), vec!["m2"]);
        assert!(query.is_exhausted());
    }

    #[tokio::test]
    async fn resume_with_a_stale_version_surfaces_cursor_expired() {
        let server = MockServer::start().await;
        let client = client(&server);
        let cursor = InboxCursor {
            cache_key: CacheKey::for_request(&server.uri(), QUERY_REQUEST_TYPE, None)
                .unwrap()
                .to_hex(),
            version: "stale-version".into(),
            num_seen: 0,
            schema: json!({}),
        };
        let err = client
            .resume(cursor, server.uri(), "/query", vec![], None)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Status { status: 410, .. }));
    }
}
