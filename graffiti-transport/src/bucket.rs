//! The storage bucket client (§4.G): `put`/`get`/`delete`/`export`, with a
//! byte-capped streaming `get`.

use crate::clock::{Clock, SystemClock};
use crate::error::TransportError;
use crate::retry::{send_with_retry, RetryPolicy};
use futures::StreamExt;
use graffiti_protocol::envelope::from_canonical_bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// `-`, `_`, `.`, `~` are unreserved and pass through unescaped; everything
/// else outside `[A-Za-z0-9]` is percent-encoded for the key path segment
/// (§6 `url-enc(key)`).
const PATH_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn url_enc_key(key: &str) -> String {
    utf8_percent_encode(key, PATH_SAFE).to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct ExportPage {
    keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    cursor: Option<String>,
}

/// A storage bucket endpoint client.
pub struct StorageBucketClient {
    http: Client,
    clock: Arc<dyn Clock>,
    retry_policy: RetryPolicy,
}

impl StorageBucketClient {
    /// Builds a bucket client over `http`.
    pub fn new(http: Client) -> Self {
        Self {
            http,
            clock: Arc::new(SystemClock),
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Overrides the clock driving retry backoff.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Overrides the retry/backoff policy.
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Writes `bytes` under `key`. Requires `token`.
    pub async fn put(
        &self,
        endpoint: &str,
        key: &str,
        bytes: Vec<u8>,
        token: &str,
    ) -> Result<(), TransportError> {
        let url = format!("{endpoint}/value/{}", url_enc_key(key));
        let resp = send_with_retry(&self.clock, &self.retry_policy, || {
            self.http.put(&url).bearer_auth(token).body(bytes.clone())
        })
        .await?;
        expect_success(resp).await
    }

    /// Deletes the value under `key`. Requires `token`.
    pub async fn delete(&self, endpoint: &str, key: &str, token: &str) -> Result<(), TransportError> {
        let url = format!("{endpoint}/value/{}", url_enc_key(key));
        let resp = send_with_retry(&self.clock, &self.retry_policy, || {
            self.http.delete(&url).bearer_auth(token)
        })
        .await?;
        expect_success(resp).await
    }

    /// Reads the value under `key`, capping it at `max_bytes` (defaulting to
    /// [`graffiti_types::config::MAX_OBJECT_SIZE_BYTES`]). No auth required.
    ///
    /// An advertised `Content-Length` over the cap fails fast without reading
    /// any body; in its absence, the running total is checked as the stream
    /// arrives. A stream that ends short of its advertised length fails as
    /// [`TransportError::UnexpectedEof`].
    pub async fn get(
        &self,
        endpoint: &str,
        key: &str,
        max_bytes: Option<usize>,
    ) -> Result<Vec<u8>, TransportError> {
        let max_bytes = max_bytes.unwrap_or(graffiti_types::config::MAX_OBJECT_SIZE_BYTES);
        let url = format!("{endpoint}/value/{}", url_enc_key(key));
        let resp = send_with_retry(&self.clock, &self.retry_policy, || self.http.get(&url)).await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let declared_len = resp.content_length();
        if let Some(len) = declared_len {
            if len as usize > max_bytes {
                return Err(TransportError::Truncated {
                    max: max_bytes,
                    got: len as usize,
                });
            }
        }

        let mut buf = Vec::with_capacity(declared_len.unwrap_or(0).min(max_bytes as u64) as usize);
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if buf.len() + chunk.len() > max_bytes {
                return Err(TransportError::Truncated {
                    max: max_bytes,
                    got: buf.len() + chunk.len(),
                });
            }
            buf.extend_from_slice(&chunk);
        }

        if let Some(len) = declared_len {
            if buf.len() as u64 != len {
                return Err(TransportError::UnexpectedEof {
                    expected: len as usize,
                    got: buf.len(),
                });
            }
        }
        Ok(buf)
    }

    /// Lists every key in the bucket, paged. Requires `token`.
    pub async fn export(&self, endpoint: &str, token: &str) -> Result<Vec<String>, TransportError> {
        let mut keys = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let url = match &cursor {
                Some(c) => format!("{endpoint}/export?cursor={c}"),
                None => format!("{endpoint}/export"),
            };
            let resp = send_with_retry(&self.clock, &self.retry_policy, || {
                self.http.get(&url).bearer_auth(token)
            })
            .await?;
            let status = resp.status();
            let bytes = resp.bytes().await?;
            if !status.is_success() {
                let message = String::from_utf8_lossy(&bytes).into_owned();
                return Err(TransportError::Status {
                    status: status.as_u16(),
                    message,
                });
            }
            let page: ExportPage = from_canonical_bytes(&bytes)?;
            keys.extend(page.keys);
            match page.cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(keys)
    }
}

async fn expect_success(resp: reqwest::Response) -> Result<(), TransportError> {
    let status = resp.status();
    if status.is_success() {
        Ok(())
    } else {
        let message = resp.text().await.unwrap_or_default();
        Err(TransportError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use graffiti_protocol::envelope::to_canonical_bytes;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(_server: &MockServer) -> StorageBucketClient {
        StorageBucketClient::new(reqwest::Client::new()).with_clock(Arc::new(FakeClock::new(0)))
    }

    #[tokio::test]
    async fn put_and_get_round_trip_a_value() {
        let server = MockServer::start().await;
        let key = "k1";
        Mock::given(method("PUT"))
            .and(path(format!("/value/{}", url_enc_key(key))))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/value/{}", url_enc_key(key))))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello".to_vec()))
            .mount(&server)
            .await;

        let client = client(&server);
        client
            .put(&server.uri(), key, b"hello".to_vec(), "tok")
            .await
            .expect("put");
        let got = client.get(&server.uri(), key, None).await.expect("get");
        assert_eq!(got, b"hello");
    }

    #[tokio::test]
    async fn get_rejects_a_content_length_over_the_cap() {
        let server = MockServer::start().await;
        let big = vec![0u8; 100];
        Mock::given(method("GET"))
            .and(path("/value/big"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(big))
            .mount(&server)
            .await;

        let client = client(&server);
        let err = client
            .get(&server.uri(), "big", Some(10))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Truncated { max: 10, .. }));
    }

    #[tokio::test]
    async fn delete_requires_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/value/k1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client(&server);
        client.delete(&server.uri(), "k1", "tok").await.expect("delete");
    }

    #[tokio::test]
    async fn export_follows_the_cursor_across_pages() {
        let server = MockServer::start().await;
        let page1 = to_canonical_bytes(&ExportPage {
            keys: vec!["a".into()],
            cursor: Some("p2".into()),
        })
        .unwrap();
        let page2 = to_canonical_bytes(&ExportPage {
            keys: vec!["b".into()],
            cursor: None,
        })
        .unwrap();
        Mock::given(method("GET"))
            .and(path("/export"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(page1))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/export"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(page2))
            .mount(&server)
            .await;

        let client = client(&server);
        let keys = client.export(&server.uri(), "tok").await.expect("export");
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }
}
