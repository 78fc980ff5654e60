//! Backoff and retry for 429/5xx responses and transient transport failures
//! (§4.F, §6 `Retry-After`), generalizing the fixed `tokio::time::sleep`
//! retry loops elsewhere into one routine parameterized over a
//! [`crate::clock::Clock`].

use crate::clock::Clock;
use crate::error::TransportError;
use reqwest::header::{HeaderValue, RETRY_AFTER};
use reqwest::{RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;

/// Bounds and pacing for [`send_with_retry`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt.
    pub max_retries: usize,
    /// Backoff before the first retry, doubled on each subsequent one.
    pub base_backoff: Duration,
    /// The backoff never exceeds this, whether computed or `Retry-After`.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 8,
            base_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32, retry_after: Option<&HeaderValue>) -> Duration {
        if let Some(seconds) = retry_after
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
        {
            return Duration::from_secs(seconds).min(self.max_backoff);
        }
        let exponent = attempt.min(20);
        let millis = self
            .base_backoff
            .as_millis()
            .saturating_mul(1u128 << exponent)
            .min(self.max_backoff.as_millis());
        Duration::from_millis(millis as u64)
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.as_u16() == 429 || status.is_server_error()
}

/// Issues a request built fresh by `build` on every attempt (so a retried
/// request is never a reused, already-consumed body), retrying transport
/// errors and `429`/`5xx` responses per `policy` and honoring an `Retry-After`
/// header when present.
///
/// Returns the raw [`Response`] for any non-retryable status, including
/// other 4xx errors — callers are responsible for turning those into
/// [`TransportError`] via their own status mapping.
pub async fn send_with_retry<F>(
    clock: &Arc<dyn Clock>,
    policy: &RetryPolicy,
    mut build: F,
) -> Result<Response, TransportError>
where
    F: FnMut() -> RequestBuilder,
{
    let mut attempt: u32 = 0;
    loop {
        match build().send().await {
            Ok(resp) => {
                let status = resp.status();
                if !is_retryable_status(status) {
                    return Ok(resp);
                }
                if (attempt as usize) >= policy.max_retries {
                    let message = resp.text().await.unwrap_or_default();
                    return Err(TransportError::Status {
                        status: status.as_u16(),
                        message,
                    });
                }
                let delay = policy.delay_for(attempt, resp.headers().get(RETRY_AFTER));
                tracing::debug!(
                    status = status.as_u16(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after a rate-limited or server-error response"
                );
                clock.sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                if (attempt as usize) >= policy.max_retries {
                    return Err(TransportError::Http(err));
                }
                let delay = policy.delay_for(attempt, None);
                tracing::debug!(attempt, error = %err, "retrying after a transport error");
                clock.sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn succeeds_immediately_on_a_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let clock: Arc<dyn Clock> = Arc::new(FakeClock::new(0));
        let http = reqwest::Client::new();
        let url = server.uri();
        let resp = send_with_retry(&clock, &RetryPolicy::default(), || http.get(&url))
            .await
            .expect("should succeed");
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn retries_a_503_then_succeeds_and_sleeps_between_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let clock = Arc::new(FakeClock::new(0));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let http = reqwest::Client::new();
        let url = server.uri();
        let resp = send_with_retry(&dyn_clock, &RetryPolicy::default(), || http.get(&url))
            .await
            .expect("should eventually succeed");
        assert_eq!(resp.status(), 200);
        assert_eq!(clock.sleeps().await.len(), 1);
    }

    #[tokio::test]
    async fn honors_retry_after_for_the_backoff_duration() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "2"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let clock = Arc::new(FakeClock::new(0));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let http = reqwest::Client::new();
        let url = server.uri();
        send_with_retry(&dyn_clock, &RetryPolicy::default(), || http.get(&url))
            .await
            .expect("should eventually succeed");
        assert_eq!(clock.sleeps().await, vec![Duration::from_secs(2)]);
    }

    #[tokio::test]
    async fn exhausting_retries_surfaces_the_last_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let clock: Arc<dyn Clock> = Arc::new(FakeClock::new(0));
        let policy = RetryPolicy {
            max_retries: 2,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(10),
        };
        let http = reqwest::Client::new();
        let url = server.uri();
        let err = send_with_retry(&clock, &policy, || http.get(&url))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Status { status: 500, .. }));
    }
}
