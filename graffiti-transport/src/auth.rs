//! The `GET /auth` call shared by storage buckets and inboxes (§6): a text
//! body naming the authorization endpoint that governs a service. Used by
//! the session manager to group an actor's services before running one
//! authorization flow per group (§4.J).

use crate::clock::{Clock, SystemClock};
use crate::error::TransportError;
use crate::retry::{send_with_retry, RetryPolicy};
use reqwest::Client;
use std::sync::Arc;

/// Fetches the authorization endpoint a service advertises via `GET /auth`.
pub async fn fetch_auth_endpoint(
    http: &Client,
    clock: &Arc<dyn Clock>,
    retry_policy: &RetryPolicy,
    service_endpoint: &str,
) -> Result<String, TransportError> {
    let url = format!("{service_endpoint}/auth");
    let resp = send_with_retry(clock, retry_policy, || http.get(&url)).await?;
    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        return Err(TransportError::Status {
            status: status.as_u16(),
            message: text,
        });
    }
    Ok(text.trim().to_string())
}

/// Convenience wrapper pairing an [`reqwest::Client`] with the system clock
/// and a default retry policy, for callers that don't need to customize
/// either.
pub async fn fetch_auth_endpoint_default(
    http: &Client,
    service_endpoint: &str,
) -> Result<String, TransportError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    fetch_auth_endpoint(http, &clock, &RetryPolicy::default(), service_endpoint).await
}
