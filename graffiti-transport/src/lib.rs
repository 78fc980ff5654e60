//! # graffiti-transport crate lints
//!
//! This crate enforces a strict set of lints to ensure high-quality,
//! panic-free, and well-documented code. Panics are disallowed in non-test
//! code to promote robust error handling.
#![cfg_attr(
    not(test),
    deny(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::panic,
        clippy::indexing_slicing
    )
)]
#![forbid(unsafe_code)]

//! # graffiti-transport
//!
//! The HTTP surface of the graffiti protocol client (§4.F, §4.G, §6): the
//! inbox client (`send`/`label`/`get`/`query`/`export`, cache-first reads,
//! the resumable cursor, the per-query advisory lock, rate-limit backoff)
//! and the storage bucket client (`put`/`get`/`delete`/`export`, byte-capped
//! streaming reads).

/// Local error type for this crate.
pub mod error;
/// An injectable wall-clock for testable retry/backoff (§5).
pub mod clock;
/// Backoff and retry for 429/5xx responses, honoring `Retry-After`.
pub mod retry;
/// The inbox endpoint client (§4.F).
pub mod inbox;
/// The storage bucket client (§4.G).
pub mod bucket;
/// The `GET /auth` call shared by buckets and inboxes (§6, §4.J).
pub mod auth;

pub use bucket::StorageBucketClient;
pub use clock::{Clock, SystemClock};
pub use error::TransportError;
pub use inbox::{InboxClient, InboxQuery};
pub use retry::RetryPolicy;
