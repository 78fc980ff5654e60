//! # graffiti-cache crate lints
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

//! # graffiti-cache
//!
//! The local cache backing the inbox client (§4.F, §6): labeled messages
//! keyed by composite url/id, and per-query cursor state keyed by a
//! [`key::CacheKey`]. Two backends implement [`store::InboxCache`]: a
//! `redb`-backed one for on-disk persistence across restarts, and an
//! in-memory one for anonymous/ephemeral sessions.

/// Local error type for this crate.
pub mod error;
/// The per-query cache key derivation (§4.F).
pub mod key;
/// The per-query advisory lock (§5 "Shared-resource policy").
pub mod lock;
/// Per-query cursor state persisted alongside the cache (§6).
pub mod query_state;
/// The `InboxCache` trait and its `redb`/in-memory implementations.
pub mod store;

pub use error::CacheError;
pub use key::CacheKey;
pub use query_state::QueryCacheEntry;
pub use store::{InMemoryInboxCache, InboxCache, RedbInboxCache};
