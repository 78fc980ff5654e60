//! # graffiti-engine crate lints
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

//! # graffiti-engine
//!
//! The top-level flows that compose every other crate (§4.H, §4.I): `post`
//! encodes an object, writes it to the author's bucket, and dispatches it
//! to every recipient or shared inbox plus a self-announcement; `get`,
//! `delete`, and `discover` merge and validate per-endpoint inbox streams
//! into the client's view of the world. Identity resolution stays an
//! external collaborator ([`identity::IdentityResolver`]) — this crate
//! consumes it, never implements it.

/// Local error type for this crate.
pub mod error;
/// The `IdentityResolver` collaborator interface (§1).
pub mod identity;
/// `post`: encode, store, fan out, self-announce (§4.H).
pub mod announce;
/// `get`, `delete`, `discover`: the merged, validated, resumable discovery
/// pipeline (§4.I).
pub mod discover;
/// Process-wide `tracing` subscriber setup.
pub mod telemetry;

pub use announce::post;
pub use discover::{delete, discover, get, DiscoverEvent, DiscoverResult};
pub use error::EngineError;
pub use identity::IdentityResolver;
pub use telemetry::init_tracing;
