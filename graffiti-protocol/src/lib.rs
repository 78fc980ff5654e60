//! # graffiti-protocol crate lints
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

//! # graffiti-protocol
//!
//! Object encoding and validation (§4.E): the canonical CBOR envelope, the
//! object URL grammar, the polymorphic message metadata, and the
//! `encode`/`validate` pipeline that binds an object's bytes to its URL,
//! channel attestations, and allowed-list tickets.

/// Local error type for this crate.
pub mod error;
/// Canonical CBOR (de)serialization of envelope and metadata structures.
pub mod envelope;
/// The `graffiti:` object URL grammar.
pub mod url;
/// The polymorphic message metadata tagged sum (§3).
pub mod metadata;
/// `encode`/`validate` for posts against the binary envelope.
pub mod object;

pub use error::ProtocolError;
