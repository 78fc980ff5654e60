//! # graffiti-crypto crate lints
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

//! # graffiti-crypto
//!
//! Content addressing and capability attestations for the graffiti protocol
//! (§4.A-D of the specification). Every primitive here is deterministic and
//! side-effect free except for the random material each attestation mixes
//! in (nonces, ticket bytes).

/// Self-describing byte codec (`u` + base64url, no padding) — §4.A.
pub mod codec;
/// Content addresses: multihash-prefixed SHA-256 of arbitrary bytes — §4.B.
pub mod address;
/// Per-channel Ed25519 keypairs and actor attestations — §4.C.
pub mod channel;
/// Per-recipient allowed-list tickets and HMAC attestations — §4.D.
pub mod allowed;
/// Local error type for this crate.
pub mod error;

pub use error::CryptoError;
