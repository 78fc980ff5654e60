#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! # graffiti-types
//!
//! Foundational data structures and the error taxonomy shared by every crate
//! in the graffiti protocol client workspace.
//!
//! ## Architectural role
//!
//! As the base crate, `graffiti-types` has minimal dependencies (`serde`,
//! `serde_json`, `thiserror`) and is a dependency of almost every other crate
//! here. It defines the canonical shapes from the protocol's data model —
//! actors, objects, messages, sessions, cursors — without opinion on how they
//! are transported, cached, or cryptographically attested. Those concerns
//! live in `graffiti-crypto`, `graffiti-protocol`, `graffiti-transport`, and
//! `graffiti-engine`.

/// Actor identifiers and identity documents (external identity resolution's
/// return shape).
pub mod actor;
/// Process-wide configuration recognized by the client core.
pub mod config;
/// Opaque, resumable stream cursors for inbox queries and multi-endpoint
/// discovery.
pub mod cursor;
/// The unified error taxonomy (§7 of the specification) shared across crates.
pub mod error;
/// Labeled messages as servers tag them (`unlabeled`/`valid`/`trash`/`invalid`).
pub mod label;
/// Messages: the wire envelope that carries a tagged object between an
/// announcer and an inbox.
pub mod message;
/// Public-facing posts: `{url, actor, value, channels, allowed}`.
pub mod object;
/// Session state reconstituted from persisted authorization tokens.
pub mod session;

/// A crate-wide `Result` alias defaulting to [`error::CoreError`].
pub type Result<T, E = error::CoreError> = std::result::Result<T, E>;
