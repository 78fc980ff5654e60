//! # graffiti-session crate lints
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

//! # graffiti-session
//!
//! Multi-service authorization and session persistence (§4.J, §6, §9): groups
//! an actor's services by authorization endpoint, drives the login/logout
//! state machine through an external [`auth_client::AuthorizationClient`],
//! and persists the result so a restarted process (or, in a browser, a
//! redirect back from an authorization endpoint) can resume in place.

/// Local error type for this crate.
pub mod error;
/// The login/logout state machine (§4.J, §9).
pub mod state;
/// The external authorization collaborator interface.
pub mod auth_client;
/// Persistence for logged-in sessions and in-flight login/logout records
/// (§6).
pub mod store;
/// The session manager orchestrating login, logout, resume, and resolution.
pub mod manager;

pub use auth_client::AuthorizationClient;
pub use error::SessionError;
pub use manager::SessionManager;
pub use state::{Event, LoginState};
pub use store::{
    AuthGroup, FileSessionStore, InMemorySessionStore, LoginInProgress, LogoutInProgress,
    SessionStore, SharedSessionStore,
};
