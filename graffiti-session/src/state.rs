//! The login/logout state machine (§4.J, §9 "Event-driven session
//! manager").
//!
//! The source models this as events bridging page redirects in a browser;
//! this native client collapses it to the straight state machine §9
//! describes for non-browser targets, resumed from persisted `InProgress`
//! records at startup rather than from in-memory event replay.

use serde::{Deserialize, Serialize};

/// The login/logout state of one actor's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoginState {
    /// No session; no flow in progress.
    LoggedOut,
    /// A login is underway; `groups_complete` of `groups_total`
    /// authorization groups have produced a token.
    LoggingIn {
        /// Total number of authorization-endpoint groups being acquired.
        groups_total: usize,
        /// Groups that have completed so far.
        groups_complete: usize,
    },
    /// Every group has a token and the session is usable.
    LoggedIn,
    /// A logout is underway; `groups_complete` of `groups_total` groups have
    /// had their token revoked.
    LoggingOut {
        /// Total number of authorization-endpoint groups being revoked.
        groups_total: usize,
        /// Groups that have completed so far.
        groups_complete: usize,
    },
}

/// An event driving the login/logout state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A login flow has begun, acquiring tokens for `groups_total` distinct
    /// authorization endpoints.
    LoginStarted {
        /// Total number of authorization-endpoint groups being acquired.
        groups_total: usize,
    },
    /// One authorization group produced a token.
    AuthGroupComplete,
    /// Every group has a token.
    LoginComplete,
    /// A logout flow has begun, revoking tokens for `groups_total` distinct
    /// authorization endpoints.
    LogoutStarted {
        /// Total number of authorization-endpoint groups being revoked.
        groups_total: usize,
    },
    /// One authorization group's token was revoked.
    LogoutGroupComplete,
    /// Every group's token has been revoked.
    LogoutComplete,
}

impl LoginState {
    /// Applies `event` to this state, returning the resulting state or an
    /// error describing why the transition is not allowed.
    pub fn apply(self, event: Event) -> Result<LoginState, String> {
        match (self, event) {
            (LoginState::LoggedOut, Event::LoginStarted { groups_total }) => {
                Ok(LoginState::LoggingIn {
                    groups_total,
                    groups_complete: 0,
                })
            }
            (
                LoginState::LoggingIn {
                    groups_total,
                    groups_complete,
                },
                Event::AuthGroupComplete,
            ) => Ok(LoginState::LoggingIn {
                groups_total,
                groups_complete: groups_complete.saturating_add(1).min(groups_total),
            }),
            (
                LoginState::LoggingIn {
                    groups_total,
                    groups_complete,
                },
                Event::LoginComplete,
            ) => {
                if groups_complete < groups_total {
                    return Err(format!(
                        "login completed with only {groups_complete}/{groups_total} groups done"
                    ));
                }
                Ok(LoginState::LoggedIn)
            }
            (LoginState::LoggedIn, Event::LogoutStarted { groups_total }) => {
                Ok(LoginState::LoggingOut {
                    groups_total,
                    groups_complete: 0,
                })
            }
            (
                LoginState::LoggingOut {
                    groups_total,
                    groups_complete,
                },
                Event::LogoutGroupComplete,
            ) => Ok(LoginState::LoggingOut {
                groups_total,
                groups_complete: groups_complete.saturating_add(1).min(groups_total),
            }),
            (
                LoginState::LoggingOut {
                    groups_total,
                    groups_complete,
                },
                Event::LogoutComplete,
            ) => {
                if groups_complete < groups_total {
                    return Err(format!(
                        "logout completed with only {groups_complete}/{groups_total} groups done"
                    ));
                }
                Ok(LoginState::LoggedOut)
            }
            (state, event) => Err(format!("{event:?} is not valid from {state:?}")),
        }
    }
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::LoginStarted { groups_total } => {
                write!(f, "LoginStarted({groups_total})")
            }
            Event::AuthGroupComplete => write!(f, "AuthGroupComplete"),
            Event::LoginComplete => write!(f, "LoginComplete"),
            Event::LogoutStarted { groups_total } => {
                write!(f, "LogoutStarted({groups_total})")
            }
            Event::LogoutGroupComplete => write!(f, "LogoutGroupComplete"),
            Event::LogoutComplete => write!(f, "LogoutComplete"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_login_then_logout_cycle() {
        let mut state = LoginState::LoggedOut;
        state = state.apply(Event::LoginStarted { groups_total: 2 }).unwrap();
        state = state.apply(Event::AuthGroupComplete).unwrap();
        assert_eq!(
            state,
            LoginState::LoggingIn {
                groups_total: 2,
                groups_complete: 1
            }
        );
        state = state.apply(Event::AuthGroupComplete).unwrap();
        state = state.apply(Event::LoginComplete).unwrap();
        assert_eq!(state, LoginState::LoggedIn);

        state = state.apply(Event::LogoutStarted { groups_total: 2 }).unwrap();
        state = state.apply(Event::LogoutGroupComplete).unwrap();
        state = state.apply(Event::LogoutGroupComplete).unwrap();
        state = state.apply(Event::LogoutComplete).unwrap();
        assert_eq!(state, LoginState::LoggedOut);
    }

    #[test]
    fn login_complete_before_all_groups_done_is_rejected() {
        let state = LoginState::LoggingIn {
            groups_total: 2,
            groups_complete: 1,
        };
        assert!(state.apply(Event::LoginComplete).is_err());
    }

    #[test]
    fn login_started_from_logged_in_is_rejected() {
        let state = LoginState::LoggedIn;
        assert!(state.apply(Event::LoginStarted { groups_total: 1 }).is_err());
    }

    #[test]
    fn zero_group_login_completes_immediately() {
        let mut state = LoginState::LoggedOut;
        state = state.apply(Event::LoginStarted { groups_total: 0 }).unwrap();
        state = state.apply(Event::LoginComplete).unwrap();
        assert_eq!(state, LoginState::LoggedIn);
    }
}
