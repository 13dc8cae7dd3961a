//! Route guard: the per-navigation access decision.
//!
//! [`evaluate`] is a pure function of the session state and the route's
//! requirement. Callers re-run it on every session change; nothing is cached.

use serde::Serialize;

use super::role_policy::{default_route_for, role_satisfies};
use crate::models::{Route, RouteRequirement, SessionState};

/// Where the guard state machine stands for one navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardState {
    Loading,
    Unauthenticated,
    AuthenticatedAuthorized,
    AuthenticatedUnauthorized,
    /// Signed in, on a page meant for anonymous visitors
    AuthenticatedPublicOnly,
}

/// What the UI must do for the navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GuardDecision {
    /// Session still restoring: show a placeholder, do not redirect
    ShowLoading,
    /// Send to the login page; `from` is where to return after sign-in
    RedirectToLogin { from: String },
    Redirect { to: Route },
    Render,
}

impl GuardDecision {
    pub fn is_render(&self) -> bool {
        matches!(self, GuardDecision::Render)
    }

    /// Redirect target, if any
    pub fn target(&self) -> Option<String> {
        match self {
            GuardDecision::RedirectToLogin { .. } => Some(Route::Login.path().to_string()),
            GuardDecision::Redirect { to } => Some(to.path().to_string()),
            GuardDecision::ShowLoading | GuardDecision::Render => None,
        }
    }
}

/// Decision plus the state it was reached in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardOutcome {
    pub state: GuardState,
    pub decision: GuardDecision,
}

/// Decide a navigation to `location` guarded by `requirement`.
///
/// Checks run in a fixed order: loading, authentication, role, public-only.
pub fn evaluate(session: &SessionState, requirement: &RouteRequirement, location: &str) -> GuardOutcome {
    if session.is_loading {
        return GuardOutcome {
            state: GuardState::Loading,
            decision: GuardDecision::ShowLoading,
        };
    }

    let identity = match &session.identity {
        Some(identity) => identity,
        None if requirement.allow_unauthenticated => {
            return GuardOutcome {
                state: GuardState::AuthenticatedAuthorized,
                decision: GuardDecision::Render,
            };
        }
        None => {
            return GuardOutcome {
                state: GuardState::Unauthenticated,
                decision: GuardDecision::RedirectToLogin {
                    from: location.to_string(),
                },
            };
        }
    };

    if !requirement.required_roles.is_empty() && !role_satisfies(identity.role, &requirement.required_roles) {
        let to = requirement
            .fallback_route
            .unwrap_or_else(|| default_route_for(Some(identity.role)));
        tracing::debug!("Role {} may not open {}, redirecting to {}", identity.role, location, to);
        return GuardOutcome {
            state: GuardState::AuthenticatedUnauthorized,
            decision: GuardDecision::Redirect { to },
        };
    }

    if requirement.redirect_authenticated {
        return GuardOutcome {
            state: GuardState::AuthenticatedPublicOnly,
            decision: GuardDecision::Redirect {
                to: default_route_for(Some(identity.role)),
            },
        };
    }

    GuardOutcome {
        state: GuardState::AuthenticatedAuthorized,
        decision: GuardDecision::Render,
    }
}
