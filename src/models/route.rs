//! Portal routes and their access requirements

use std::collections::BTreeSet;

use serde::Serialize;

use super::user::Role;

/// Named destinations of the portal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Opac,
    Login,
    Register,
    AdminHome,
    LibrarianHome,
    StudentHome,
    Unauthorized,
    NotFound,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Opac => "/opac",
            Route::Login => "/login",
            Route::Register => "/register",
            Route::AdminHome => "/admin",
            Route::LibrarianHome => "/librarian",
            Route::StudentHome => "/student",
            Route::Unauthorized => "/unauthorized",
            Route::NotFound => "/404",
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path())
    }
}

/// Declarative access policy attached to a page. Built once when the route
/// table is composed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RouteRequirement {
    /// Roles allowed on the page, listed in full. Empty means any role.
    pub required_roles: BTreeSet<Role>,
    pub allow_unauthenticated: bool,
    /// Where to send an authenticated user lacking the role, instead of their dashboard
    pub fallback_route: Option<Route>,
    /// Public-only pages (login, register) send signed-in users to their dashboard
    pub redirect_authenticated: bool,
}

impl RouteRequirement {
    /// Any signed-in user
    pub fn authenticated() -> Self {
        Self::default()
    }

    /// Signed-in users holding one of `roles`
    pub fn roles(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            required_roles: roles.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Anyone, signed in or not
    pub fn public() -> Self {
        Self {
            allow_unauthenticated: true,
            ..Self::default()
        }
    }

    /// Anonymous visitors only
    pub fn public_only() -> Self {
        Self {
            allow_unauthenticated: true,
            redirect_authenticated: true,
            ..Self::default()
        }
    }

    pub fn with_fallback(mut self, route: Route) -> Self {
        self.fallback_route = Some(route);
        self
    }
}
