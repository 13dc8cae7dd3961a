//! Route table of the portal and path resolution

use crate::{
    config::FeaturesConfig,
    models::{Role, Route, RouteRequirement, SessionState},
    services::{
        guard::{evaluate, GuardDecision, GuardOutcome, GuardState},
        role_policy::default_route_for,
    },
};

#[derive(Debug, Clone)]
enum Target {
    Page { route: Route, requirement: RouteRequirement },
    /// `/`: signed-in users go to their dashboard, everyone else to the catalog
    Landing,
}

#[derive(Debug, Clone)]
struct Entry {
    path: &'static str,
    /// Also governs every path below `path`
    nested: bool,
    target: Target,
}

/// Result of resolving a requested location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub route: Route,
    pub outcome: GuardOutcome,
}

impl Navigation {
    pub fn decision(&self) -> &GuardDecision {
        &self.outcome.decision
    }
}

#[derive(Debug, Clone)]
pub struct RouteTable {
    entries: Vec<Entry>,
}

impl RouteTable {
    /// The portal's routes, honouring the registration and guest-access switches
    pub fn portal(features: &FeaturesConfig) -> Self {
        let catalog = if features.enable_guest_access {
            RouteRequirement::public()
        } else {
            RouteRequirement::authenticated()
        };

        let mut entries = vec![
            Entry { path: "/", nested: false, target: Target::Landing },
            page("/opac", true, Route::Opac, catalog),
            page("/login", false, Route::Login, RouteRequirement::public_only()),
            page("/admin", true, Route::AdminHome, RouteRequirement::roles([Role::Admin])),
            page(
                "/librarian",
                true,
                Route::LibrarianHome,
                RouteRequirement::roles([Role::Admin, Role::Librarian]),
            ),
            page(
                "/student",
                true,
                Route::StudentHome,
                RouteRequirement::roles([Role::Admin, Role::Librarian, Role::Student]),
            ),
            page("/unauthorized", false, Route::Unauthorized, RouteRequirement::public()),
        ];

        if features.enable_registration {
            entries.push(page("/register", false, Route::Register, RouteRequirement::public_only()));
        }

        Self { entries }
    }

    /// Requirement declared for `route`, if the table serves it
    pub fn requirement(&self, route: Route) -> Option<&RouteRequirement> {
        self.entries.iter().find_map(|entry| match &entry.target {
            Target::Page { route: r, requirement } if *r == route => Some(requirement),
            _ => None,
        })
    }

    /// Match `location` (path, optional query) and run the guard for it
    pub fn resolve(&self, location: &str, session: &SessionState) -> Navigation {
        let path = normalize(location);

        let Some(entry) = self.entries.iter().find(|entry| matches(entry, &path)) else {
            return Navigation {
                route: Route::NotFound,
                outcome: evaluate(session, &RouteRequirement::public(), location),
            };
        };

        match &entry.target {
            Target::Page { route, requirement } => Navigation {
                route: *route,
                outcome: evaluate(session, requirement, location),
            },
            Target::Landing => Navigation {
                route: Route::Opac,
                outcome: landing(session),
            },
        }
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::portal(&FeaturesConfig::default())
    }
}

fn page(path: &'static str, nested: bool, route: Route, requirement: RouteRequirement) -> Entry {
    Entry {
        path,
        nested,
        target: Target::Page { route, requirement },
    }
}

fn landing(session: &SessionState) -> GuardOutcome {
    if session.is_loading {
        return GuardOutcome {
            state: GuardState::Loading,
            decision: GuardDecision::ShowLoading,
        };
    }
    match session.role() {
        Some(role) => GuardOutcome {
            state: GuardState::AuthenticatedPublicOnly,
            decision: GuardDecision::Redirect {
                to: default_route_for(Some(role)),
            },
        },
        None => GuardOutcome {
            state: GuardState::Unauthenticated,
            decision: GuardDecision::Redirect { to: Route::Opac },
        },
    }
}

/// Drop query and fragment, ensure a leading slash, drop a trailing one
fn normalize(location: &str) -> String {
    let path = location
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn matches(entry: &Entry, path: &str) -> bool {
    if path == entry.path {
        return true;
    }
    entry.nested
        && path
            .strip_prefix(entry.path)
            .is_some_and(|rest| rest.starts_with('/'))
}
