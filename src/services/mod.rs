//! Session, policy and routing services

pub mod auth;
pub mod guard;
pub mod role_policy;
pub mod routes;
pub mod session_store;

pub use auth::AuthSessionManager;
pub use guard::{evaluate, GuardDecision, GuardOutcome, GuardState};
pub use role_policy::{default_route_for, role_satisfies, visible_menu, MenuItem, RoleCheck};
pub use routes::{Navigation, RouteTable};
pub use session_store::{FileSessionStore, MemorySessionStore, SessionStore};
