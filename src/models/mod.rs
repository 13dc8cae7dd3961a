//! Data models for the OPAC portal client

pub mod route;
pub mod session;
pub mod user;

// Re-export commonly used types
pub use route::{Route, RouteRequirement};
pub use session::{CredentialPair, SessionState};
pub use user::{AuthResponse, Identity, ProfileUpdate, RefreshedTokens, RegistrationFields, Role};
