//! User identity and authentication payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Portal roles, as issued by the backend. Parsed case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Librarian,
    Student,
    /// Any role string this client does not know about
    Unknown,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Librarian => "librarian",
            Role::Student => "student",
            Role::Unknown => "unknown",
        }
    }

    /// Human-readable label, e.g. for menu headers
    pub fn label(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Librarian => "Librarian",
            Role::Student => "Student",
            Role::Unknown => "Guest",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "librarian" => Ok(Role::Librarian),
            "student" => Ok(Role::Student),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        s.parse().unwrap_or(Role::Unknown)
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let role = String::deserialize(deserializer)?;
        Ok(Role::from(role.as_str()))
    }
}

fn default_active() -> bool {
    true
}

/// Authenticated user's profile and role.
///
/// Replaced wholesale on profile update, never patched field by field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(rename = "full_name", default)]
    pub display_name: String,
    pub role: Role,
    /// The profile endpoint omits this flag; only active users can hold a session anyway
    #[serde(rename = "is_active", default = "default_active")]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Identity {
    /// Display name, falling back to a placeholder when the profile has none
    pub fn name(&self) -> &str {
        if self.display_name.trim().is_empty() {
            "Unknown User"
        } else {
            self.display_name.trim()
        }
    }

    /// Avatar initials: first letter of the first and last name parts
    pub fn initials(&self) -> String {
        let parts: Vec<&str> = self.display_name.split_whitespace().collect();
        let initial = |s: &str| s.chars().next().map(|c| c.to_uppercase().collect::<String>());
        match parts.as_slice() {
            [] => "U".to_string(),
            [only] => initial(only).unwrap_or_else(|| "U".to_string()),
            [first, .., last] => format!(
                "{}{}",
                initial(first).unwrap_or_default(),
                initial(last).unwrap_or_default()
            ),
        }
    }
}

/// Public registration form, passed to the API unvalidated
#[derive(Clone, Serialize)]
pub struct RegistrationFields {
    pub email: String,
    pub username: String,
    pub full_name: String,
    pub password: String,
    pub password_confirm: String,
}

impl std::fmt::Debug for RegistrationFields {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistrationFields")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("full_name", &self.full_name)
            .finish_non_exhaustive()
    }
}

/// Own-profile changes (email and role are read-only on the backend)
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

/// Token pair as returned by login and register
#[derive(Clone, Deserialize)]
pub struct AuthTokens {
    pub access: String,
    pub refresh: String,
}

/// Login/register response body
#[derive(Clone, Deserialize)]
pub struct AuthResponse {
    pub user: Identity,
    pub tokens: AuthTokens,
}

/// Token refresh response body. The backend may rotate the refresh token.
#[derive(Clone, Deserialize)]
pub struct RefreshedTokens {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}
