//! Session state and persisted credentials

use serde::{Deserialize, Serialize};

use super::user::{Identity, Role};

/// Access/refresh token pair. Opaque to the client: stored, attached, never decoded.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialPair { .. }")
    }
}

impl From<super::user::AuthTokens> for CredentialPair {
    fn from(tokens: super::user::AuthTokens) -> Self {
        Self {
            access_token: tokens.access,
            refresh_token: tokens.refresh,
        }
    }
}

/// What the UI sees of the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub identity: Option<Identity>,
    pub is_loading: bool,
}

impl SessionState {
    /// Initial state while the stored session is being restored
    pub fn loading() -> Self {
        Self {
            identity: None,
            is_loading: true,
        }
    }

    pub fn authenticated(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            is_loading: false,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            identity: None,
            is_loading: false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn role(&self) -> Option<Role> {
        self.identity.as_ref().map(|identity| identity.role)
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::loading()
    }
}
