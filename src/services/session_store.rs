//! Client-local persistence of the credential pair

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::{Deserialize, Serialize};

use crate::models::CredentialPair;

/// Credential storage. Every operation is total: unreadable or partial data
/// loads as `None`, failed writes are logged and dropped.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Option<CredentialPair>;
    fn save(&self, pair: &CredentialPair);
    fn clear(&self);
}

/// On-disk layout: one document, two fixed keys
#[derive(Serialize, Deserialize, Default)]
struct StoredTokens {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// JSON file in the client's data directory
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `{data_dir}/opac-portal/session.json`, or `~/.local/share/...` when the
    /// platform reports no data directory
    pub fn default_path() -> Option<PathBuf> {
        let mut dir = dirs::data_dir().or_else(|| {
            dirs::home_dir().map(|mut home| {
                home.push(".local");
                home.push("share");
                home
            })
        })?;
        dir.push("opac-portal");
        dir.push("session.json");
        Some(dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, tokens: &StoredTokens) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(tokens)?;
        fs::write(&self.path, data)
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Option<CredentialPair> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read session file {:?}: {}", self.path, e);
                return None;
            }
        };

        let tokens: StoredTokens = match serde_json::from_slice(&data) {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!("Ignoring unreadable session file {:?}: {}", self.path, e);
                return None;
            }
        };

        match (tokens.access_token, tokens.refresh_token) {
            (Some(access), Some(refresh)) => Some(CredentialPair::new(access, refresh)),
            _ => None,
        }
    }

    fn save(&self, pair: &CredentialPair) {
        let tokens = StoredTokens {
            access_token: Some(pair.access_token.clone()),
            refresh_token: Some(pair.refresh_token.clone()),
        };
        if let Err(e) = self.write(&tokens) {
            tracing::warn!("Failed to persist session to {:?}: {}", self.path, e);
        }
    }

    fn clear(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!("Failed to remove session file {:?}: {}", self.path, e);
                // Make sure a stale pair cannot be loaded back
                if let Err(e) = self.write(&StoredTokens::default()) {
                    tracing::warn!("Failed to blank session file {:?}: {}", self.path, e);
                }
            }
        }
    }
}

/// Process-local store, for tests and sessions that must not outlive the process
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    pair: Mutex<Option<CredentialPair>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            pair: Mutex::new(Some(pair)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<CredentialPair> {
        self.pair.lock().map(|pair| pair.clone()).unwrap_or(None)
    }

    fn save(&self, pair: &CredentialPair) {
        if let Ok(mut slot) = self.pair.lock() {
            *slot = Some(pair.clone());
        }
    }

    fn clear(&self) {
        if let Ok(mut slot) = self.pair.lock() {
            *slot = None;
        }
    }
}
