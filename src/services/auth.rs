//! Auth session manager: the single owner of the session state.
//!
//! Credentials (in the [`SessionStore`]) and identity (in the published
//! [`SessionState`]) are only ever changed together, under one lock. User
//! operations draw a generation ticket when they start; a result whose ticket
//! is no longer current is discarded, so the most recently started operation
//! wins. Bootstrap and profile saves are discarded instead if anything was
//! committed while they ran.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use serde_json::Value;
use tokio::sync::{watch, Mutex};

use crate::{
    api::{ApiRequest, AuthApi, RequestContext},
    error::{ApiError, ApiResult, AppError, AppResult},
    models::{AuthResponse, CredentialPair, Identity, ProfileUpdate, RegistrationFields, SessionState},
    services::{role_policy::RoleCheck, session_store::SessionStore},
};

/// Commit bookkeeping
#[derive(Debug, Default)]
struct Ledger {
    /// Bumped when a login, register or logout starts
    generation: u64,
    /// Bumped on every applied change
    epoch: u64,
}

#[derive(Debug, Clone, Copy)]
enum Ticket {
    /// Current while no newer login, register or logout started
    Operation(u64),
    /// Current while nothing was committed
    Snapshot(u64),
}

enum Change {
    Establish { pair: CredentialPair, identity: Identity },
    /// Bootstrap verified the stored pair
    Restore { identity: Identity },
    /// Fresh copy of the signed-in user's profile
    Replace { identity: Identity },
    Clear,
}

pub struct AuthSessionManager {
    api: Arc<dyn AuthApi>,
    store: Arc<dyn SessionStore>,
    state: watch::Sender<SessionState>,
    ledger: Mutex<Ledger>,
    bootstrapped: AtomicBool,
}

impl AuthSessionManager {
    pub fn new(api: Arc<dyn AuthApi>, store: Arc<dyn SessionStore>) -> Self {
        let (state, _) = watch::channel(SessionState::loading());
        Self {
            api,
            store,
            state,
            ledger: Mutex::new(Ledger::default()),
            bootstrapped: AtomicBool::new(false),
        }
    }

    /// Current session snapshot
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Change feed; route decisions should be recomputed on every change
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.borrow().identity.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn role_check(&self) -> RoleCheck {
        RoleCheck::new(self.state.borrow().role())
    }

    /// Restore the stored session. Runs once; later calls return immediately.
    ///
    /// Never fails: a stored session the server no longer accepts, or one that
    /// cannot be verified, is dropped and the state becomes anonymous.
    pub async fn bootstrap(&self) {
        if self.bootstrapped.swap(true, Ordering::SeqCst) {
            tracing::debug!("Session bootstrap already ran");
            return;
        }

        let ticket = self.snapshot().await;

        if self.store.load().is_none() {
            tracing::debug!("No stored session");
            self.commit(ticket, Change::Clear).await.ok();
            return;
        }

        let api = self.api.clone();
        let result = self
            .with_refresh(|token| {
                let api = api.clone();
                async move { api.fetch_current_identity(&token).await }
            })
            .await;

        match result {
            Ok(identity) => {
                tracing::info!("Restored session for user {} ({})", identity.id, identity.role);
                self.commit(ticket, Change::Restore { identity }).await.ok();
            }
            Err(e) => {
                tracing::info!("Stored session discarded: {}", e);
                self.commit(ticket, Change::Clear).await.ok();
            }
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> AppResult<Identity> {
        let ticket = self.begin().await;
        let response = self.api.login(email, password).await.map_err(|e| {
            tracing::info!("Login failed: {}", e);
            AppError::from(e)
        })?;
        self.establish(ticket, response).await
    }

    pub async fn register(&self, fields: &RegistrationFields) -> AppResult<Identity> {
        let ticket = self.begin().await;
        let response = self.api.register(fields).await.map_err(|e| {
            tracing::info!("Registration failed: {}", e);
            AppError::from(e)
        })?;
        self.establish(ticket, response).await
    }

    /// Client-side sign-out. Also cancels any login still in flight.
    pub async fn logout(&self) {
        let mut ledger = self.ledger.lock().await;
        ledger.generation += 1;
        self.clear_session();
        ledger.epoch += 1;
        tracing::info!("Signed out");
    }

    /// Replace the identity, keeping the credentials
    pub async fn update_identity(&self, identity: Identity) -> AppResult<()> {
        let mut ledger = self.ledger.lock().await;
        if !self.state.borrow().is_authenticated() {
            tracing::error!("update_identity called without an active session");
            return Err(AppError::InvalidState("No active session".to_string()));
        }
        self.state.send_replace(SessionState::authenticated(identity));
        ledger.epoch += 1;
        Ok(())
    }

    /// Save own profile changes on the server and adopt the returned identity.
    ///
    /// The result is dropped with [`AppError::Superseded`] if the session
    /// changed while the request ran.
    pub async fn update_profile(&self, changes: &ProfileUpdate) -> AppResult<Identity> {
        let body = serde_json::to_value(changes)
            .map_err(|e| AppError::Validation(format!("Invalid profile changes: {}", e)))?;
        let ticket = self.snapshot().await;
        let value = self
            .authorized_request(ApiRequest::patch("auth/profile/update/", body))
            .await?;
        let identity: Identity = serde_json::from_value(value)
            .map_err(|e| AppError::Server(format!("Malformed profile response: {}", e)))?;
        self.commit(ticket, Change::Replace { identity: identity.clone() })
            .await?;
        Ok(identity)
    }

    /// Send an authenticated request, refreshing the access token once if the
    /// server rejects it
    pub async fn authorized_request(&self, request: ApiRequest) -> AppResult<Value> {
        let api = self.api.clone();
        self.with_refresh(|token| {
            let api = api.clone();
            let request = request.clone();
            async move { api.send(&request, &token).await }
        })
        .await
    }

    /// Drop every result still in flight (the owning view went away)
    pub async fn teardown(&self) {
        let mut ledger = self.ledger.lock().await;
        ledger.generation += 1;
        ledger.epoch += 1;
        tracing::debug!("Session manager torn down, in-flight results will be ignored");
    }

    async fn begin(&self) -> Ticket {
        let mut ledger = self.ledger.lock().await;
        ledger.generation += 1;
        Ticket::Operation(ledger.generation)
    }

    async fn snapshot(&self) -> Ticket {
        Ticket::Snapshot(self.ledger.lock().await.epoch)
    }

    async fn establish(&self, ticket: Ticket, response: AuthResponse) -> AppResult<Identity> {
        let identity = response.user;
        let change = Change::Establish {
            pair: response.tokens.into(),
            identity: identity.clone(),
        };
        self.commit(ticket, change).await?;
        tracing::info!("Signed in as user {} ({})", identity.id, identity.role);
        Ok(identity)
    }

    /// Apply `change` if `ticket` is still current
    async fn commit(&self, ticket: Ticket, change: Change) -> AppResult<()> {
        let mut ledger = self.ledger.lock().await;
        let current = match ticket {
            Ticket::Operation(generation) => ledger.generation == generation,
            Ticket::Snapshot(epoch) => ledger.epoch == epoch,
        };
        if !current {
            tracing::debug!("Discarding stale session result ({:?})", ticket);
            return Err(AppError::Superseded(
                "The session changed before this result arrived".to_string(),
            ));
        }
        let applied = self.apply(change);
        ledger.epoch += 1;
        applied
    }

    /// Callers hold the ledger lock
    fn apply(&self, change: Change) -> AppResult<()> {
        match change {
            Change::Establish { pair, identity } => {
                self.store.save(&pair);
                if self.store.load().as_ref() != Some(&pair) {
                    tracing::error!("Session could not be persisted, staying signed out");
                    self.clear_session();
                    return Err(AppError::Server(
                        "Could not save the session on this device".to_string(),
                    ));
                }
                self.state.send_replace(SessionState::authenticated(identity));
            }
            Change::Restore { identity } => {
                // the pair may have been dropped by a failed refresh meanwhile
                let state = if self.store.load().is_some() {
                    SessionState::authenticated(identity)
                } else {
                    SessionState::anonymous()
                };
                self.state.send_replace(state);
            }
            Change::Replace { identity } => {
                let current = self.state.borrow().identity.as_ref().map(|user| user.id);
                if current != Some(identity.id) {
                    tracing::debug!("Profile of user {} no longer matches the session", identity.id);
                    return Err(AppError::Superseded(
                        "The session changed before the profile was saved".to_string(),
                    ));
                }
                self.state.send_replace(SessionState::authenticated(identity));
            }
            Change::Clear => self.clear_session(),
        }
        Ok(())
    }

    fn clear_session(&self) {
        self.store.clear();
        self.state.send_replace(SessionState::anonymous());
    }

    async fn with_refresh<T, F, Fut>(&self, call: F) -> AppResult<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let mut context = RequestContext::initial();
        loop {
            let pair = self
                .store
                .load()
                .ok_or_else(|| AppError::Authentication("Not signed in".to_string()))?;

            match call(pair.access_token.clone()).await {
                Err(ApiError::Unauthorized(_)) if context.may_refresh() => {
                    self.refresh(&pair).await?;
                    context = context.after_refresh();
                }
                Err(ApiError::Unauthorized(msg)) => {
                    tracing::warn!("Request rejected again after token refresh");
                    return Err(AppError::Authentication(msg));
                }
                result => return result.map_err(AppError::from),
            }
        }
    }

    /// One refresh with the refresh token of `used`. On failure the session ends.
    async fn refresh(&self, used: &CredentialPair) -> AppResult<()> {
        tracing::debug!("Access token rejected, refreshing");
        match self.api.refresh_access_token(&used.refresh_token).await {
            Ok(tokens) => {
                let renewed = CredentialPair {
                    access_token: tokens.access,
                    refresh_token: tokens.refresh.unwrap_or_else(|| used.refresh_token.clone()),
                };
                let _ledger = self.ledger.lock().await;
                if self.still_stored(used) {
                    self.store.save(&renewed);
                } else {
                    tracing::debug!("Session replaced during refresh, keeping the newer credentials");
                }
                Ok(())
            }
            Err(e) => {
                tracing::info!("Token refresh failed, ending session: {}", e);
                let mut ledger = self.ledger.lock().await;
                if self.still_stored(used) {
                    self.clear_session();
                    ledger.epoch += 1;
                }
                Err(AppError::Authentication(
                    "Session expired, please sign in again".to_string(),
                ))
            }
        }
    }

    fn still_stored(&self, used: &CredentialPair) -> bool {
        self.store
            .load()
            .is_some_and(|stored| stored.refresh_token == used.refresh_token)
    }
}
