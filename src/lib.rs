//! OPAC Portal
//!
//! Client core of the library portal: restores and tracks the user's session
//! against the library REST API, and decides for every navigation whether a
//! page may be shown or where the user goes instead.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use config::AppConfig;
pub use error::{ApiError, AppError, AppResult};

use api::AuthApi;
use services::{AuthSessionManager, Navigation, RouteTable, SessionStore};

/// Handle passed down to every view: configuration, the session owner and the
/// route table. Cheap to clone.
#[derive(Clone)]
pub struct PortalContext {
    pub config: Arc<AppConfig>,
    pub session: Arc<AuthSessionManager>,
    pub routes: Arc<RouteTable>,
}

impl PortalContext {
    pub fn new(config: AppConfig, api: Arc<dyn AuthApi>, store: Arc<dyn SessionStore>) -> Self {
        let routes = RouteTable::portal(&config.features);
        Self {
            config: Arc::new(config),
            session: Arc::new(AuthSessionManager::new(api, store)),
            routes: Arc::new(routes),
        }
    }

    /// Guard decision for `location` against the current session
    pub fn navigate(&self, location: &str) -> Navigation {
        self.routes.resolve(location, &self.session.state())
    }
}
