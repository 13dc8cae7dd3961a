//! External HTTP contract of the library REST API

pub mod client;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::{
    error::ApiResult,
    models::{AuthResponse, Identity, RefreshedTokens, RegistrationFields},
};

pub use client::HttpAuthApi;

/// Operations the session core consumes from the backend.
///
/// Tokens are passed explicitly: implementations hold no session state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> ApiResult<AuthResponse>;

    async fn register(&self, fields: &RegistrationFields) -> ApiResult<AuthResponse>;

    async fn fetch_current_identity(&self, access_token: &str) -> ApiResult<Identity>;

    async fn refresh_access_token(&self, refresh_token: &str) -> ApiResult<RefreshedTokens>;

    /// Any other authenticated JSON call
    async fn send(&self, request: &ApiRequest, access_token: &str) -> ApiResult<Value>;
}

/// An authenticated request, relative to the API base URL
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::PATCH,
            path: path.into(),
            body: Some(body),
        }
    }
}

/// Where a request stands in the refresh protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Initial,
    /// Already replayed once with a refreshed access token; never refreshes again
    AfterRefresh,
}

/// Per-request context carrying the attempt marker. Advancing it yields a new
/// value; nothing is flagged in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    attempt: Attempt,
}

impl RequestContext {
    pub fn initial() -> Self {
        Self {
            attempt: Attempt::Initial,
        }
    }

    pub fn attempt(&self) -> Attempt {
        self.attempt
    }

    pub fn may_refresh(&self) -> bool {
        self.attempt == Attempt::Initial
    }

    pub fn after_refresh(self) -> Self {
        Self {
            attempt: Attempt::AfterRefresh,
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::initial()
    }
}
