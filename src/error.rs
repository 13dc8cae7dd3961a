//! Error types for the OPAC portal client

use thiserror::Error;

/// Failures of the external library REST API contract
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// 401 on an authenticated call (expired or revoked access token)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// Client set up with an unusable base URL or path
    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Main application error type, as surfaced to the UI layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server error: {0}")]
    Server(String),

    /// Programming misuse, e.g. updating the identity with no active session
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A newer session operation started before this one completed
    #[error("Superseded: {0}")]
    Superseded(String),
}

impl AppError {
    /// Transient failures the user may simply retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Network(_) | AppError::Server(_))
    }
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::InvalidCredentials(msg) | ApiError::Unauthorized(msg) => {
                AppError::Authentication(msg)
            }
            ApiError::Validation(msg) => AppError::Validation(msg),
            ApiError::Network(msg) => AppError::Network(msg),
            ApiError::Server { status, message } => {
                tracing::error!("Server error {}: {}", status, message);
                AppError::Server(message)
            }
            ApiError::Configuration(msg) => {
                tracing::error!("Client misconfigured: {}", msg);
                AppError::InvalidState(msg)
            }
        }
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
