//! reqwest implementation of the library REST API contract

use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::{ApiRequest, AuthApi};
use crate::{
    config::ApiConfig,
    error::{ApiError, ApiResult},
    models::{AuthResponse, Identity, RefreshedTokens, RegistrationFields},
};

/// Which error vocabulary a failed response maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    /// Login: a rejected request means the credentials were wrong
    Credentials,
    Default,
}

#[derive(Clone)]
pub struct HttpAuthApi {
    client: Client,
    base_url: Url,
}

impl HttpAuthApi {
    pub fn new(config: &ApiConfig) -> ApiResult<Self> {
        // Url::join drops the last segment unless the base ends with '/'
        let mut base = config.url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)
            .map_err(|e| ApiError::Configuration(format!("Invalid API URL {}: {}", config.url, e)))?;

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ApiError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> ApiResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::Configuration(format!("Invalid API path {}: {}", path, e)))
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder, kind: CallKind) -> ApiResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Network(transport_message(&e)))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::Network(transport_message(&e)))?;

        if status.is_success() {
            let payload: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
            return serde_json::from_slice(payload).map_err(|e| ApiError::Server {
                status: status.as_u16(),
                message: format!("Malformed response body: {}", e),
            });
        }

        let message = error_message(status, &bytes);
        tracing::debug!("API call failed with {}: {}", status, message);
        Err(classify(status, kind, message))
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, email: &str, password: &str) -> ApiResult<AuthResponse> {
        let request = self
            .client
            .post(self.url("auth/login/")?)
            .json(&json!({ "email": email, "password": password }));
        self.execute(request, CallKind::Credentials).await
    }

    async fn register(&self, fields: &RegistrationFields) -> ApiResult<AuthResponse> {
        let request = self.client.post(self.url("auth/register/")?).json(fields);
        self.execute(request, CallKind::Default).await
    }

    async fn fetch_current_identity(&self, access_token: &str) -> ApiResult<Identity> {
        let request = self
            .client
            .get(self.url("auth/profile/")?)
            .header(AUTHORIZATION, bearer(access_token));
        self.execute(request, CallKind::Default).await
    }

    async fn refresh_access_token(&self, refresh_token: &str) -> ApiResult<RefreshedTokens> {
        let request = self
            .client
            .post(self.url("token/refresh/")?)
            .json(&json!({ "refresh": refresh_token }));
        self.execute(request, CallKind::Default).await
    }

    async fn send(&self, request: &ApiRequest, access_token: &str) -> ApiResult<Value> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.path)?)
            .header(AUTHORIZATION, bearer(access_token));
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        self.execute(builder, CallKind::Default).await
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

fn transport_message(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "Request timed out".to_string()
    } else if err.is_connect() {
        "Could not reach the library server".to_string()
    } else {
        err.to_string()
    }
}

fn classify(status: StatusCode, kind: CallKind, message: String) -> ApiError {
    match (status, kind) {
        (StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED, CallKind::Credentials) => {
            ApiError::InvalidCredentials(message)
        }
        (StatusCode::UNAUTHORIZED, _) => ApiError::Unauthorized(message),
        (StatusCode::BAD_REQUEST, _) => ApiError::Validation(message),
        _ => ApiError::Server {
            status: status.as_u16(),
            message,
        },
    }
}

/// Flatten a REST framework error body into one line.
///
/// Handles `{"detail": ".."}`, `{"non_field_errors": [..]}` and per-field
/// `{"email": ["..", ..]}` maps; anything else falls back to the status reason.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    let fallback = || {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    };

    let Ok(value) = serde_json::from_slice::<Value>(body) else {
        return fallback();
    };

    fn texts(value: &Value) -> Vec<String> {
        match value {
            Value::String(s) => vec![s.clone()],
            Value::Array(items) => items.iter().flat_map(texts).collect(),
            _ => Vec::new(),
        }
    }

    let mut parts = Vec::new();
    match &value {
        Value::Object(map) => {
            for (field, messages) in map {
                let joined = texts(messages).join(" ");
                if joined.is_empty() {
                    continue;
                }
                if field == "detail" || field == "non_field_errors" {
                    parts.push(joined);
                } else {
                    parts.push(format!("{}: {}", field, joined));
                }
            }
        }
        other => parts.extend(texts(other)),
    }

    if parts.is_empty() {
        fallback()
    } else {
        parts.join("; ")
    }
}
