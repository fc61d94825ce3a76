use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::ServiceError;

/// Bearer tokens accepted by the API. An empty store lets every request through.
#[derive(Clone, Debug, Default)]
pub struct ApiKeyStore {
    keys: Arc<HashSet<String>>,
}

impl ApiKeyStore {
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            keys: Arc::new(
                keys.into_iter()
                    .map(Into::into)
                    .filter(|key: &String| !key.trim().is_empty())
                    .collect(),
            ),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.keys.is_empty()
    }

    pub fn validate(&self, api_key: &str) -> bool {
        self.keys.contains(api_key)
    }
}

/// Extract the API key from an `Authorization: Bearer <key>` header
pub fn extract_api_key(headers: &HeaderMap) -> Result<&str, ServiceError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ServiceError::Unauthorized("Missing Authorization header".to_string()))?
        .to_str()
        .map_err(|_| ServiceError::Unauthorized("Malformed Authorization header".to_string()))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            ServiceError::Unauthorized("Authorization header must use the Bearer scheme".to_string())
        })
}

/// Authentication middleware
pub async fn auth_middleware(
    State(key_store): State<ApiKeyStore>,
    request: Request,
    next: Next,
) -> Response {
    if !key_store.is_enabled() {
        return next.run(request).await;
    }

    let api_key = match extract_api_key(request.headers()) {
        Ok(key) => key,
        Err(err) => {
            warn!(path = %request.uri().path(), error = %err, "Rejected unauthenticated request");
            return err.into_response();
        }
    };

    if !key_store.validate(api_key) {
        warn!(path = %request.uri().path(), "Rejected request with unknown API key");
        return ServiceError::Unauthorized("Invalid API key".to_string()).into_response();
    }

    debug!(path = %request.uri().path(), "Request authenticated");
    next.run(request).await
}
