use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
    Json,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::errors::{ApiError, ServiceError};

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";
pub const REQUEST_ID_HEADER: &str = "Request-Id";
pub const IDEMPOTENT_REPLAYED_HEADER: &str = "Idempotent-Replayed";

/// JSON body extractor whose rejections render as ACP `invalid_request` errors.
pub struct AcpJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for AcpJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError::BadRequest {
                message: rejection.body_text(),
                error_code: Some("invalid_json".to_string()),
            }),
        }
    }
}

/// Reads the optional `Idempotency-Key` header.
pub fn idempotency_key(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .map(|value| {
            value.to_str().map_err(|_| ApiError::BadRequest {
                message: "Idempotency-Key must be valid ASCII".to_string(),
                error_code: Some("invalid".to_string()),
            })
        })
        .transpose()
}

/// JSON response carrying the echoed request headers.
pub struct AcpResponse<'a> {
    status: StatusCode,
    request_headers: &'a HeaderMap,
    replayed: bool,
    location: Option<String>,
}

impl<'a> AcpResponse<'a> {
    pub fn new(status: StatusCode, request_headers: &'a HeaderMap) -> Self {
        Self {
            status,
            request_headers,
            replayed: false,
            location: None,
        }
    }

    /// Answers a fresh execution with `created` and a replay with 200 plus `Idempotent-Replayed`.
    pub fn created_or_replayed(request_headers: &'a HeaderMap, replayed: bool) -> Self {
        let status = if replayed {
            StatusCode::OK
        } else {
            StatusCode::CREATED
        };
        Self::new(status, request_headers).replayed(replayed)
    }

    /// Marks the body as a stored result via `Idempotent-Replayed: true`.
    pub fn replayed(mut self, replayed: bool) -> Self {
        self.replayed = replayed;
        self
    }

    pub fn location(mut self, location: String) -> Self {
        self.location = Some(location);
        self
    }

    pub fn json<T: Serialize>(self, body: &T) -> Result<Response, ApiError> {
        let body = serde_json::to_vec(body).map_err(ServiceError::from)?;

        let mut response = Response::builder()
            .status(self.status)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CACHE_CONTROL, "no-store");

        for name in [IDEMPOTENCY_KEY_HEADER, REQUEST_ID_HEADER] {
            if let Some(value) = self.request_headers.get(name) {
                response = response.header(name, value);
            }
        }
        if self.replayed {
            response = response.header(IDEMPOTENT_REPLAYED_HEADER, HeaderValue::from_static("true"));
        }
        if let Some(location) = self.location {
            response = response.header(header::LOCATION, location);
        }

        response.body(body.into()).map_err(|e| {
            ApiError::ServiceError(ServiceError::InternalError(format!(
                "Response build error: {}",
                e
            )))
        })
    }
}
