use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// ACP-compliant error response format
/// Error body shape defined by the Agentic Commerce Protocol
#[derive(Debug, Serialize, Deserialize)]
pub struct ACPErrorResponse {
    /// Error details object
    pub error: ACPErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ACPErrorDetails {
    /// Error type category
    #[serde(rename = "type")]
    pub error_type: ACPErrorType,
    /// Machine-readable error code
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Parameter that caused the error (for validation errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ACPErrorType {
    /// Invalid request parameters or payload
    InvalidRequest,
    /// Idempotency key reused with a different payload
    RequestNotIdempotent,
    /// Authentication or authorization failure
    AuthenticationError,
    /// Upstream or internal processing failure
    ProcessingError,
    /// General service failure
    ServiceUnavailable,
}

impl ACPErrorResponse {
    pub fn invalid_request(code: &str, message: String, param: Option<String>) -> Self {
        Self::new(ACPErrorType::InvalidRequest, code, message, param)
    }

    pub fn authentication_error(message: String) -> Self {
        Self::new(
            ACPErrorType::AuthenticationError,
            "unauthorized",
            message,
            None,
        )
    }

    pub fn processing_error(code: &str, message: String) -> Self {
        Self::new(ACPErrorType::ProcessingError, code, message, None)
    }

    fn new(error_type: ACPErrorType, code: &str, message: String, param: Option<String>) -> Self {
        Self {
            error: ACPErrorDetails {
                error_type,
                code: code.to_string(),
                message,
                param,
            },
        }
    }
}

/// Convert ServiceError to ACP error response
impl From<&ServiceError> for ACPErrorResponse {
    fn from(error: &ServiceError) -> Self {
        match error {
            ServiceError::NotFound(msg) => {
                ACPErrorResponse::invalid_request("not_found", msg.clone(), None)
            }
            ServiceError::Conflict(msg) => {
                ACPErrorResponse::invalid_request("conflict", msg.clone(), None)
            }
            ServiceError::ValidationError { message, param } => {
                ACPErrorResponse::invalid_request("invalid", message.clone(), param.clone())
            }
            ServiceError::IdempotencyConflict(msg) => ACPErrorResponse::new(
                ACPErrorType::RequestNotIdempotent,
                "idempotency_conflict",
                msg.clone(),
                None,
            ),
            ServiceError::Unauthorized(msg) => ACPErrorResponse::authentication_error(msg.clone()),
            ServiceError::ExternalServiceError(_) => ACPErrorResponse::new(
                ACPErrorType::ServiceUnavailable,
                "upstream_error",
                error.response_message(),
                None,
            ),
            ServiceError::SerializationError(_) | ServiceError::InternalError(_) => {
                ACPErrorResponse::processing_error("internal_error", error.response_message())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        param: Option<String>,
    },

    #[error("Idempotency conflict: {0}")]
    IdempotencyConflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ServiceError {
    /// Validation failure that is not tied to a single request field.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            param: None,
        }
    }

    /// Validation failure naming the offending request field.
    pub fn invalid_field(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            param: Some(param.into()),
        }
    }

    /// Field named by a validation error, if any.
    pub fn param(&self) -> Option<&str> {
        match self {
            Self::ValidationError { param, .. } => param.as_deref(),
            _ => None,
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) | Self::IdempotencyConflict(_) => StatusCode::CONFLICT,
            Self::ValidationError { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            Self::SerializationError(_) | Self::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::SerializationError(_) | Self::InternalError(_) => {
                "Internal server error".to_string()
            }
            Self::ExternalServiceError(_) => {
                "Order webhook delivery failed; the checkout state change was kept".to_string()
            }
            Self::ValidationError { message, .. } => message.clone(),
            Self::NotFound(msg)
            | Self::Conflict(msg)
            | Self::IdempotencyConflict(msg)
            | Self::Unauthorized(msg) => msg.clone(),
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        ApiError::ServiceError(self).into_response()
    }
}

/// API Error type for HTTP responses
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Service error: {0}")]
    ServiceError(#[from] ServiceError),

    #[error("Bad request: {message}")]
    BadRequest {
        message: String,
        error_code: Option<String>,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::ServiceError(service_error) => (
                service_error.status_code(),
                ACPErrorResponse::from(service_error),
            ),
            ApiError::BadRequest {
                message,
                error_code,
            } => (
                StatusCode::BAD_REQUEST,
                ACPErrorResponse::invalid_request(
                    error_code.as_deref().unwrap_or("invalid"),
                    message.clone(),
                    None,
                ),
            ),
        };

        (status, Json(body)).into_response()
    }
}
