use crate::{
    errors::ApiError,
    handlers::common::{idempotency_key, AcpJson, AcpResponse},
    models::{
        CheckoutSession, CheckoutSessionCompleteRequest, CheckoutSessionCreateRequest,
        CheckoutSessionUpdateRequest,
    },
    AppState,
};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};

/// Creates the router for agentic checkout endpoints
pub fn agentic_checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/checkout_sessions", post(create_checkout_session))
        .route(
            "/checkout_sessions/:checkout_session_id",
            get(get_checkout_session).post(update_checkout_session),
        )
        .route(
            "/checkout_sessions/:checkout_session_id/complete",
            post(complete_checkout_session),
        )
        .route(
            "/checkout_sessions/:checkout_session_id/cancel",
            post(cancel_checkout_session),
        )
}

/// Create a checkout session
async fn create_checkout_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    AcpJson(payload): AcpJson<CheckoutSessionCreateRequest>,
) -> Result<Response, ApiError> {
    let result = state
        .services
        .agentic_checkout
        .create_session(payload, idempotency_key(&headers)?)
        .await?;

    AcpResponse::created_or_replayed(&headers, result.replayed)
        .location(format!("/checkout_sessions/{}", result.value.id))
        .json(&result.value)
}

/// Get checkout session
async fn get_checkout_session(
    State(state): State<AppState>,
    Path(checkout_session_id): Path<String>,
) -> Result<Json<CheckoutSession>, ApiError> {
    let session = state
        .services
        .agentic_checkout
        .get_session(&checkout_session_id)
        .await?;

    Ok(Json(session))
}

/// Update checkout session
async fn update_checkout_session(
    State(state): State<AppState>,
    Path(checkout_session_id): Path<String>,
    headers: HeaderMap,
    AcpJson(payload): AcpJson<CheckoutSessionUpdateRequest>,
) -> Result<Response, ApiError> {
    let session = state
        .services
        .agentic_checkout
        .update_session(&checkout_session_id, payload)
        .await?;

    AcpResponse::new(StatusCode::OK, &headers).json(&session)
}

/// Complete checkout session
async fn complete_checkout_session(
    State(state): State<AppState>,
    Path(checkout_session_id): Path<String>,
    headers: HeaderMap,
    AcpJson(payload): AcpJson<CheckoutSessionCompleteRequest>,
) -> Result<Response, ApiError> {
    let result = state
        .services
        .agentic_checkout
        .complete_session(&checkout_session_id, payload, idempotency_key(&headers)?)
        .await?;

    AcpResponse::new(StatusCode::OK, &headers)
        .replayed(result.replayed)
        .json(&result.value)
}

/// Cancel checkout session
async fn cancel_checkout_session(
    State(state): State<AppState>,
    Path(checkout_session_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let session = state
        .services
        .agentic_checkout
        .cancel_session(&checkout_session_id)
        .await?;

    AcpResponse::new(StatusCode::OK, &headers).json(&session)
}
