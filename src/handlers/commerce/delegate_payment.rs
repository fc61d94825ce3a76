use crate::{
    errors::ApiError,
    handlers::common::{idempotency_key, AcpJson, AcpResponse},
    models::DelegatePaymentRequest,
    AppState,
};
use axum::{extract::State, http::HeaderMap, response::Response, routing::post, Router};

/// Delegated payment (PSP) endpoint
pub fn delegate_payment_routes() -> Router<AppState> {
    Router::new().route("/agentic_commerce/delegate_payment", post(delegate_payment))
}

/// Issue a vault token bounded by the request's allowance
async fn delegate_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    AcpJson(payload): AcpJson<DelegatePaymentRequest>,
) -> Result<Response, ApiError> {
    let result = state
        .services
        .delegated_payment
        .delegate_payment(payload, idempotency_key(&headers)?)
        .await?;

    AcpResponse::created_or_replayed(&headers, result.replayed).json(&result.value)
}
