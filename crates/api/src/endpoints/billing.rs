//! Billing endpoints.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use chrono::Utc;
use photowall_common::AppResult;
use photowall_core::{CheckoutInput, CheckoutSession, WebhookOutcome};
use serde::Serialize;
use tracing::info;

use crate::{extractors::AuthOrganizer, middleware::AppState, response::ApiResponse};

/// Header carrying the payment processor's signature.
const SIGNATURE_HEADER: &str = "stripe-signature";

/// Start a hosted checkout to raise an event's upload limit.
async fn checkout(
    AuthOrganizer(organizer): AuthOrganizer,
    State(state): State<AppState>,
    Json(input): Json<CheckoutInput>,
) -> AppResult<ApiResponse<CheckoutSession>> {
    let session = state
        .billing_service
        .create_checkout(&organizer.id, input)
        .await?;
    Ok(ApiResponse::ok(session))
}

#[derive(Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// Payment processor callback. The raw body is needed for the signature.
async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookAck>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let outcome = state
        .billing_service
        .handle_webhook(&body, signature, Utc::now().timestamp())
        .await?;

    if let WebhookOutcome::Applied {
        event_id,
        upload_limit,
        ..
    } = outcome
    {
        info!(event_id = %event_id, upload_limit, "Webhook applied");
    }

    Ok(Json(WebhookAck { received: true }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/checkout", post(checkout))
        .route("/webhook", post(webhook))
}
