//! Inbound webhook endpoint for call-platform events.
//!
//! Requests are HMAC-verified against the raw body before any parsing,
//! then handed to the lifecycle dispatcher.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::Json,
    routing::post,
    Router,
};
use serde_json::{json, Value};
use tracing::debug;

use crate::api::error::{ApiError, ApiResult};
use crate::api::AppState;
use crate::lifecycle::signature::verify_signature;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(handle_webhook))
        .with_state(state)
}

async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let signature = headers.get("x-signature").and_then(|v| v.to_str().ok());
    let api_key = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    let (Some(signature), Some(_api_key)) = (signature, api_key) else {
        return Err(ApiError::bad_request("Missing signature or API key"));
    };

    if !verify_signature(&state.webhook.signing_secret, signature, &body) {
        return Err(ApiError::unauthorized("Invalid signature"));
    }

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|_| ApiError::bad_request("Invalid JSON body"))?;

    debug!(
        "Webhook event: {}",
        payload
            .get("type")
            .and_then(|t| t.as_str())
            .unwrap_or("<none>")
    );

    state.lifecycle.dispatch(&payload).await?;
    Ok(Json(json!({ "status": "ok" })))
}
