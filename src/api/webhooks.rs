//! Stripe webhook endpoint
//!
//! The raw body is passed through untouched; the signature covers the exact
//! bytes Stripe sent.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};

use super::middleware::{ApiError, AppState};

pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::validation_error("Missing Stripe-Signature header"))?;

    state.services.payments.handle_webhook(&body, signature).await?;
    Ok(Json(json!({ "received": true })))
}
