//! Razorpay payment handlers.
//!
//! The client posts the widget's callback fields to `verify-payment`;
//! Razorpay itself posts signed events to `webhook`. Either path marks the
//! order paid, and both are idempotent.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use tracing::{instrument, warn};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::RequireUser;
use crate::models::Order;
use crate::services::OrderService;
use crate::services::orders::PaymentConfirmation;
use crate::state::AppState;

/// Header carrying the webhook body's HMAC.
pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// Confirm a payment from the checkout widget's callback.
///
/// POST /api/payments/verify-payment
///
/// # Errors
///
/// 400 on a bad signature, 404 if the gateway order is not the caller's.
#[instrument(skip(state, body), fields(user_id = %user.id))]
pub async fn verify_payment(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<PaymentConfirmation>,
) -> Result<Json<Order>> {
    let order = OrderService::new(state.pool(), state.email())
        .verify_payment(state.razorpay(), user.id, &body)
        .await?;

    add_breadcrumb("payment", "Payment verified", None);
    Ok(Json(order))
}

/// Receive a Razorpay webhook.
///
/// POST /api/payments/webhook
///
/// The signature covers the raw body, so it is read as bytes. Any verified
/// event is acknowledged with 200, including ones that are not acted on.
#[instrument(skip_all)]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            warn!("Webhook without signature header");
            AppError::BadRequest("Missing signature".to_string())
        })?;

    let event = state.razorpay().parse_webhook(&body, signature)?;
    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid payload: {e}")))?;

    OrderService::new(state.pool(), state.email())
        .apply_webhook(&event, payload)
        .await?;
    Ok(StatusCode::OK)
}
