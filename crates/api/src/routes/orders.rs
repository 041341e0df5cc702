//! Order route handlers: placement, history, tracking, cancellation, and
//! coupon previews.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::{info, instrument};

use kirana_core::OrderId;

use crate::db::{OrderRepository, Page, Pagination, UserRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::middleware::{RequireUser, is_active_admin};
use crate::models::{Order, OrderDetail};
use crate::services::checkout::{CouponPreview, PlaceOrderRequest, PlacedOrder};
use crate::services::{CheckoutService, OrderService};
use crate::state::AppState;

const ORDERS_PER_PAGE: i64 = 10;

/// Page query for order history.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Coupon preview body.
#[derive(Debug, Deserialize)]
pub struct ValidateCouponRequest {
    pub code: String,
}

fn checkout(state: &AppState) -> CheckoutService<'_> {
    CheckoutService::new(state.pool(), state.cache(), state.razorpay(), state.email())
}

// =============================================================================
// Placement
// =============================================================================

/// Place an order from the caller's cart.
///
/// POST /api/orders
///
/// For Razorpay orders the response carries what the payment widget needs.
#[instrument(skip(state, body), fields(user_id = %user.id))]
pub async fn place_order(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<PlacedOrder>)> {
    let account = UserRepository::new(state.pool())
        .get_by_id(user.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Please log in".to_string()))?;
    if account.is_blocked {
        return Err(AppError::Forbidden("This account is blocked".to_string()));
    }

    let placed = checkout(&state).place_order(user.id, &body).await?;

    info!(order_number = %placed.order.order.order_number, "Order placed");
    add_breadcrumb("order", "Order placed", None);
    Ok((StatusCode::CREATED, Json(placed)))
}

/// Preview a coupon against the caller's current cart.
///
/// POST /api/coupons/validate
pub async fn validate_coupon(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<ValidateCouponRequest>,
) -> Result<Json<CouponPreview>> {
    let preview = checkout(&state).preview_coupon(user.id, &body.code).await?;
    Ok(Json(preview))
}

// =============================================================================
// History
// =============================================================================

/// The caller's orders, newest first.
///
/// GET /api/orders
pub async fn list_orders(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Order>>> {
    let pagination = Pagination::new(query.page, query.per_page, ORDERS_PER_PAGE);
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id, pagination)
        .await?;
    Ok(Json(orders))
}

/// One order with its items. Owners and admins only.
///
/// GET /api/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    let repo = OrderRepository::new(state.pool());
    let order = repo
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    // Other users' orders look missing rather than forbidden.
    if order.user_id != user.id && !is_active_admin(&state, user.id).await? {
        return Err(AppError::NotFound("Order not found".to_string()));
    }

    Ok(Json(repo.detail(order).await?))
}

/// The caller's order by its public number.
///
/// GET /api/orders/track/{number}
pub async fn track_order(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(number): Path<String>,
) -> Result<Json<OrderDetail>> {
    let repo = OrderRepository::new(state.pool());
    let order = repo
        .get_by_number(number.trim())
        .await?
        .filter(|o| o.user_id == user.id)
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

    Ok(Json(repo.detail(order).await?))
}

/// Cancel the caller's order while it is pending or confirmed.
///
/// POST /api/orders/{id}/cancel
#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn cancel_order(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    let order = OrderService::new(state.pool(), state.email())
        .cancel_by_customer(user.id, id)
        .await?;
    let detail = OrderRepository::new(state.pool()).detail(order).await?;
    Ok(Json(detail))
}
