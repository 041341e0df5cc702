//! Order and payment administration.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::{info, instrument};

use kirana_core::{OrderId, OrderStatus};

use crate::db::{OrderRepository, Page, Pagination, PaymentLogRepository};
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::{Order, OrderDetail, PaymentLog};
use crate::services::OrderService;
use crate::state::AppState;

const PER_PAGE: i64 = 20;

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentLogQuery {
    pub order_id: Option<OrderId>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// All orders, optionally by status.
///
/// GET /api/admin/orders?status=&page=
pub async fn list_orders(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<Page<Order>>> {
    let pagination = Pagination::new(query.page, query.per_page, PER_PAGE);
    let orders = OrderRepository::new(state.pool())
        .list(query.status, pagination)
        .await?;
    Ok(Json(orders))
}

/// Move an order forward, or cancel it.
///
/// PUT /api/admin/orders/{id}/status
///
/// # Errors
///
/// 409 for a backward move or a change to a finished order.
#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<OrderDetail>> {
    let order = OrderService::new(state.pool(), state.email())
        .update_status(id, body.status)
        .await?;
    info!(order_number = %order.order_number, status = %order.status, "Order status changed");

    let detail = OrderRepository::new(state.pool()).detail(order).await?;
    Ok(Json(detail))
}

/// Payment event log, newest first.
///
/// GET /api/admin/payments
pub async fn list_payments(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<PaymentLogQuery>,
) -> Result<Json<Page<PaymentLog>>> {
    let pagination = Pagination::new(query.page, query.per_page, PER_PAGE);
    let logs = PaymentLogRepository::new(state.pool())
        .list(query.order_id, pagination)
        .await?;
    Ok(Json(logs))
}
