//! Dashboard analytics.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::db::analytics::{DailySales, Summary, TopProduct};
use crate::db::products::LowStockProduct;
use crate::db::{AnalyticsRepository, ProductRepository};
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::state::AppState;

const DEFAULT_DAYS: i32 = 30;
const MAX_DAYS: i32 = 365;
const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;
const DEFAULT_LOW_STOCK: i32 = 5;

#[derive(Debug, Default, Deserialize)]
pub struct SalesQuery {
    pub days: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LowStockQuery {
    pub threshold: Option<i32>,
    pub limit: Option<i64>,
}

fn clamp_days(days: Option<i32>) -> i32 {
    days.unwrap_or(DEFAULT_DAYS).clamp(1, MAX_DAYS)
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Revenue, counts, and orders by status.
///
/// GET /api/admin/analytics/summary
pub async fn summary(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Summary>> {
    Ok(Json(AnalyticsRepository::new(state.pool()).summary().await?))
}

/// Daily paid sales for the last `days` days.
///
/// GET /api/admin/analytics/sales?days=
pub async fn sales(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<SalesQuery>,
) -> Result<Json<Vec<DailySales>>> {
    let series = AnalyticsRepository::new(state.pool())
        .daily_sales(clamp_days(query.days))
        .await?;
    Ok(Json(series))
}

/// Best sellers by units.
///
/// GET /api/admin/analytics/top-products?limit=
pub async fn top_products(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<TopProduct>>> {
    let products = AnalyticsRepository::new(state.pool())
        .top_products(clamp_limit(query.limit))
        .await?;
    Ok(Json(products))
}

/// Active products at or below the stock threshold.
///
/// GET /api/admin/analytics/low-stock?threshold=
pub async fn low_stock(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<LowStockQuery>,
) -> Result<Json<Vec<LowStockProduct>>> {
    let threshold = query.threshold.unwrap_or(DEFAULT_LOW_STOCK).max(0);
    let products = ProductRepository::new(state.pool())
        .low_stock(threshold, clamp_limit(query.limit))
        .await?;
    Ok(Json(products))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_days_clamped() {
        assert_eq!(clamp_days(None), 30);
        assert_eq!(clamp_days(Some(0)), 1);
        assert_eq!(clamp_days(Some(1000)), 365);
        assert_eq!(clamp_days(Some(7)), 7);
    }

    #[test]
    fn test_limit_clamped() {
        assert_eq!(clamp_limit(None), 10);
        assert_eq!(clamp_limit(Some(-3)), 1);
        assert_eq!(clamp_limit(Some(500)), 100);
    }
}
