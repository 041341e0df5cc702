//! Aggregate queries for the admin dashboard.
//!
//! Revenue counts paid orders that were not cancelled. A delivered cash on
//! delivery order is marked paid on delivery, so it enters revenue then.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use kirana_core::{OrderStatus, PaymentStatus, ProductId, UserRole};

use super::RepositoryError;

/// Headline numbers.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub revenue: Decimal,
    pub order_count: i64,
    pub paid_order_count: i64,
    pub customer_count: i64,
    pub product_count: i64,
    pub average_order_value: Decimal,
    pub orders_by_status: Vec<StatusCount>,
}

/// Number of orders in one status.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

/// One day of sales.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DailySales {
    pub day: NaiveDate,
    pub orders: i64,
    pub revenue: Decimal,
}

/// A product ranked by units sold.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TopProduct {
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub units_sold: i64,
    pub revenue: Decimal,
}

/// Repository for dashboard aggregates.
pub struct AnalyticsRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AnalyticsRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Dashboard summary.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any query fails.
    pub async fn summary(&self) -> Result<Summary, RepositoryError> {
        let (revenue, paid_order_count): (Decimal, i64) = sqlx::query_as(
            r"
            SELECT COALESCE(SUM(total), 0), COUNT(*)
            FROM orders WHERE payment_status = $1 AND status <> $2
            ",
        )
        .bind(PaymentStatus::Paid)
        .bind(OrderStatus::Cancelled)
        .fetch_one(self.pool)
        .await?;

        let (order_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
            .fetch_one(self.pool)
            .await?;

        let (customer_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = $1")
                .bind(UserRole::Customer)
                .fetch_one(self.pool)
                .await?;

        let (product_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM products WHERE is_active")
                .fetch_one(self.pool)
                .await?;

        let orders_by_status = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM orders GROUP BY status ORDER BY status",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(Summary {
            revenue,
            order_count,
            paid_order_count,
            customer_count,
            product_count,
            average_order_value: average(revenue, paid_order_count),
            orders_by_status,
        })
    }

    /// Paid sales per day for the last `days` days, including days without
    /// sales, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn daily_sales(&self, days: i32) -> Result<Vec<DailySales>, RepositoryError> {
        let rows = sqlx::query_as::<_, DailySales>(
            r"
            SELECT d.day::date AS day,
                   COUNT(o.id) AS orders,
                   COALESCE(SUM(o.total), 0) AS revenue
            FROM generate_series(CURRENT_DATE - ($1 - 1), CURRENT_DATE, INTERVAL '1 day') AS d(day)
            LEFT JOIN orders o
                ON o.created_at::date = d.day::date
               AND o.payment_status = $2
               AND o.status <> $3
            GROUP BY d.day
            ORDER BY d.day
            ",
        )
        .bind(days)
        .bind(PaymentStatus::Paid)
        .bind(OrderStatus::Cancelled)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Best sellers by units across non-cancelled orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn top_products(&self, limit: i64) -> Result<Vec<TopProduct>, RepositoryError> {
        let rows = sqlx::query_as::<_, TopProduct>(
            r"
            SELECT i.product_id,
                   MAX(i.product_name) AS product_name,
                   SUM(i.quantity)::bigint AS units_sold,
                   SUM(i.line_total) AS revenue
            FROM order_items i
            JOIN orders o ON o.id = i.order_id
            WHERE o.status <> $1
            GROUP BY i.product_id
            ORDER BY units_sold DESC, revenue DESC
            LIMIT $2
            ",
        )
        .bind(OrderStatus::Cancelled)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}

fn average(revenue: Decimal, count: i64) -> Decimal {
    if count == 0 {
        return Decimal::ZERO;
    }
    (revenue / Decimal::from(count)).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_order_value() {
        assert_eq!(average(Decimal::ZERO, 0), Decimal::ZERO);
        assert_eq!(average(Decimal::from(1000), 3), Decimal::new(33333, 2));
    }
}
