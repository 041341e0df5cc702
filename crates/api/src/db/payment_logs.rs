//! Payment log repository.

use sqlx::PgPool;
use sqlx::types::Json;

use kirana_core::OrderId;

use super::{Page, Pagination, RepositoryError};
use crate::models::PaymentLog;
use crate::models::payment::NewPaymentLog;

const LOG_COLUMNS: &str = "id, order_id, event, razorpay_order_id, razorpay_payment_id, amount, \
                           status, payload, created_at";

/// Repository for payment event logs.
pub struct PaymentLogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PaymentLogRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append a log entry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn insert(&self, log: &NewPaymentLog) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO payment_logs
                (order_id, event, razorpay_order_id, razorpay_payment_id, amount, status, payload)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(log.order_id)
        .bind(&log.event)
        .bind(log.razorpay_order_id.as_deref())
        .bind(log.razorpay_payment_id.as_deref())
        .bind(log.amount)
        .bind(&log.status)
        .bind(Json(&log.payload))
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Logs, newest first, optionally for one order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        order_id: Option<OrderId>,
        pagination: Pagination,
    ) -> Result<Page<PaymentLog>, RepositoryError> {
        let logs = sqlx::query_as::<_, PaymentLog>(&format!(
            "SELECT {LOG_COLUMNS} FROM payment_logs WHERE $1::int IS NULL OR order_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(order_id)
        .bind(pagination.per_page)
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM payment_logs WHERE $1::int IS NULL OR order_id = $1",
        )
        .bind(order_id)
        .fetch_one(self.pool)
        .await?;

        Ok(pagination.wrap(logs, total))
    }
}
