//! Coupon repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};

use kirana_core::{CouponId, DiscountKind, OrderStatus, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::Coupon;

const COUPON_COLUMNS: &str = "id, code, description, kind, value, max_discount, min_order_amount, \
                              usage_limit, used_count, per_user_limit, starts_at, expires_at, \
                              is_active, created_at, updated_at";

/// Fields an admin sets on a coupon.
#[derive(Debug, Clone, Deserialize)]
pub struct CouponInput {
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
    pub kind: DiscountKind,
    pub value: Decimal,
    #[serde(default)]
    pub max_discount: Option<Decimal>,
    #[serde(default)]
    pub min_order_amount: Decimal,
    #[serde(default)]
    pub usage_limit: Option<i32>,
    #[serde(default = "default_per_user_limit")]
    pub per_user_limit: i32,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_per_user_limit() -> i32 {
    1
}

const fn default_true() -> bool {
    true
}

impl CouponInput {
    /// Check value ranges and the validity window.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.code.trim().is_empty() {
            return Err("code is required".to_string());
        }
        if self.value <= Decimal::ZERO {
            return Err("value must be positive".to_string());
        }
        if self.kind == DiscountKind::Percentage && self.value > Decimal::ONE_HUNDRED {
            return Err("percentage value cannot exceed 100".to_string());
        }
        if self.min_order_amount < Decimal::ZERO {
            return Err("min_order_amount cannot be negative".to_string());
        }
        if self.usage_limit.is_some_and(|l| l <= 0) || self.per_user_limit <= 0 {
            return Err("limits must be positive".to_string());
        }
        if self.starts_at.is_some_and(|s| s >= self.expires_at) {
            return Err("starts_at must be before expires_at".to_string());
        }
        Ok(())
    }
}

/// Repository for coupons.
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a coupon by its normalized code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let coupon = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(self.pool)
        .await?;
        Ok(coupon)
    }

    /// All coupons, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Coupon>, RepositoryError> {
        let coupons = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(coupons)
    }

    /// Orders this user has placed with the coupon, excluding cancelled ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn uses_by_user(&self, code: &str, user_id: UserId) -> Result<i64, RepositoryError> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM orders WHERE coupon_code = $1 AND user_id = $2 AND status <> $3",
        )
        .bind(code)
        .bind(user_id)
        .bind(OrderStatus::Cancelled)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Create a coupon.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code is taken.
    pub async fn create(&self, input: &CouponInput, code: &str) -> Result<Coupon, RepositoryError> {
        sqlx::query_as::<_, Coupon>(&format!(
            r"
            INSERT INTO coupons
                (code, description, kind, value, max_discount, min_order_amount,
                 usage_limit, per_user_limit, starts_at, expires_at, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {COUPON_COLUMNS}
            "
        ))
        .bind(code)
        .bind(input.description.as_deref())
        .bind(input.kind)
        .bind(input.value)
        .bind(input.max_discount)
        .bind(input.min_order_amount)
        .bind(input.usage_limit)
        .bind(input.per_user_limit)
        .bind(input.starts_at)
        .bind(input.expires_at)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "coupon code already exists"))
    }

    /// Replace a coupon's fields. `used_count` is kept.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon does not exist.
    pub async fn update(
        &self,
        id: CouponId,
        input: &CouponInput,
        code: &str,
    ) -> Result<Coupon, RepositoryError> {
        sqlx::query_as::<_, Coupon>(&format!(
            r"
            UPDATE coupons
            SET code = $2, description = $3, kind = $4, value = $5, max_discount = $6,
                min_order_amount = $7, usage_limit = $8, per_user_limit = $9,
                starts_at = $10, expires_at = $11, is_active = $12
            WHERE id = $1
            RETURNING {COUPON_COLUMNS}
            "
        ))
        .bind(id)
        .bind(code)
        .bind(input.description.as_deref())
        .bind(input.kind)
        .bind(input.value)
        .bind(input.max_discount)
        .bind(input.min_order_amount)
        .bind(input.usage_limit)
        .bind(input.per_user_limit)
        .bind(input.starts_at)
        .bind(input.expires_at)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "coupon code already exists"))?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a coupon. Orders keep the code they were placed with.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon does not exist.
    pub async fn delete(&self, id: CouponId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM coupons WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

/// Count one redemption, unless the global limit has been reached meanwhile.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn redeem(conn: &mut PgConnection, id: CouponId) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE coupons SET used_count = used_count + 1
        WHERE id = $1 AND (usage_limit IS NULL OR used_count < usage_limit)
        ",
    )
    .bind(id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Give back a redemption when an order using `code` is cancelled.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn release(conn: &mut PgConnection, code: &str) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE coupons SET used_count = used_count - 1 WHERE code = $1 AND used_count > 0")
        .bind(code)
        .execute(conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn input() -> CouponInput {
        CouponInput {
            code: "diwali10".to_string(),
            description: None,
            kind: DiscountKind::Percentage,
            value: Decimal::from(10),
            max_discount: Some(Decimal::from(200)),
            min_order_amount: Decimal::from(500),
            usage_limit: Some(100),
            per_user_limit: 1,
            starts_at: None,
            expires_at: Utc::now() + Duration::days(30),
            is_active: true,
        }
    }

    #[test]
    fn test_coupon_input_validation() {
        assert!(input().validate().is_ok());

        let mut bad = input();
        bad.value = Decimal::from(120);
        assert_eq!(
            bad.validate(),
            Err("percentage value cannot exceed 100".to_string())
        );

        let mut bad = input();
        bad.starts_at = Some(bad.expires_at + Duration::days(1));
        assert!(bad.validate().is_err());

        let mut bad = input();
        bad.usage_limit = Some(0);
        assert!(bad.validate().is_err());
    }
}
