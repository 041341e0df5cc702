//! Coupon records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use kirana_core::coupon::CouponRules;
use kirana_core::{CouponId, DiscountKind};

/// A discount code.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub description: Option<String>,
    pub kind: DiscountKind,
    pub value: Decimal,
    pub max_discount: Option<Decimal>,
    pub min_order_amount: Decimal,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub per_user_limit: i32,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Coupon {
    #[must_use]
    pub const fn rules(&self) -> CouponRules {
        CouponRules {
            kind: self.kind,
            value: self.value,
            max_discount: self.max_discount,
            min_order_amount: self.min_order_amount,
            usage_limit: self.usage_limit,
            used_count: self.used_count,
            per_user_limit: self.per_user_limit,
            starts_at: self.starts_at,
            expires_at: self.expires_at,
            active: self.is_active,
        }
    }
}
