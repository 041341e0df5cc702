//! Coupon eligibility and discount calculation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::DiscountKind;
use crate::types::money::round_amount;

/// The rule-bearing fields of a coupon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponRules {
    pub kind: DiscountKind,
    pub value: Decimal,
    /// Cap on the discount for percentage coupons.
    pub max_discount: Option<Decimal>,
    pub min_order_amount: Decimal,
    /// Total redemptions allowed across all customers.
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    /// Redemptions allowed per customer.
    pub per_user_limit: i32,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
}

/// Why a coupon cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CouponRejection {
    #[error("coupon is not active")]
    Inactive,
    #[error("coupon is not valid yet")]
    NotStarted,
    #[error("coupon has expired")]
    Expired,
    #[error("coupon usage limit has been reached")]
    UsageLimitReached,
    #[error("you have already used this coupon")]
    PerUserLimitReached,
    #[error("order subtotal must be at least {minimum}")]
    BelowMinimum { minimum: Decimal },
}

/// Normalize a user-entered coupon code for lookup.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Check a coupon against an order and compute its discount.
///
/// `uses_by_customer` is how many non-cancelled orders this customer has
/// already placed with the coupon.
///
/// # Errors
///
/// Returns the first [`CouponRejection`] that applies, in the order:
/// inactive, not started, expired, global limit, per-customer limit,
/// minimum subtotal.
pub fn evaluate(
    rules: &CouponRules,
    subtotal: Decimal,
    uses_by_customer: i64,
    now: DateTime<Utc>,
) -> Result<Decimal, CouponRejection> {
    if !rules.active {
        return Err(CouponRejection::Inactive);
    }
    if rules.starts_at.is_some_and(|start| now < start) {
        return Err(CouponRejection::NotStarted);
    }
    if rules.expires_at <= now {
        return Err(CouponRejection::Expired);
    }
    if rules
        .usage_limit
        .is_some_and(|limit| rules.used_count >= limit)
    {
        return Err(CouponRejection::UsageLimitReached);
    }
    if uses_by_customer >= i64::from(rules.per_user_limit) {
        return Err(CouponRejection::PerUserLimitReached);
    }
    if subtotal < rules.min_order_amount {
        return Err(CouponRejection::BelowMinimum {
            minimum: rules.min_order_amount,
        });
    }

    Ok(discount_for(rules, subtotal))
}

/// Discount a coupon yields on `subtotal`, ignoring eligibility.
#[must_use]
pub fn discount_for(rules: &CouponRules, subtotal: Decimal) -> Decimal {
    let raw = match rules.kind {
        DiscountKind::Percentage => {
            let pct = rules.value.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
            let amount = subtotal * pct / Decimal::ONE_HUNDRED;
            rules.max_discount.map_or(amount, |cap| amount.min(cap))
        }
        DiscountKind::Fixed => rules.value,
    };
    round_amount(raw.clamp(Decimal::ZERO, subtotal.max(Decimal::ZERO)))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn rules(kind: DiscountKind, value: i64) -> CouponRules {
        CouponRules {
            kind,
            value: Decimal::from(value),
            max_discount: None,
            min_order_amount: Decimal::ZERO,
            usage_limit: None,
            used_count: 0,
            per_user_limit: 1,
            starts_at: None,
            expires_at: Utc::now() + Duration::days(7),
            active: true,
        }
    }

    #[test]
    fn test_percentage_discount_with_cap() {
        let mut r = rules(DiscountKind::Percentage, 20);
        assert_eq!(
            evaluate(&r, Decimal::from(1000), 0, Utc::now()),
            Ok(Decimal::from(200))
        );

        r.max_discount = Some(Decimal::from(150));
        assert_eq!(
            evaluate(&r, Decimal::from(1000), 0, Utc::now()),
            Ok(Decimal::from(150))
        );
    }

    #[test]
    fn test_fixed_discount_capped_at_subtotal() {
        let r = rules(DiscountKind::Fixed, 300);
        assert_eq!(
            evaluate(&r, Decimal::from(250), 0, Utc::now()),
            Ok(Decimal::from(250))
        );
    }

    #[test]
    fn test_expired_coupon_rejected() {
        let mut r = rules(DiscountKind::Fixed, 50);
        let now = Utc::now();
        r.expires_at = now - Duration::seconds(1);
        assert_eq!(
            evaluate(&r, Decimal::from(500), 0, now),
            Err(CouponRejection::Expired)
        );

        r.expires_at = now;
        assert_eq!(
            evaluate(&r, Decimal::from(500), 0, now),
            Err(CouponRejection::Expired)
        );
    }

    #[test]
    fn test_not_started_and_inactive() {
        let now = Utc::now();
        let mut r = rules(DiscountKind::Fixed, 50);
        r.starts_at = Some(now + Duration::hours(2));
        assert_eq!(
            evaluate(&r, Decimal::from(500), 0, now),
            Err(CouponRejection::NotStarted)
        );

        r.active = false;
        assert_eq!(
            evaluate(&r, Decimal::from(500), 0, now),
            Err(CouponRejection::Inactive)
        );
    }

    #[test]
    fn test_usage_limits() {
        let mut r = rules(DiscountKind::Fixed, 50);
        r.usage_limit = Some(10);
        r.used_count = 10;
        assert_eq!(
            evaluate(&r, Decimal::from(500), 0, Utc::now()),
            Err(CouponRejection::UsageLimitReached)
        );

        r.used_count = 3;
        assert_eq!(
            evaluate(&r, Decimal::from(500), 1, Utc::now()),
            Err(CouponRejection::PerUserLimitReached)
        );

        r.per_user_limit = 2;
        assert!(evaluate(&r, Decimal::from(500), 1, Utc::now()).is_ok());
    }

    #[test]
    fn test_minimum_order_amount() {
        let mut r = rules(DiscountKind::Percentage, 10);
        r.min_order_amount = Decimal::from(999);
        assert_eq!(
            evaluate(&r, Decimal::from(998), 0, Utc::now()),
            Err(CouponRejection::BelowMinimum {
                minimum: Decimal::from(999)
            })
        );
        assert_eq!(
            evaluate(&r, Decimal::from(999), 0, Utc::now()),
            Ok(Decimal::new(9990, 2))
        );
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("  diwali10 "), "DIWALI10");
    }
}
