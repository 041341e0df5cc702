//! Order pricing rules.
//!
//! Prices flow through three steps:
//!
//! 1. A product's list price is reduced by the best active [`OfferRule`]
//!    targeting the whole store, its category, or the product itself.
//! 2. Lines are summed into a subtotal.
//! 3. The coupon discount is subtracted and shipping is added according to
//!    [`ShippingRules`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::money::round_amount;
use crate::{CategoryId, PaymentMethod, ProductId};

/// What an offer applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum OfferTarget {
    /// Every product in the store.
    Store,
    /// Products in one category.
    Category(CategoryId),
    /// A single product.
    Product(ProductId),
}

impl OfferTarget {
    /// Build a target from the nullable columns an offer row stores.
    ///
    /// A product target wins over a category target if both are set.
    #[must_use]
    pub const fn from_columns(category: Option<CategoryId>, product: Option<ProductId>) -> Self {
        match (product, category) {
            (Some(p), _) => Self::Product(p),
            (None, Some(c)) => Self::Category(c),
            (None, None) => Self::Store,
        }
    }

    fn covers(self, product: ProductId, category: Option<CategoryId>) -> bool {
        match self {
            Self::Store => true,
            Self::Category(c) => category == Some(c),
            Self::Product(p) => p == product,
        }
    }
}

/// The pricing-relevant part of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferRule {
    pub target: OfferTarget,
    /// Percent off, 0-100.
    pub percent: Decimal,
    pub active: bool,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl OfferRule {
    /// Whether the offer is live at `now`.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.active && self.starts_at <= now && now < self.ends_at
    }
}

/// Best live offer percentage for a product, or zero.
#[must_use]
pub fn best_offer_percent(
    offers: &[OfferRule],
    product: ProductId,
    category: Option<CategoryId>,
    now: DateTime<Utc>,
) -> Decimal {
    offers
        .iter()
        .filter(|o| o.is_live(now) && o.target.covers(product, category))
        .map(|o| o.percent.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED))
        .max()
        .unwrap_or(Decimal::ZERO)
}

/// List price reduced by `percent`, rounded to paise.
#[must_use]
pub fn discounted_price(price: Decimal, percent: Decimal) -> Decimal {
    if percent <= Decimal::ZERO {
        return round_amount(price);
    }
    let factor = (Decimal::ONE_HUNDRED - percent) / Decimal::ONE_HUNDRED;
    round_amount(price * factor).max(Decimal::ZERO)
}

/// Shipping configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingRules {
    /// Fee charged when the subtotal is below the threshold.
    pub flat_fee: Decimal,
    /// Subtotal at or above which shipping is free.
    pub free_shipping_threshold: Decimal,
    /// Whether cash on delivery is offered at all.
    pub cod_enabled: bool,
    /// Extra fee for cash on delivery.
    pub cod_fee: Decimal,
}

impl Default for ShippingRules {
    fn default() -> Self {
        Self {
            flat_fee: Decimal::new(49, 0),
            free_shipping_threshold: Decimal::new(499, 0),
            cod_enabled: true,
            cod_fee: Decimal::ZERO,
        }
    }
}

/// Shipping fee for an order of `subtotal` paid with `method`.
#[must_use]
pub fn shipping_fee(rules: &ShippingRules, subtotal: Decimal, method: PaymentMethod) -> Decimal {
    let base = if subtotal >= rules.free_shipping_threshold {
        Decimal::ZERO
    } else {
        rules.flat_fee
    };
    let cod = match method {
        PaymentMethod::Cod => rules.cod_fee,
        PaymentMethod::Razorpay => Decimal::ZERO,
    };
    round_amount(base + cod)
}

/// Input line for pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineInput {
    pub product_id: ProductId,
    pub category_id: Option<CategoryId>,
    pub list_price: Decimal,
    pub quantity: i32,
}

/// A priced order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// Price every line with the best live offer.
#[must_use]
pub fn price_lines(lines: &[LineInput], offers: &[OfferRule], now: DateTime<Utc>) -> Vec<PricedLine> {
    lines
        .iter()
        .map(|line| {
            let percent = best_offer_percent(offers, line.product_id, line.category_id, now);
            let unit_price = discounted_price(line.list_price, percent);
            PricedLine {
                product_id: line.product_id,
                unit_price,
                quantity: line.quantity,
                line_total: round_amount(unit_price * Decimal::from(line.quantity)),
            }
        })
        .collect()
}

/// Sum of line totals.
#[must_use]
pub fn subtotal(lines: &[PricedLine]) -> Decimal {
    round_amount(lines.iter().map(|l| l.line_total).sum())
}

/// Final money breakdown for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping_fee: Decimal,
    pub total: Decimal,
}

impl OrderTotals {
    /// Combine the parts; the discount never exceeds the subtotal and the
    /// total is never negative.
    #[must_use]
    pub fn new(subtotal: Decimal, discount: Decimal, shipping_fee: Decimal) -> Self {
        let discount = discount.clamp(Decimal::ZERO, subtotal.max(Decimal::ZERO));
        let total = (subtotal - discount + shipping_fee).max(Decimal::ZERO);
        Self {
            subtotal: round_amount(subtotal),
            discount: round_amount(discount),
            shipping_fee: round_amount(shipping_fee),
            total: round_amount(total),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn dec(units: i64, scale: u32) -> Decimal {
        Decimal::new(units, scale)
    }

    fn offer(target: OfferTarget, percent: i64, now: DateTime<Utc>) -> OfferRule {
        OfferRule {
            target,
            percent: Decimal::from(percent),
            active: true,
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(1),
        }
    }

    #[test]
    fn test_best_offer_picks_highest_matching() {
        let now = Utc::now();
        let offers = [
            offer(OfferTarget::Store, 5, now),
            offer(OfferTarget::Category(CategoryId::new(2)), 15, now),
            offer(OfferTarget::Product(ProductId::new(9)), 10, now),
        ];
        let best = best_offer_percent(&offers, ProductId::new(9), Some(CategoryId::new(2)), now);
        assert_eq!(best, Decimal::from(15));

        let other = best_offer_percent(&offers, ProductId::new(1), Some(CategoryId::new(3)), now);
        assert_eq!(other, Decimal::from(5));
    }

    #[test]
    fn test_expired_and_inactive_offers_ignored() {
        let now = Utc::now();
        let mut expired = offer(OfferTarget::Store, 30, now);
        expired.ends_at = now;
        let mut inactive = offer(OfferTarget::Store, 40, now);
        inactive.active = false;
        let mut future = offer(OfferTarget::Store, 50, now);
        future.starts_at = now + Duration::hours(1);

        let best = best_offer_percent(&[expired, inactive, future], ProductId::new(1), None, now);
        assert_eq!(best, Decimal::ZERO);
    }

    #[test]
    fn test_discounted_price_rounds_to_paise() {
        assert_eq!(discounted_price(dec(999, 0), Decimal::from(15)), dec(84_915, 2));
        assert_eq!(discounted_price(dec(333, 0), Decimal::from(10)), dec(29_970, 2));
        assert_eq!(discounted_price(dec(100, 0), Decimal::ZERO), dec(100, 0));
    }

    #[test]
    fn test_shipping_fee_threshold_and_cod() {
        let rules = ShippingRules {
            flat_fee: dec(49, 0),
            free_shipping_threshold: dec(499, 0),
            cod_enabled: true,
            cod_fee: dec(20, 0),
        };
        assert_eq!(shipping_fee(&rules, dec(498, 0), PaymentMethod::Razorpay), dec(49, 0));
        assert_eq!(shipping_fee(&rules, dec(499, 0), PaymentMethod::Razorpay), Decimal::ZERO);
        assert_eq!(shipping_fee(&rules, dec(499, 0), PaymentMethod::Cod), dec(20, 0));
        assert_eq!(shipping_fee(&rules, dec(100, 0), PaymentMethod::Cod), dec(69, 0));
    }

    #[test]
    fn test_price_lines_and_subtotal() {
        let now = Utc::now();
        let lines = [
            LineInput {
                product_id: ProductId::new(1),
                category_id: None,
                list_price: dec(250, 0),
                quantity: 2,
            },
            LineInput {
                product_id: ProductId::new(2),
                category_id: Some(CategoryId::new(4)),
                list_price: dec(1000, 0),
                quantity: 1,
            },
        ];
        let offers = [offer(OfferTarget::Category(CategoryId::new(4)), 20, now)];
        let priced = price_lines(&lines, &offers, now);

        assert_eq!(priced[0].line_total, dec(500, 0));
        assert_eq!(priced[1].unit_price, dec(800, 0));
        assert_eq!(subtotal(&priced), dec(1300, 0));
    }

    #[test]
    fn test_totals_never_negative() {
        let totals = OrderTotals::new(dec(100, 0), dec(150, 0), dec(49, 0));
        assert_eq!(totals.discount, dec(100, 0));
        assert_eq!(totals.total, dec(49, 0));
    }

    #[test]
    fn test_offer_target_from_columns() {
        assert_eq!(OfferTarget::from_columns(None, None), OfferTarget::Store);
        assert_eq!(
            OfferTarget::from_columns(Some(CategoryId::new(1)), Some(ProductId::new(2))),
            OfferTarget::Product(ProductId::new(2))
        );
    }
}
