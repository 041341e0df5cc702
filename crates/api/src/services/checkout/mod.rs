//! Order placement.
//!
//! Placement validates the cart against current products, offers, coupon
//! and shipping settings, then writes everything in one transaction:
//!
//! 1. take stock with conditional decrements (any shortfall fails the order)
//! 2. insert the order and its lines
//! 3. count the coupon redemption
//! 4. clear the cart
//!
//! Online orders then get a Razorpay order for the total. If that call
//! fails the order is cancelled, stock and coupon are given back, and the
//! cart is restored.

mod error;

pub use error::CheckoutError;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{error, info, instrument, warn};

use kirana_core::coupon::{self, CouponRejection};
use kirana_core::merge::CartLine;
use kirana_core::pricing::{self, OrderTotals, ShippingRules};
use kirana_core::{AddressId, Money, PaymentMethod, ProductId, UserId};

use crate::db::orders::{NewOrder, NewOrderItem};
use crate::db::{
    AddressRepository, CartRepository, CouponRepository, OfferRepository, OrderRepository,
    ProductRepository, RepositoryError, UserRepository, carts, coupons, orders, products,
};
use crate::models::order::order_number;
use crate::models::{Coupon, OrderDetail, Product};
use crate::services::cache::CatalogCache;
use crate::services::email::{EmailService, Recipient};
use crate::services::orders::OrderService;
use crate::services::razorpay::RazorpayClient;

/// Body of `POST /api/orders`.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    pub address_id: AddressId,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

/// What the client needs to open the Razorpay checkout widget.
#[derive(Debug, Clone, Serialize)]
pub struct RazorpayCheckout {
    pub key_id: String,
    pub razorpay_order_id: String,
    /// Amount in paise.
    pub amount: i64,
    pub currency: String,
}

/// A placed order.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub order: OrderDetail,
    /// Present for online payment.
    pub razorpay: Option<RazorpayCheckout>,
}

/// Result of checking a coupon against the current cart.
#[derive(Debug, Clone, Serialize)]
pub struct CouponPreview {
    pub code: String,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total_after_discount: Decimal,
}

/// A cart line priced and checked against its product.
struct CheckedLine<'p> {
    product: &'p Product,
    unit_price: Decimal,
    quantity: i32,
    line_total: Decimal,
}

/// Checkout for one request.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
    cache: &'a CatalogCache,
    razorpay: &'a RazorpayClient,
    email: &'a EmailService,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        cache: &'a CatalogCache,
        razorpay: &'a RazorpayClient,
        email: &'a EmailService,
    ) -> Self {
        Self {
            pool,
            cache,
            razorpay,
            email,
        }
    }

    /// Place an order from the user's cart.
    ///
    /// # Errors
    ///
    /// See [`CheckoutError`] for each rejection.
    #[instrument(skip(self, request), fields(payment_method = ?request.payment_method))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        request: &PlaceOrderRequest,
    ) -> Result<PlacedOrder, CheckoutError> {
        let now = Utc::now();

        let lines = CartRepository::new(self.pool).lines(user_id).await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let address = AddressRepository::new(self.pool)
            .get(user_id, request.address_id)
            .await?
            .ok_or(CheckoutError::AddressNotFound)?;

        let ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        let catalog = ProductRepository::new(self.pool).get_many(&ids).await?;
        let offers = OfferRepository::new(self.pool).live_rules(now).await?;
        let checked = check_lines(&lines, &catalog, &offers, now)?;
        let subtotal = kirana_core::round_amount(checked.iter().map(|l| l.line_total).sum());

        let coupon = match request.coupon_code.as_deref().filter(|c| !c.trim().is_empty()) {
            Some(code) => Some(self.apply_coupon(user_id, code, subtotal, now).await?),
            None => None,
        };
        let discount = coupon.as_ref().map_or(Decimal::ZERO, |(_, d)| *d);

        let shipping = self.cache.shipping(self.pool).await?.rules();
        if request.payment_method == PaymentMethod::Cod && !shipping.cod_enabled {
            return Err(CheckoutError::CodUnavailable);
        }
        let totals = order_totals(&shipping, subtotal, discount, request.payment_method);

        let number = order_number(now, &mut rand::rng());
        let snapshot = address.snapshot();
        let new_order = NewOrder {
            order_number: &number,
            user_id,
            shipping_address: &snapshot,
            payment_method: request.payment_method,
            totals,
            coupon_code: coupon.as_ref().map(|(c, _)| c.code.as_str()),
        };
        let new_items: Vec<NewOrderItem> = checked
            .iter()
            .map(|l| NewOrderItem {
                product_id: l.product.id,
                product_name: l.product.name.clone(),
                image_url: l.product.primary_image().map(str::to_string),
                unit_price: l.unit_price,
                quantity: l.quantity,
                line_total: l.line_total,
            })
            .collect();

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let current = carts::lock_lines(&mut tx, user_id).await?;
        if !same_lines(&lines, &current) {
            return Err(CheckoutError::CartChanged);
        }
        for line in stock_lock_order(&checked) {
            if !products::decrement_stock(&mut tx, line.product.id, line.quantity).await? {
                drop(tx);
                let available = ProductRepository::new(self.pool)
                    .get_by_id(line.product.id)
                    .await?
                    .map_or(0, |p| p.stock.max(0));
                return Err(CheckoutError::InsufficientStock {
                    product_id: line.product.id,
                    name: line.product.name.clone(),
                    available,
                });
            }
        }
        let order = orders::insert(&mut tx, &new_order).await?;
        orders::insert_items(&mut tx, order.id, &new_items).await?;
        if let Some((coupon, _)) = &coupon
            && !coupons::redeem(&mut tx, coupon.id).await?
        {
            return Err(CouponRejection::UsageLimitReached.into());
        }
        carts::clear(&mut tx, user_id).await?;
        let items = orders::items(&mut tx, order.id).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        info!(
            order_number = %order.order_number,
            total = %order.total,
            items = items.len(),
            "Order placed"
        );

        let mut placed = PlacedOrder {
            order: OrderDetail { order, items },
            razorpay: None,
        };

        if request.payment_method == PaymentMethod::Razorpay {
            placed.razorpay = Some(self.open_gateway_order(&mut placed.order, user_id, &lines).await?);
        }

        if let Some(recipient) = self.recipient(user_id, &snapshot.full_name).await {
            self.email.spawn_order_confirmation(
                recipient,
                placed.order.order.clone(),
                placed.order.items.clone(),
            );
        }

        Ok(placed)
    }

    /// Check a coupon against the user's current cart without placing an order.
    ///
    /// # Errors
    ///
    /// Returns `EmptyCart`, `CouponNotFound`, or the coupon's rejection.
    pub async fn preview_coupon(&self, user_id: UserId, code: &str) -> Result<CouponPreview, CheckoutError> {
        let now = Utc::now();
        let lines = CartRepository::new(self.pool).lines(user_id).await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        let catalog = ProductRepository::new(self.pool).get_many(&ids).await?;
        let offers = OfferRepository::new(self.pool).live_rules(now).await?;
        let checked = check_lines(&lines, &catalog, &offers, now)?;
        let subtotal = kirana_core::round_amount(checked.iter().map(|l| l.line_total).sum());

        let (coupon, discount) = self.apply_coupon(user_id, code, subtotal, now).await?;
        Ok(CouponPreview {
            code: coupon.code,
            subtotal,
            discount,
            total_after_discount: subtotal - discount,
        })
    }

    async fn apply_coupon(
        &self,
        user_id: UserId,
        code: &str,
        subtotal: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(Coupon, Decimal), CheckoutError> {
        let code = coupon::normalize_code(code);
        let repo = CouponRepository::new(self.pool);
        let found = repo
            .get_by_code(&code)
            .await?
            .ok_or(CheckoutError::CouponNotFound)?;
        let uses = repo.uses_by_user(&found.code, user_id).await?;
        let discount = coupon::evaluate(&found.rules(), subtotal, uses, now)?;
        Ok((found, discount))
    }

    /// Create the Razorpay order, or undo the placement if that fails.
    async fn open_gateway_order(
        &self,
        detail: &mut OrderDetail,
        user_id: UserId,
        lines: &[CartLine],
    ) -> Result<RazorpayCheckout, CheckoutError> {
        let amount = Money::inr(detail.order.total);
        match self
            .razorpay
            .create_order(amount, detail.order.id, &detail.order.order_number)
            .await
        {
            Ok(gateway) => {
                OrderRepository::new(self.pool)
                    .set_razorpay_order_id(detail.order.id, &gateway.id)
                    .await?;
                detail.order.razorpay_order_id = Some(gateway.id.clone());
                Ok(RazorpayCheckout {
                    key_id: self.razorpay.key_id().to_string(),
                    razorpay_order_id: gateway.id,
                    amount: gateway.amount,
                    currency: gateway.currency,
                })
            }
            Err(e) => {
                error!(error = %e, order_number = %detail.order.order_number, "Razorpay order creation failed");
                OrderService::new(self.pool, self.email)
                    .abandon_unpaid(detail.order.id)
                    .await?;

                let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
                carts::lock(&mut tx, user_id).await?;
                carts::replace(&mut tx, user_id, lines).await?;
                tx.commit().await.map_err(RepositoryError::from)?;
                Err(e.into())
            }
        }
    }

    async fn recipient(&self, user_id: UserId, fallback_name: &str) -> Option<Recipient> {
        match UserRepository::new(self.pool).get_by_id(user_id).await {
            Ok(user) => user.map(|user| Recipient {
                name: if user.name.trim().is_empty() {
                    fallback_name.to_string()
                } else {
                    user.name
                },
                email: user.email.into_inner(),
            }),
            Err(e) => {
                warn!(error = %e, "Failed to load customer for confirmation email");
                None
            }
        }
    }
}

/// Check every line is purchasable and price it with the live offers.
fn check_lines<'p>(
    lines: &[CartLine],
    catalog: &'p [Product],
    offers: &[pricing::OfferRule],
    now: DateTime<Utc>,
) -> Result<Vec<CheckedLine<'p>>, CheckoutError> {
    let by_id: HashMap<ProductId, &Product> = catalog.iter().map(|p| (p.id, p)).collect();

    let mut checked = Vec::with_capacity(lines.len());
    for line in lines {
        let product = by_id
            .get(&line.product_id)
            .copied()
            .filter(|p| p.is_active)
            .ok_or_else(|| CheckoutError::ProductUnavailable {
                product_id: line.product_id,
                name: by_id
                    .get(&line.product_id)
                    .map_or_else(|| "A product".to_string(), |p| p.name.clone()),
            })?;
        if product.stock < line.quantity {
            return Err(CheckoutError::InsufficientStock {
                product_id: product.id,
                name: product.name.clone(),
                available: product.stock.max(0),
            });
        }

        let priced = pricing::price_lines(&[product.line_input(line.quantity)], offers, now);
        let Some(priced) = priced.first() else {
            continue;
        };
        checked.push(CheckedLine {
            product,
            unit_price: priced.unit_price,
            quantity: priced.quantity,
            line_total: priced.line_total,
        });
    }
    Ok(checked)
}

/// Whether two reads of a cart hold the same lines, ignoring order.
fn same_lines(a: &[CartLine], b: &[CartLine]) -> bool {
    let key = |lines: &[CartLine]| {
        let mut pairs: Vec<(ProductId, i32)> =
            lines.iter().map(|l| (l.product_id, l.quantity)).collect();
        pairs.sort_unstable();
        pairs
    };
    key(a) == key(b)
}

/// Lines in ascending product id order.
///
/// Writers that update several product rows in one transaction lock them in
/// this order.
fn stock_lock_order<'a, 'p>(checked: &'a [CheckedLine<'p>]) -> Vec<&'a CheckedLine<'p>> {
    let mut ordered: Vec<_> = checked.iter().collect();
    ordered.sort_by_key(|l| l.product.id);
    ordered
}

fn order_totals(
    shipping: &ShippingRules,
    subtotal: Decimal,
    discount: Decimal,
    method: PaymentMethod,
) -> OrderTotals {
    // Free-shipping threshold applies to the subtotal before the coupon.
    let fee = pricing::shipping_fee(shipping, subtotal, method);
    OrderTotals::new(subtotal, discount, fee)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use kirana_core::CategoryId;
    use kirana_core::pricing::{OfferRule, OfferTarget};

    use super::*;

    fn product(id: i32, price: i64, stock: i32, active: bool) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            slug: format!("product-{id}"),
            description: String::new(),
            category_id: Some(CategoryId::new(3)),
            category_name: None,
            category_slug: None,
            price: Decimal::from(price),
            mrp: None,
            stock,
            images: vec!["https://res.cloudinary.com/demo/p.jpg".to_string()],
            is_active: active,
            is_featured: false,
            rating_average: Decimal::ZERO,
            rating_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn line(id: i32, quantity: i32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            quantity,
        }
    }

    #[test]
    fn test_lines_priced_with_offers() {
        let now = Utc::now();
        let catalog = vec![product(1, 200, 10, true), product(2, 100, 10, true)];
        let offers = [OfferRule {
            target: OfferTarget::Product(ProductId::new(1)),
            percent: Decimal::from(10),
            active: true,
            starts_at: now - Duration::hours(1),
            ends_at: now + Duration::hours(1),
        }];

        let checked = check_lines(&[line(1, 2), line(2, 3)], &catalog, &offers, now);
        let Ok(checked) = checked else {
            panic!("lines should be purchasable");
        };
        assert_eq!(checked[0].unit_price, Decimal::from(180));
        assert_eq!(checked[0].line_total, Decimal::from(360));
        assert_eq!(checked[1].line_total, Decimal::from(300));
    }

    #[test]
    fn test_inactive_and_unknown_products_rejected() {
        let now = Utc::now();
        let catalog = vec![product(1, 200, 10, false)];

        assert!(matches!(
            check_lines(&[line(1, 1)], &catalog, &[], now),
            Err(CheckoutError::ProductUnavailable { ref name, .. }) if name == "Product 1"
        ));
        assert!(matches!(
            check_lines(&[line(7, 1)], &catalog, &[], now),
            Err(CheckoutError::ProductUnavailable { .. })
        ));
    }

    #[test]
    fn test_insufficient_stock_rejected() {
        let catalog = vec![product(1, 200, 2, true)];
        assert!(matches!(
            check_lines(&[line(1, 3)], &catalog, &[], Utc::now()),
            Err(CheckoutError::InsufficientStock { available: 2, .. })
        ));
    }

    #[test]
    fn test_stock_locked_in_product_id_order() {
        let catalog = vec![product(9, 100, 10, true), product(2, 100, 10, true), product(5, 100, 10, true)];
        let checked = check_lines(&[line(9, 1), line(2, 1), line(5, 1)], &catalog, &[], Utc::now());
        let Ok(checked) = checked else {
            panic!("lines should be purchasable");
        };

        // Cart order is kept for the order items
        let cart_order: Vec<i32> = checked.iter().map(|l| l.product.id.as_i32()).collect();
        assert_eq!(cart_order, vec![9, 2, 5]);

        let lock_order: Vec<i32> = stock_lock_order(&checked)
            .iter()
            .map(|l| l.product.id.as_i32())
            .collect();
        assert_eq!(lock_order, vec![2, 5, 9]);
    }

    #[test]
    fn test_cart_change_detected_between_reads() {
        assert!(same_lines(&[line(1, 2), line(4, 1)], &[line(4, 1), line(1, 2)]));
        assert!(!same_lines(&[line(1, 2)], &[line(1, 3)]));
        assert!(!same_lines(&[line(1, 2)], &[line(1, 2), line(5, 1)]));
    }

    #[test]
    fn test_totals_use_pre_discount_subtotal_for_free_shipping() {
        let rules = ShippingRules::default();
        let totals = order_totals(&rules, Decimal::from(500), Decimal::from(100), PaymentMethod::Razorpay);
        assert_eq!(totals.shipping_fee, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::from(400));

        let cod = ShippingRules {
            cod_fee: Decimal::from(30),
            ..rules
        };
        let totals = order_totals(&cod, Decimal::from(200), Decimal::ZERO, PaymentMethod::Cod);
        assert_eq!(totals.shipping_fee, rules.flat_fee + Decimal::from(30));
    }
}
