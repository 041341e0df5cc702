//! Order lifecycle and payment events.
//!
//! Every change runs in a transaction that row-locks the order first, so a
//! webhook and an admin update arriving together are applied one after the
//! other. Customer emails go out after commit on detached tasks.

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{info, instrument, warn};

use kirana_core::{OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, UserId};

use crate::db::{OrderRepository, PaymentLogRepository, RepositoryError, UserRepository, coupons, orders, products};
use crate::models::{Order, OrderItem};
use crate::models::payment::NewPaymentLog;
use crate::services::email::{EmailService, Recipient};
use crate::services::razorpay::{RazorpayClient, RazorpayError, WebhookEvent};

/// Errors from order changes.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order not found")]
    NotFound,

    #[error("cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("order is not awaiting online payment")]
    NotAwaitingPayment,

    #[error(transparent)]
    Payment(#[from] RazorpayError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Body posted by the checkout widget after a successful payment.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfirmation {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

/// Order lifecycle operations.
pub struct OrderService<'a> {
    pool: &'a PgPool,
    email: &'a EmailService,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, email: &'a EmailService) -> Self {
        Self { pool, email }
    }

    /// Cancel the caller's own order while it is still pending or confirmed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for someone else's order and `InvalidTransition`
    /// once the order has moved on.
    #[instrument(skip(self))]
    pub async fn cancel_by_customer(&self, user_id: UserId, order_id: OrderId) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let order = orders::lock(&mut tx, order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or(OrderError::NotFound)?;

        if !order.status.is_customer_cancellable() {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: OrderStatus::Cancelled,
            });
        }

        let cancelled = cancel(&mut tx, &order).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        info!(order_number = %cancelled.order_number, "Order cancelled by customer");
        self.notify(cancelled.clone()).await;
        Ok(cancelled)
    }

    /// Move an order to `next` on behalf of an admin.
    ///
    /// Forward moves may skip steps. Delivering a cash-on-delivery order
    /// marks it paid.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` or `InvalidTransition`.
    #[instrument(skip(self))]
    pub async fn update_status(&self, order_id: OrderId, next: OrderStatus) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let order = orders::lock(&mut tx, order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        if !order.status.can_transition_to(next) {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: next,
            });
        }

        let updated = if next == OrderStatus::Cancelled {
            cancel(&mut tx, &order).await?
        } else {
            let mut updated = orders::set_status(&mut tx, order.id, next).await?;
            if next == OrderStatus::Delivered
                && updated.payment_method == PaymentMethod::Cod
                && updated.payment_status != PaymentStatus::Paid
            {
                updated = orders::set_payment_status(&mut tx, order.id, PaymentStatus::Paid, None).await?;
            }
            updated
        };
        tx.commit().await.map_err(RepositoryError::from)?;

        info!(
            order_number = %updated.order_number,
            from = %order.status,
            to = %updated.status,
            "Order status updated"
        );
        self.notify(updated.clone()).await;
        Ok(updated)
    }

    /// Cancel an online order whose gateway order could not be created.
    ///
    /// # Errors
    ///
    /// Returns error if the order cannot be loaded or updated.
    pub(crate) async fn abandon_unpaid(&self, order_id: OrderId) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let order = orders::lock(&mut tx, order_id)
            .await?
            .ok_or(OrderError::NotFound)?;
        let cancelled = cancel(&mut tx, &order).await?;
        let cancelled =
            orders::set_payment_status(&mut tx, cancelled.id, PaymentStatus::Failed, None).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        warn!(order_number = %cancelled.order_number, "Order abandoned after gateway failure");
        Ok(cancelled)
    }

    // =========================================================================
    // Payments
    // =========================================================================

    /// Verify the checkout widget's signature and mark the order paid.
    ///
    /// A payment log row is written whether or not the signature matches.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the gateway order is not one of the caller's,
    /// `Payment(InvalidSignature)` on mismatch.
    #[instrument(skip(self, razorpay, confirmation), fields(razorpay_order_id = %confirmation.razorpay_order_id))]
    pub async fn verify_payment(
        &self,
        razorpay: &RazorpayClient,
        user_id: UserId,
        confirmation: &PaymentConfirmation,
    ) -> Result<Order, OrderError> {
        let order = OrderRepository::new(self.pool)
            .get_by_razorpay_order_id(&confirmation.razorpay_order_id)
            .await?
            .filter(|o| o.user_id == user_id)
            .ok_or(OrderError::NotFound)?;

        let verified = razorpay.verify_payment_signature(
            &confirmation.razorpay_order_id,
            &confirmation.razorpay_payment_id,
            &confirmation.razorpay_signature,
        );

        self.log_payment(NewPaymentLog {
            order_id: Some(order.id),
            event: "payment.verify".to_string(),
            razorpay_order_id: Some(confirmation.razorpay_order_id.clone()),
            razorpay_payment_id: Some(confirmation.razorpay_payment_id.clone()),
            amount: Some(order.total),
            status: if verified.is_ok() { "verified" } else { "signature_mismatch" }.to_string(),
            payload: serde_json::json!({
                "razorpay_order_id": confirmation.razorpay_order_id,
                "razorpay_payment_id": confirmation.razorpay_payment_id,
            }),
        })
        .await;

        if let Err(e) = verified {
            warn!(order_number = %order.order_number, "Payment signature mismatch");
            return Err(e.into());
        }

        self.mark_paid(order.id, &confirmation.razorpay_payment_id).await
    }

    /// Apply a verified webhook event.
    ///
    /// Unknown events are logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns error if the order cannot be updated.
    #[instrument(skip(self, event, payload), fields(event = %event.event))]
    pub async fn apply_webhook(&self, event: &WebhookEvent, payload: serde_json::Value) -> Result<(), OrderError> {
        let order = match event.razorpay_order_id() {
            Some(id) => OrderRepository::new(self.pool).get_by_razorpay_order_id(id).await?,
            None => None,
        };

        self.log_payment(NewPaymentLog {
            order_id: order.as_ref().map(|o| o.id),
            event: event.event.clone(),
            razorpay_order_id: event.razorpay_order_id().map(str::to_string),
            razorpay_payment_id: event.razorpay_payment_id().map(str::to_string),
            amount: event.amount_paise().map(|p| Decimal::new(p, 2)),
            status: "received".to_string(),
            payload,
        })
        .await;

        let Some(order) = order else {
            warn!("Webhook for unknown Razorpay order");
            return Ok(());
        };

        match webhook_action(&event.event, order.payment_method) {
            WebhookAction::MarkPaid => {
                let payment_id = event.razorpay_payment_id().unwrap_or_default();
                self.mark_paid(order.id, payment_id).await?;
            }
            WebhookAction::MarkFailed => {
                self.mark_failed(order.id, event.razorpay_payment_id()).await?;
            }
            WebhookAction::Ignore => info!(
                order_number = %order.order_number,
                payment_method = ?order.payment_method,
                "Ignoring webhook event"
            ),
        }
        Ok(())
    }

    /// Record a successful payment. Repeated calls leave a paid order as is.
    ///
    /// A payment for an order cancelled meanwhile is flagged for refund.
    async fn mark_paid(&self, order_id: OrderId, payment_id: &str) -> Result<Order, OrderError> {
        let payment_id = Some(payment_id).filter(|p| !p.is_empty());
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let order = orders::lock(&mut tx, order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        if order.payment_method != PaymentMethod::Razorpay {
            return Err(OrderError::NotAwaitingPayment);
        }
        if matches!(
            order.payment_status,
            PaymentStatus::Paid | PaymentStatus::RefundPending | PaymentStatus::Refunded
        ) {
            return Ok(order);
        }

        let updated = if order.status == OrderStatus::Cancelled {
            warn!(order_number = %order.order_number, "Payment received for cancelled order");
            orders::set_payment_status(&mut tx, order.id, PaymentStatus::RefundPending, payment_id).await?
        } else {
            let paid = orders::set_payment_status(&mut tx, order.id, PaymentStatus::Paid, payment_id).await?;
            if paid.status == OrderStatus::Pending {
                orders::set_status(&mut tx, order.id, OrderStatus::Confirmed).await?
            } else {
                paid
            }
        };
        tx.commit().await.map_err(RepositoryError::from)?;

        info!(order_number = %updated.order_number, "Payment recorded");
        if updated.status != order.status {
            self.notify(updated.clone()).await;
        }
        Ok(updated)
    }

    async fn mark_failed(&self, order_id: OrderId, payment_id: Option<&str>) -> Result<(), OrderError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let order = orders::lock(&mut tx, order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        // A failed attempt can be followed by a successful retry on the same
        // gateway order, so only an unpaid order is marked failed.
        if order.payment_status == PaymentStatus::Pending {
            orders::set_payment_status(&mut tx, order.id, PaymentStatus::Failed, payment_id).await?;
            info!(order_number = %order.order_number, "Payment failed");
        }
        tx.commit().await.map_err(RepositoryError::from)?;
        Ok(())
    }

    async fn log_payment(&self, log: NewPaymentLog) {
        if let Err(e) = PaymentLogRepository::new(self.pool).insert(&log).await {
            warn!(error = %e, event = %log.event, "Failed to write payment log");
        }
    }

    /// Email the customer about the order's current status.
    async fn notify(&self, order: Order) {
        match UserRepository::new(self.pool).get_by_id(order.user_id).await {
            Ok(Some(user)) => {
                let recipient = Recipient {
                    email: user.email.into_inner(),
                    name: user.name,
                };
                self.email.spawn_status_update(recipient, order);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to load customer for status email"),
        }
    }
}

/// What a webhook event does to the order it names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WebhookAction {
    MarkPaid,
    MarkFailed,
    Ignore,
}

/// Only online orders take payment events; anything else is acknowledged
/// without a change.
fn webhook_action(event: &str, method: PaymentMethod) -> WebhookAction {
    if method != PaymentMethod::Razorpay {
        return WebhookAction::Ignore;
    }
    match event {
        "payment.captured" | "order.paid" => WebhookAction::MarkPaid,
        "payment.failed" => WebhookAction::MarkFailed,
        _ => WebhookAction::Ignore,
    }
}

/// Quantities to put back per product, in ascending product id order.
///
/// Lines whose product was deleted are skipped.
fn restock_order(items: &[OrderItem]) -> Vec<(ProductId, i32)> {
    let mut restock: Vec<_> = items
        .iter()
        .filter_map(|i| i.product_id.map(|id| (id, i.quantity)))
        .collect();
    restock.sort_by_key(|(id, _)| *id);
    restock
}

/// Cancel `order` on the caller's transaction: put stock back, give back the
/// coupon redemption, and flag a paid online order for refund.
async fn cancel(conn: &mut PgConnection, order: &Order) -> Result<Order, RepositoryError> {
    for (product_id, quantity) in restock_order(&orders::items(&mut *conn, order.id).await?) {
        products::restore_stock(&mut *conn, product_id, quantity).await?;
    }
    if let Some(code) = order.coupon_code.as_deref() {
        coupons::release(&mut *conn, code).await?;
    }

    let cancelled = orders::set_status(&mut *conn, order.id, OrderStatus::Cancelled).await?;
    if cancelled.payment_method == PaymentMethod::Razorpay && cancelled.payment_status == PaymentStatus::Paid {
        return orders::set_payment_status(&mut *conn, order.id, PaymentStatus::RefundPending, None).await;
    }
    Ok(cancelled)
}

#[cfg(test)]
mod tests {
    use kirana_core::OrderItemId;

    use super::*;

    fn item(id: i32, product_id: Option<i32>, quantity: i32) -> OrderItem {
        OrderItem {
            id: OrderItemId::new(id),
            order_id: OrderId::new(1),
            product_id: product_id.map(ProductId::new),
            product_name: format!("Item {id}"),
            image_url: None,
            unit_price: Decimal::from(100),
            quantity,
            line_total: Decimal::from(100 * quantity),
        }
    }

    #[test]
    fn test_webhook_actions_for_online_orders() {
        let method = PaymentMethod::Razorpay;
        assert_eq!(webhook_action("payment.captured", method), WebhookAction::MarkPaid);
        assert_eq!(webhook_action("order.paid", method), WebhookAction::MarkPaid);
        assert_eq!(webhook_action("payment.failed", method), WebhookAction::MarkFailed);
        assert_eq!(webhook_action("refund.created", method), WebhookAction::Ignore);
    }

    #[test]
    fn test_webhook_for_cod_order_is_acknowledged() {
        for event in ["payment.captured", "order.paid", "payment.failed"] {
            assert_eq!(webhook_action(event, PaymentMethod::Cod), WebhookAction::Ignore);
        }
    }

    #[test]
    fn test_restock_sorted_by_product() {
        let items = [item(1, Some(8), 2), item(2, None, 5), item(3, Some(3), 1)];
        assert_eq!(
            restock_order(&items),
            vec![(ProductId::new(3), 1), (ProductId::new(8), 2)]
        );
    }
}
