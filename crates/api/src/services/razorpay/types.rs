//! Razorpay API request and response types.

use serde::{Deserialize, Serialize};

/// Body for `POST /v1/orders`.
#[derive(Debug, Serialize)]
pub struct CreateOrderRequest<'a> {
    /// Amount in paise.
    pub amount: i64,
    pub currency: &'a str,
    /// Our order number, echoed back on payments.
    pub receipt: &'a str,
    pub notes: OrderNotes<'a>,
}

/// Free-form notes attached to a gateway order.
#[derive(Debug, Serialize)]
pub struct OrderNotes<'a> {
    pub order_id: String,
    pub order_number: &'a str,
}

/// A Razorpay order.
#[derive(Debug, Clone, Deserialize)]
pub struct RazorpayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub receipt: Option<String>,
}

/// Error body returned by the API.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A webhook delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

/// Entities carried by a webhook. Which ones are present depends on the event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub payment: Option<EntityWrapper<PaymentEntity>>,
    #[serde(default)]
    pub order: Option<EntityWrapper<OrderEntity>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntityWrapper<T> {
    pub entity: T,
}

/// A payment as sent in webhooks.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    /// Amount in paise.
    pub amount: i64,
    pub status: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// An order as sent in webhooks.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderEntity {
    pub id: String,
    pub amount: i64,
    #[serde(default)]
    pub amount_paid: i64,
    pub status: String,
    #[serde(default)]
    pub receipt: Option<String>,
}

impl WebhookEvent {
    /// Gateway order id the event refers to.
    #[must_use]
    pub fn razorpay_order_id(&self) -> Option<&str> {
        self.payload
            .order
            .as_ref()
            .map(|o| o.entity.id.as_str())
            .or_else(|| {
                self.payload
                    .payment
                    .as_ref()
                    .and_then(|p| p.entity.order_id.as_deref())
            })
    }

    /// Gateway payment id the event refers to.
    #[must_use]
    pub fn razorpay_payment_id(&self) -> Option<&str> {
        self.payload.payment.as_ref().map(|p| p.entity.id.as_str())
    }

    /// Amount in paise, from the payment if present, else the order.
    #[must_use]
    pub fn amount_paise(&self) -> Option<i64> {
        self.payload
            .payment
            .as_ref()
            .map(|p| p.entity.amount)
            .or_else(|| self.payload.order.as_ref().map(|o| o.entity.amount))
    }
}
