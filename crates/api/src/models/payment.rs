//! Payment gateway event log.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::types::Json;

use kirana_core::{OrderId, PaymentLogId};

/// One payment event: a client verification or a webhook delivery.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PaymentLog {
    pub id: PaymentLogId,
    pub order_id: Option<OrderId>,
    pub event: String,
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub amount: Option<Decimal>,
    pub status: String,
    pub payload: Json<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Values for a new payment log row.
#[derive(Debug, Clone, Default)]
pub struct NewPaymentLog {
    pub order_id: Option<OrderId>,
    pub event: String,
    pub razorpay_order_id: Option<String>,
    pub razorpay_payment_id: Option<String>,
    pub amount: Option<Decimal>,
    pub status: String,
    pub payload: serde_json::Value,
}
