//! Transactional email for order events.
//!
//! Messages are rendered with Askama (HTML and plain text) and delivered
//! through the Resend HTTP API. Without `RESEND_API_KEY` the service logs
//! each message it would have sent and returns `Ok`, so local development
//! and tests need no mail provider.

use askama::Template;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};
use url::Url;

use kirana_core::{Money, OrderStatus, PaymentMethod};

use crate::config::EmailConfig;
use crate::models::{Order, OrderItem, ShippingAddress};

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// One rendered order line.
struct EmailLine {
    name: String,
    quantity: i32,
    total: String,
}

/// HTML template for the order confirmation.
#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    customer_name: &'a str,
    order_number: &'a str,
    lines: &'a [EmailLine],
    subtotal: &'a str,
    has_discount: bool,
    discount: &'a str,
    shipping_fee: &'a str,
    total: &'a str,
    address: &'a str,
    cash_on_delivery: bool,
    track_url: &'a str,
}

/// Plain text template for the order confirmation.
#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    customer_name: &'a str,
    order_number: &'a str,
    lines: &'a [EmailLine],
    subtotal: &'a str,
    has_discount: bool,
    discount: &'a str,
    shipping_fee: &'a str,
    total: &'a str,
    address: &'a str,
    cash_on_delivery: bool,
    track_url: &'a str,
}

/// HTML template for a status change.
#[derive(Template)]
#[template(path = "email/order_status.html")]
struct OrderStatusHtml<'a> {
    customer_name: &'a str,
    order_number: &'a str,
    status: &'a str,
    message: &'a str,
    track_url: &'a str,
}

/// Plain text template for a status change.
#[derive(Template)]
#[template(path = "email/order_status.txt")]
struct OrderStatusText<'a> {
    customer_name: &'a str,
    order_number: &'a str,
    status: &'a str,
    message: &'a str,
    track_url: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// HTTP request failed.
    #[error("email request failed: {0}")]
    Request(String),

    /// Resend rejected the message.
    #[error("email provider error: {0}")]
    Api(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

#[derive(Clone)]
struct ResendCredentials {
    api_key: SecretString,
    from_address: String,
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    client: Client,
    resend: Option<ResendCredentials>,
    frontend_url: Url,
}

impl std::fmt::Debug for EmailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailService")
            .field("enabled", &self.resend.is_some())
            .field("frontend_url", &self.frontend_url.as_str())
            .finish_non_exhaustive()
    }
}

/// Recipient of an order email.
#[derive(Debug, Clone)]
pub struct Recipient {
    pub email: String,
    pub name: String,
}

impl EmailService {
    /// Create the service. `config` is `None` when email is not configured.
    #[must_use]
    pub fn new(client: Client, config: Option<&EmailConfig>, frontend_url: Url) -> Self {
        Self {
            client,
            resend: config.map(|c| ResendCredentials {
                api_key: c.api_key.clone(),
                from_address: c.from_address.clone(),
            }),
            frontend_url,
        }
    }

    /// Whether messages are actually delivered.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.resend.is_some()
    }

    /// Public page where a customer can follow an order.
    #[must_use]
    pub fn track_url(&self, order_number: &str) -> String {
        self.frontend_url
            .join(&format!("orders/track/{order_number}"))
            .map_or_else(|_| self.frontend_url.to_string(), Into::into)
    }

    /// Send the order confirmation.
    ///
    /// # Errors
    ///
    /// Returns error if rendering fails or Resend rejects the message.
    #[instrument(skip_all, fields(order_number = %order.order_number))]
    pub async fn send_order_confirmation(
        &self,
        to: &Recipient,
        order: &Order,
        items: &[OrderItem],
    ) -> Result<(), EmailError> {
        let lines: Vec<EmailLine> = items
            .iter()
            .map(|item| EmailLine {
                name: item.product_name.clone(),
                quantity: item.quantity,
                total: Money::inr(item.line_total).display(),
            })
            .collect();
        let subtotal = Money::inr(order.subtotal).display();
        let discount = Money::inr(order.discount).display();
        let shipping_fee = Money::inr(order.shipping_fee).display();
        let total = Money::inr(order.total).display();
        let address = format_address(&order.shipping_address);
        let track_url = self.track_url(&order.order_number);
        let cash_on_delivery = order.payment_method == PaymentMethod::Cod;
        let has_discount = !order.discount.is_zero();

        let html = OrderConfirmationHtml {
            customer_name: &to.name,
            order_number: &order.order_number,
            lines: &lines,
            subtotal: &subtotal,
            has_discount,
            discount: &discount,
            shipping_fee: &shipping_fee,
            total: &total,
            address: &address,
            cash_on_delivery,
            track_url: &track_url,
        }
        .render()?;
        let text = OrderConfirmationText {
            customer_name: &to.name,
            order_number: &order.order_number,
            lines: &lines,
            subtotal: &subtotal,
            has_discount,
            discount: &discount,
            shipping_fee: &shipping_fee,
            total: &total,
            address: &address,
            cash_on_delivery,
            track_url: &track_url,
        }
        .render()?;

        let subject = format!("Your Kirana order {} is confirmed", order.order_number);
        self.send(&to.email, &subject, &text, &html).await
    }

    /// Send a status-change notice.
    ///
    /// # Errors
    ///
    /// Returns error if rendering fails or Resend rejects the message.
    #[instrument(skip_all, fields(order_number = %order.order_number, status = %order.status))]
    pub async fn send_status_update(&self, to: &Recipient, order: &Order) -> Result<(), EmailError> {
        let track_url = self.track_url(&order.order_number);
        let message = status_message(order.status, order.payment_method);
        let status = order.status.as_str();

        let html = OrderStatusHtml {
            customer_name: &to.name,
            order_number: &order.order_number,
            status,
            message,
            track_url: &track_url,
        }
        .render()?;
        let text = OrderStatusText {
            customer_name: &to.name,
            order_number: &order.order_number,
            status,
            message,
            track_url: &track_url,
        }
        .render()?;

        let subject = format!("Order {} is {status}", order.order_number);
        self.send(&to.email, &subject, &text, &html).await
    }

    /// Send the confirmation in the background, logging failures.
    pub fn spawn_order_confirmation(&self, to: Recipient, order: Order, items: Vec<OrderItem>) {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.send_order_confirmation(&to, &order, &items).await {
                warn!(error = %e, order_number = %order.order_number, "Failed to send order confirmation");
            }
        });
    }

    /// Send a status update in the background, logging failures.
    pub fn spawn_status_update(&self, to: Recipient, order: Order) {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.send_status_update(&to, &order).await {
                warn!(error = %e, order_number = %order.order_number, "Failed to send status update");
            }
        });
    }

    async fn send(&self, to: &str, subject: &str, text: &str, html: &str) -> Result<(), EmailError> {
        let Some(resend) = &self.resend else {
            info!(to = %to, subject = %subject, "Email not configured, skipping send");
            return Ok(());
        };

        let response = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(resend.api_key.expose_secret())
            .json(&SendEmailRequest {
                from: &resend.from_address,
                to: [to],
                subject,
                html,
                text,
            })
            .send()
            .await
            .map_err(|e| EmailError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmailError::Api(format!("{status}: {body}")));
        }

        info!(to = %to, subject = %subject, "Email sent successfully");
        Ok(())
    }
}

fn format_address(address: &ShippingAddress) -> String {
    let mut parts = vec![address.full_name.clone(), address.line1.clone()];
    if let Some(line2) = address.line2.as_deref().filter(|l| !l.is_empty()) {
        parts.push(line2.to_string());
    }
    parts.push(format!("{}, {} {}", address.city, address.state, address.postal_code));
    parts.push(address.country.clone());
    parts.join(", ")
}

const fn status_message(status: OrderStatus, method: PaymentMethod) -> &'static str {
    match (status, method) {
        (OrderStatus::Pending, _) => "We have your order and are waiting to confirm it.",
        (OrderStatus::Confirmed, _) => "Your order is confirmed and will be packed soon.",
        (OrderStatus::Processing, _) => "We are packing your order.",
        (OrderStatus::Shipped, PaymentMethod::Cod) => {
            "Your order is on its way. Please keep the amount ready for cash on delivery."
        }
        (OrderStatus::Shipped, PaymentMethod::Razorpay) => "Your order is on its way.",
        (OrderStatus::Delivered, _) => "Your order has been delivered. We hope you enjoy it!",
        (OrderStatus::Cancelled, PaymentMethod::Razorpay) => {
            "Your order has been cancelled. Any payment made will be refunded to the original method."
        }
        (OrderStatus::Cancelled, PaymentMethod::Cod) => "Your order has been cancelled.",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Asha Rao".to_string(),
            phone: "9876543210".to_string(),
            line1: "12 MG Road".to_string(),
            line2: None,
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            postal_code: "560001".to_string(),
            country: "India".to_string(),
        }
    }

    #[test]
    fn test_format_address_skips_empty_line2() {
        assert_eq!(
            format_address(&address()),
            "Asha Rao, 12 MG Road, Bengaluru, Karnataka 560001, India"
        );
    }

    #[test]
    fn test_track_url_joins_frontend() {
        let frontend = Url::parse("https://shop.kirana.in/").unwrap();
        let service = EmailService::new(Client::new(), None, frontend);
        assert_eq!(
            service.track_url("ORD-20260309-ABC234"),
            "https://shop.kirana.in/orders/track/ORD-20260309-ABC234"
        );
        assert!(!service.is_enabled());
    }

    #[test]
    fn test_status_template_renders() {
        let text = OrderStatusText {
            customer_name: "Asha",
            order_number: "ORD-20260309-ABC234",
            status: "shipped",
            message: status_message(OrderStatus::Shipped, PaymentMethod::Razorpay),
            track_url: "https://shop.kirana.in/orders/track/ORD-20260309-ABC234",
        }
        .render()
        .unwrap();
        assert!(text.contains("ORD-20260309-ABC234 is now shipped"));
    }
}
