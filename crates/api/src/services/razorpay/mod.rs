//! Razorpay payment gateway client.
//!
//! Creates gateway orders for online checkout and verifies the two kinds of
//! signatures Razorpay produces:
//!
//! - the checkout widget's `razorpay_signature`, an HMAC-SHA256 of
//!   `"{order_id}|{payment_id}"` keyed with the API secret
//! - the `X-Razorpay-Signature` webhook header, an HMAC-SHA256 of the raw
//!   request body keyed with the webhook secret
//!
//! Both are hex-encoded and compared in constant time.

mod error;
pub mod types;

pub use error::RazorpayError;
pub use types::{RazorpayOrder, WebhookEvent};

use hmac::{Hmac, Mac};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tracing::{debug, error, instrument};

use kirana_core::{Money, OrderId};

use crate::config::RazorpayConfig;
use types::{CreateOrderRequest, ErrorResponse, OrderNotes};

/// Razorpay REST API base URL.
const RAZORPAY_API_BASE: &str = "https://api.razorpay.com/v1";

/// Razorpay API client.
#[derive(Clone)]
pub struct RazorpayClient {
    client: Client,
    key_id: String,
    key_secret: SecretString,
    webhook_secret: SecretString,
}

impl std::fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl RazorpayClient {
    /// Create a new Razorpay client.
    #[must_use]
    pub fn new(client: Client, config: &RazorpayConfig) -> Self {
        Self {
            client,
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
            webhook_secret: config.webhook_secret.clone(),
        }
    }

    /// Public key id for the checkout widget.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Create a gateway order for `amount`.
    ///
    /// # Errors
    ///
    /// Returns error if the amount is invalid, the request fails, or
    /// Razorpay rejects it.
    #[instrument(skip(self), fields(amount = %amount.amount))]
    pub async fn create_order(
        &self,
        amount: Money,
        order_id: OrderId,
        order_number: &str,
    ) -> Result<RazorpayOrder, RazorpayError> {
        let paise = amount
            .to_minor_units()
            .filter(|p| *p > 0)
            .ok_or_else(|| RazorpayError::InvalidAmount(amount.amount.to_string()))?;

        let body = CreateOrderRequest {
            amount: paise,
            currency: amount.currency_code.code(),
            receipt: order_number,
            notes: OrderNotes {
                order_id: order_id.to_string(),
                order_number,
            },
        };

        let response = self
            .client
            .post(format!("{RAZORPAY_API_BASE}/orders"))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(&body)
            .send()
            .await
            .map_err(|e| RazorpayError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|e| e.error.description.or(e.error.code))
                .unwrap_or_else(|| status.to_string());
            error!(%status, error = %message, "Razorpay API error creating order");
            return Err(RazorpayError::Api(message));
        }

        let order: RazorpayOrder = response
            .json()
            .await
            .map_err(|e| RazorpayError::Response(e.to_string()))?;

        debug!(razorpay_order_id = %order.id, "Razorpay order created");
        Ok(order)
    }

    /// Verify the signature returned by the checkout widget.
    ///
    /// # Errors
    ///
    /// Returns `RazorpayError::InvalidSignature` on mismatch.
    pub fn verify_payment_signature(
        &self,
        razorpay_order_id: &str,
        razorpay_payment_id: &str,
        signature: &str,
    ) -> Result<(), RazorpayError> {
        let message = format!("{razorpay_order_id}|{razorpay_payment_id}");
        let expected = sign(&self.key_secret, message.as_bytes())?;

        if !constant_time_compare(&expected, signature.trim()) {
            return Err(RazorpayError::InvalidSignature(
                "Payment signature mismatch".to_string(),
            ));
        }
        debug!("Razorpay payment signature verified");
        Ok(())
    }

    /// Verify a webhook body against its `X-Razorpay-Signature` header.
    ///
    /// # Errors
    ///
    /// Returns `RazorpayError::InvalidSignature` on mismatch.
    pub fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> Result<(), RazorpayError> {
        let expected = sign(&self.webhook_secret, body)?;

        if !constant_time_compare(&expected, signature.trim()) {
            return Err(RazorpayError::InvalidSignature(
                "Webhook signature mismatch".to_string(),
            ));
        }
        debug!("Razorpay webhook signature verified");
        Ok(())
    }

    /// Verify and parse a webhook delivery.
    ///
    /// # Errors
    ///
    /// Returns `RazorpayError::InvalidSignature` on mismatch and
    /// `RazorpayError::InvalidPayload` if the body is not a webhook event.
    pub fn parse_webhook(&self, body: &[u8], signature: &str) -> Result<WebhookEvent, RazorpayError> {
        self.verify_webhook_signature(body, signature)?;
        serde_json::from_slice(body).map_err(|e| RazorpayError::InvalidPayload(e.to_string()))
    }
}

/// Hex-encoded HMAC-SHA256 of `message` keyed with `secret`.
fn sign(secret: &SecretString, message: &[u8]) -> Result<String, RazorpayError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|e| RazorpayError::InvalidSignature(e.to_string()))?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const KEY_SECRET: &str = "thisIsAKeySecret9f2kQ";
    const WEBHOOK_SECRET: &str = "whsec_Z7pQ2mL9vX4r";

    fn client() -> RazorpayClient {
        RazorpayClient::new(
            Client::new(),
            &RazorpayConfig {
                key_id: "rzp_test_1DP5mmOlF5G5ag".to_string(),
                key_secret: SecretString::from(KEY_SECRET),
                webhook_secret: SecretString::from(WEBHOOK_SECRET),
            },
        )
    }

    fn hmac_hex(key: &str, message: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes()).unwrap();
        mac.update(message);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }

    #[test]
    fn test_payment_signature_valid() {
        let signature = hmac_hex(KEY_SECRET, b"order_N1x2y3|pay_M9a8b7");
        assert!(
            client()
                .verify_payment_signature("order_N1x2y3", "pay_M9a8b7", &signature)
                .is_ok()
        );
    }

    #[test]
    fn test_payment_signature_tampered_ids_rejected() {
        let signature = hmac_hex(KEY_SECRET, b"order_N1x2y3|pay_M9a8b7");
        let result = client().verify_payment_signature("order_N1x2y3", "pay_OTHER", &signature);
        assert!(matches!(result, Err(RazorpayError::InvalidSignature(_))));

        let wrong_key = hmac_hex(WEBHOOK_SECRET, b"order_N1x2y3|pay_M9a8b7");
        assert!(
            client()
                .verify_payment_signature("order_N1x2y3", "pay_M9a8b7", &wrong_key)
                .is_err()
        );
    }

    #[test]
    fn test_webhook_signature_and_parse() {
        let body = br#"{"event":"payment.captured","payload":{"payment":{"entity":{"id":"pay_1","order_id":"order_1","amount":49900,"status":"captured"}}}}"#;
        let signature = hmac_hex(WEBHOOK_SECRET, body);

        let event = client().parse_webhook(body, &signature).unwrap();
        assert_eq!(event.event, "payment.captured");
        assert_eq!(event.razorpay_order_id(), Some("order_1"));
        assert_eq!(event.razorpay_payment_id(), Some("pay_1"));
        assert_eq!(event.amount_paise(), Some(49900));
    }

    #[test]
    fn test_webhook_tampered_body_rejected() {
        let body = br#"{"event":"payment.captured","payload":{}}"#;
        let signature = hmac_hex(WEBHOOK_SECRET, body);
        let tampered = br#"{"event":"payment.captured","payload":{} }"#;

        let result = client().parse_webhook(tampered, &signature);
        assert!(matches!(result, Err(RazorpayError::InvalidSignature(_))));
    }

    #[test]
    fn test_order_paid_event_uses_order_entity() {
        let body = br#"{"event":"order.paid","payload":{"order":{"entity":{"id":"order_9","amount":120000,"amount_paid":120000,"status":"paid"}}}}"#;
        let event: WebhookEvent = serde_json::from_slice(body).unwrap();
        assert_eq!(event.razorpay_order_id(), Some("order_9"));
        assert_eq!(event.razorpay_payment_id(), None);
        assert_eq!(event.amount_paise(), Some(120_000));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", client());
        assert!(!debug.contains(KEY_SECRET));
        assert!(!debug.contains(WEBHOOK_SECRET));
    }
}
