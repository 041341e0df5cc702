//! Razorpay-related errors.

use thiserror::Error;

/// Errors that can occur when interacting with Razorpay.
#[derive(Debug, Error)]
pub enum RazorpayError {
    /// HTTP request failed.
    #[error("Razorpay request failed: {0}")]
    Request(String),

    /// Failed to parse response.
    #[error("Razorpay response error: {0}")]
    Response(String),

    /// Razorpay API returned an error.
    #[error("Razorpay API error: {0}")]
    Api(String),

    /// Payment or webhook signature did not match.
    #[error("Invalid Razorpay signature: {0}")]
    InvalidSignature(String),

    /// Webhook body could not be parsed.
    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    /// Amount does not fit the gateway's integer paise.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}
