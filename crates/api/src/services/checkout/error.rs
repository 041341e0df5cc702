//! Checkout errors.

use thiserror::Error;

use kirana_core::ProductId;
use kirana_core::coupon::CouponRejection;

use crate::db::RepositoryError;
use crate::services::orders::OrderError;
use crate::services::razorpay::RazorpayError;

/// Errors that can occur while placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Nothing to order.
    #[error("your cart is empty")]
    EmptyCart,

    /// The cart changed while the order was being placed.
    #[error("your cart changed, please review it and try again")]
    CartChanged,

    /// The address is missing or belongs to someone else.
    #[error("address not found")]
    AddressNotFound,

    /// A product was removed or deactivated.
    #[error("{name} is no longer available")]
    ProductUnavailable { product_id: ProductId, name: String },

    /// Not enough stock for a line.
    #[error("only {available} of {name} left in stock")]
    InsufficientStock {
        product_id: ProductId,
        name: String,
        available: i32,
    },

    /// No coupon with that code.
    #[error("coupon not found")]
    CouponNotFound,

    /// The coupon does not apply to this order.
    #[error(transparent)]
    Coupon(#[from] CouponRejection),

    /// Cash on delivery is switched off.
    #[error("cash on delivery is not available")]
    CodUnavailable,

    /// The payment gateway could not create an order.
    #[error("payment gateway error: {0}")]
    Gateway(#[from] RazorpayError),

    /// Rolling back after a gateway failure went wrong.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// Database error.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
