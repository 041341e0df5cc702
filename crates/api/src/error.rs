//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Responses are JSON `{"error": "<message>"}`. Server-side failures get a
//! generic message; their details only go to logs and Sentry.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::cart::CartError;
use crate::services::checkout::CheckoutError;
use crate::services::cloudinary::CloudinaryError;
use crate::services::google::GoogleError;
use crate::services::orders::OrderError;
use crate::services::razorpay::RazorpayError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Cart or wishlist change rejected.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Order placement failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Order lifecycle change failed.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Payment verification failed.
    #[error("Payment error: {0}")]
    Payment(#[from] RazorpayError),

    /// Image upload failed.
    #[error("Upload error: {0}")]
    Upload(#[from] CloudinaryError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An optional integration is not configured.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

const INTERNAL: &str = "Internal server error";
const UPSTREAM: &str = "External service error";

fn repository(err: &RepositoryError) -> (StatusCode, String) {
    match err {
        RepositoryError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
        RepositoryError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        RepositoryError::Database(_) | RepositoryError::DataCorruption(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string())
        }
    }
}

fn google(err: &GoogleError) -> (StatusCode, String) {
    match err {
        GoogleError::NotConfigured => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Google sign-in is not available".to_string(),
        ),
        GoogleError::InvalidToken(_) => (
            StatusCode::UNAUTHORIZED,
            "Google sign-in failed".to_string(),
        ),
        GoogleError::Request(_) | GoogleError::Response(_) => {
            (StatusCode::BAD_GATEWAY, UPSTREAM.to_string())
        }
    }
}

fn auth(err: &AuthError) -> (StatusCode, String) {
    match err {
        AuthError::InvalidCredentials | AuthError::UserNotFound => {
            (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
        }
        AuthError::UserAlreadyExists => (
            StatusCode::CONFLICT,
            "An account with this email already exists".to_string(),
        ),
        AuthError::WeakPassword(msg) | AuthError::InvalidProfile(msg) => {
            (StatusCode::BAD_REQUEST, msg.clone())
        }
        AuthError::InvalidEmail(_) => (StatusCode::BAD_REQUEST, "Invalid email address".to_string()),
        AuthError::Blocked => (
            StatusCode::FORBIDDEN,
            "This account has been blocked".to_string(),
        ),
        AuthError::Google(e) => google(e),
        AuthError::Repository(e) => repository(e),
        AuthError::PasswordHash => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string()),
    }
}

fn razorpay(err: &RazorpayError) -> (StatusCode, String) {
    match err {
        RazorpayError::InvalidSignature(_) => (
            StatusCode::BAD_REQUEST,
            "Payment verification failed".to_string(),
        ),
        RazorpayError::InvalidPayload(_) => (StatusCode::BAD_REQUEST, "Invalid payload".to_string()),
        RazorpayError::InvalidAmount(_)
        | RazorpayError::Request(_)
        | RazorpayError::Response(_)
        | RazorpayError::Api(_) => (StatusCode::BAD_GATEWAY, "Payment gateway error".to_string()),
    }
}

fn cart(err: &CartError) -> (StatusCode, String) {
    match err {
        CartError::ProductNotFound => (StatusCode::NOT_FOUND, err.to_string()),
        CartError::ProductUnavailable { .. } | CartError::InsufficientStock { .. } => {
            (StatusCode::CONFLICT, err.to_string())
        }
        CartError::InvalidQuantity => (StatusCode::BAD_REQUEST, err.to_string()),
        CartError::Repository(e) => repository(e),
    }
}

fn order(err: &OrderError) -> (StatusCode, String) {
    match err {
        OrderError::NotFound => (StatusCode::NOT_FOUND, "Order not found".to_string()),
        OrderError::InvalidTransition { .. } => (StatusCode::CONFLICT, err.to_string()),
        OrderError::NotAwaitingPayment => (StatusCode::BAD_REQUEST, err.to_string()),
        OrderError::Payment(e) => razorpay(e),
        OrderError::Repository(e) => repository(e),
    }
}

fn checkout(err: &CheckoutError) -> (StatusCode, String) {
    match err {
        CheckoutError::EmptyCart
        | CheckoutError::Coupon(_)
        | CheckoutError::CodUnavailable => (StatusCode::BAD_REQUEST, err.to_string()),
        CheckoutError::CouponNotFound => (StatusCode::BAD_REQUEST, "Invalid coupon code".to_string()),
        CheckoutError::AddressNotFound => (StatusCode::NOT_FOUND, err.to_string()),
        CheckoutError::CartChanged
        | CheckoutError::ProductUnavailable { .. }
        | CheckoutError::InsufficientStock { .. } => {
            (StatusCode::CONFLICT, err.to_string())
        }
        CheckoutError::Gateway(e) => razorpay(e),
        CheckoutError::Order(e) => order(e),
        CheckoutError::Repository(e) => repository(e),
    }
}

fn upload(err: &CloudinaryError) -> (StatusCode, String) {
    match err {
        CloudinaryError::NotConfigured => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Image uploads are not available".to_string(),
        ),
        CloudinaryError::UnsupportedType(_) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, err.to_string()),
        CloudinaryError::InvalidSize { size: 0, .. } => {
            (StatusCode::BAD_REQUEST, "Empty file".to_string())
        }
        CloudinaryError::InvalidSize { .. } => (StatusCode::PAYLOAD_TOO_LARGE, err.to_string()),
        CloudinaryError::Request(_) | CloudinaryError::Api(_) => {
            (StatusCode::BAD_GATEWAY, UPSTREAM.to_string())
        }
    }
}

impl AppError {
    /// Status code and client-safe message.
    fn parts(&self) -> (StatusCode, String) {
        match self {
            Self::Database(e) => repository(e),
            Self::Auth(e) => auth(e),
            Self::Cart(e) => cart(e),
            Self::Checkout(e) => checkout(e),
            Self::Order(e) => order(e),
            Self::Payment(e) => razorpay(e),
            Self::Upload(e) => upload(e),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests, please try again later".to_string(),
            ),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.parts();

        // Capture server errors to Sentry
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("checkout", "Order placed", Some(&[("order_number", "ORD-20260309-ABC234")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use kirana_core::coupon::CouponRejection;
    use kirana_core::OrderStatus;

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body_json(err: AppError) -> serde_json::Value {
        let body = axum::body::to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_checkout_status_codes() {
        assert_eq!(
            get_status(CheckoutError::EmptyCart.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CheckoutError::Coupon(CouponRejection::Expired).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(get_status(CheckoutError::CartChanged.into()), StatusCode::CONFLICT);
        assert_eq!(
            get_status(
                CheckoutError::InsufficientStock {
                    product_id: kirana_core::ProductId::new(1),
                    name: "Ghee".to_string(),
                    available: 0,
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CheckoutError::Gateway(RazorpayError::Api("down".to_string())).into()),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_lifecycle_and_integration_status_codes() {
        assert_eq!(
            get_status(
                OrderError::InvalidTransition {
                    from: OrderStatus::Shipped,
                    to: OrderStatus::Pending,
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(RazorpayError::InvalidSignature("x".to_string()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CloudinaryError::NotConfigured.into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(AuthError::Google(GoogleError::NotConfigured).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(get_status(AuthError::Blocked.into()), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_body_is_json_error() {
        let body = body_json(CheckoutError::Coupon(CouponRejection::Expired).into()).await;
        assert_eq!(body, json!({ "error": "coupon has expired" }));
    }

    #[tokio::test]
    async fn test_internal_details_not_exposed() {
        let body = body_json(AppError::Internal("connection refused at 10.0.0.5".to_string())).await;
        assert_eq!(body, json!({ "error": "Internal server error" }));
    }
}
