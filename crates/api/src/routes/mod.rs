//! HTTP route handlers for the Kirana API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                         - Liveness
//! GET  /health/ready                   - Database readiness
//!
//! # Auth (rate limited)
//! POST /api/auth/register | login | google | logout
//! GET  /api/auth/me
//! PUT  /api/auth/profile | password
//!
//! # Catalog
//! GET  /api/categories[/{slug}]
//! GET  /api/products                   - Filters: category, q, min_price, max_price, featured, sort
//! GET  /api/products/{product}         - By slug
//! GET  /api/products/{product}/reviews - By id
//! POST /api/products/{product}/reviews - By id (user)
//! PUT/DELETE /api/reviews/{id}
//!
//! # Cart and wishlist (user)
//! GET/DELETE /api/cart, POST /api/cart/items, PUT/DELETE /api/cart/items/{product_id}
//! POST /api/cart/merge
//! GET /api/wishlist, POST/DELETE /api/wishlist/{product_id}, POST /api/wishlist/merge
//!
//! # Account (user)
//! GET/POST /api/addresses, PUT/DELETE /api/addresses/{id}, POST /api/addresses/{id}/default
//! POST /api/orders, GET /api/orders, GET /api/orders/{id}, GET /api/orders/track/{number}
//! POST /api/orders/{id}/cancel
//! POST /api/coupons/validate
//!
//! # Content
//! GET  /api/offers | testimonials | shipping
//!
//! # Payments
//! POST /api/payments/verify-payment    - Widget callback (user, rate limited)
//! POST /api/payments/webhook           - Razorpay webhook (signature checked)
//!
//! # Admin
//! /api/admin/...                       - See [`admin`]
//! ```

pub mod addresses;
pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod content;
pub mod health;
pub mod orders;
pub mod payments;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter, payment_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/google", post(auth::google))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/profile", put(auth::update_profile))
        .route("/password", put(auth::change_password))
}

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/categories", get(catalog::list_categories))
        .route("/categories/{slug}", get(catalog::get_category))
        .route("/products", get(catalog::list_products))
        .route("/products/{product}", get(catalog::get_product))
        .route(
            "/products/{product}/reviews",
            get(catalog::list_reviews).post(catalog::create_review),
        )
        .route(
            "/reviews/{id}",
            put(catalog::update_review).delete(catalog::delete_review),
        )
}

/// Create the cart and wishlist routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(cart::get_cart).delete(cart::clear_cart))
        .route("/cart/items", post(cart::add_item))
        .route(
            "/cart/items/{product_id}",
            put(cart::set_quantity).delete(cart::remove_item),
        )
        .route("/cart/merge", post(cart::merge_cart))
        .route("/wishlist", get(cart::get_wishlist))
        .route("/wishlist/merge", post(cart::merge_wishlist))
        .route(
            "/wishlist/{product_id}",
            post(cart::add_to_wishlist).delete(cart::remove_from_wishlist),
        )
}

/// Create the account routes router: addresses, orders, coupons.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/addresses",
            get(addresses::list_addresses).post(addresses::create_address),
        )
        .route(
            "/addresses/{id}",
            put(addresses::update_address).delete(addresses::delete_address),
        )
        .route("/addresses/{id}/default", post(addresses::set_default_address))
        .route(
            "/orders",
            post(orders::place_order)
                .layer(payment_rate_limiter())
                .get(orders::list_orders),
        )
        .route("/orders/track/{number}", get(orders::track_order))
        .route("/orders/{id}", get(orders::get_order))
        .route("/orders/{id}/cancel", post(orders::cancel_order))
        .route("/coupons/validate", post(orders::validate_coupon))
}

/// Create the storefront content routes router.
pub fn content_routes() -> Router<AppState> {
    Router::new()
        .route("/offers", get(content::list_offers))
        .route("/testimonials", get(content::list_testimonials))
        .route("/shipping", get(content::get_shipping))
}

/// Create the payment routes router.
///
/// The webhook is called by Razorpay's servers and is not rate limited.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/verify-payment",
            post(payments::verify_payment).layer(payment_rate_limiter()),
        )
        .route("/webhook", post(payments::webhook))
}

/// Create all routes for the API.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .merge(catalog_routes())
        .merge(cart_routes())
        .merge(account_routes())
        .merge(content_routes())
        .nest("/admin", admin::routes())
        .layer(api_rate_limiter())
        .nest("/auth", auth_routes().layer(auth_rate_limiter()))
        .nest("/payments", payment_routes());

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_table_builds() {
        // Conflicting paths panic when the router is assembled.
        let _router: Router<AppState> = routes();
    }
}
