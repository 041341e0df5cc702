//! Admin API handlers, mounted under `/api/admin`.
//!
//! Every handler takes [`RequireAdmin`](crate::middleware::RequireAdmin),
//! which re-reads the account so a demotion or block applies immediately.

pub mod analytics;
pub mod catalog;
pub mod content;
pub mod orders;
pub mod promotions;
pub mod users;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};

use crate::state::AppState;

/// Create the admin routes router.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Analytics
        .route("/analytics/summary", get(analytics::summary))
        .route("/analytics/sales", get(analytics::sales))
        .route("/analytics/top-products", get(analytics::top_products))
        .route("/analytics/low-stock", get(analytics::low_stock))
        // Catalog
        .route(
            "/products",
            get(catalog::list_products).post(catalog::create_product),
        )
        .route(
            "/products/{id}",
            put(catalog::update_product).delete(catalog::delete_product),
        )
        .route(
            "/uploads",
            post(catalog::upload_images).layer(DefaultBodyLimit::max(catalog::UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/categories",
            get(catalog::list_categories).post(catalog::create_category),
        )
        .route(
            "/categories/{id}",
            put(catalog::update_category).delete(catalog::delete_category),
        )
        // Orders and payments
        .route("/orders", get(orders::list_orders))
        .route("/orders/{id}/status", put(orders::update_status))
        .route("/payments", get(orders::list_payments))
        // Promotions
        .route(
            "/coupons",
            get(promotions::list_coupons).post(promotions::create_coupon),
        )
        .route(
            "/coupons/{id}",
            put(promotions::update_coupon).delete(promotions::delete_coupon),
        )
        .route(
            "/offers",
            get(promotions::list_offers).post(promotions::create_offer),
        )
        .route(
            "/offers/{id}",
            put(promotions::update_offer).delete(promotions::delete_offer),
        )
        // Content
        .route(
            "/testimonials",
            get(content::list_testimonials).post(content::create_testimonial),
        )
        .route(
            "/testimonials/{id}",
            put(content::update_testimonial).delete(content::delete_testimonial),
        )
        .route("/shipping", put(content::update_shipping))
        // Users
        .route("/users", get(users::list_users))
        .route("/users/{id}/block", put(users::set_blocked))
}
