//! Database operations for the Kirana `PostgreSQL` database.
//!
//! # Tables
//!
//! - `users`, `addresses` - Accounts and saved addresses
//! - `categories`, `products`, `reviews` - Catalog
//! - `cart_items`, `wishlist_items` - Per-user cart and wishlist
//! - `coupons`, `offers` - Promotions
//! - `orders`, `order_items`, `payment_logs` - Orders and payment events
//! - `testimonials`, `shipping_settings` - Storefront content and settings
//! - `tower_sessions.session` - Session storage
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p kirana-cli -- migrate
//! ```
//!
//! Each repository borrows the pool. Operations that must share a
//! transaction take a `&mut PgConnection` instead, so callers can pass
//! `&mut *tx`.

pub mod addresses;
pub mod analytics;
pub mod carts;
pub mod categories;
pub mod coupons;
pub mod offers;
pub mod orders;
pub mod payment_logs;
pub mod products;
pub mod reviews;
pub mod shipping;
pub mod testimonials;
pub mod users;
pub mod wishlists;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use addresses::AddressRepository;
pub use analytics::AnalyticsRepository;
pub use carts::CartRepository;
pub use categories::CategoryRepository;
pub use coupons::CouponRepository;
pub use offers::OfferRepository;
pub use orders::OrderRepository;
pub use payment_logs::PaymentLogRepository;
pub use products::ProductRepository;
pub use reviews::ReviewRepository;
pub use shipping::ShippingRepository;
pub use testimonials::TestimonialRepository;
pub use users::UserRepository;
pub use wishlists::WishlistRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
pub(crate) fn conflict_on_unique(e: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(e)
}

/// Page of results with the total count for pagination.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

/// 1-based page and page size, clamped to sane bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub const MAX_PER_PAGE: i64 = 100;

    #[must_use]
    pub fn new(page: Option<i64>, per_page: Option<i64>, default_per_page: i64) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page
                .unwrap_or(default_per_page)
                .clamp(1, Self::MAX_PER_PAGE),
        }
    }

    #[must_use]
    pub const fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    #[must_use]
    pub fn wrap<T>(&self, items: Vec<T>, total: i64) -> Page<T> {
        Page {
            items,
            total,
            page: self.page,
            per_page: self.per_page,
        }
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_clamps() {
        let p = Pagination::new(Some(0), Some(1000), 20);
        assert_eq!(p, Pagination { page: 1, per_page: 100 });
        assert_eq!(p.offset(), 0);

        let p = Pagination::new(Some(3), None, 20);
        assert_eq!(p.offset(), 40);
    }
}
