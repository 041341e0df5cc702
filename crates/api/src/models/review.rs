//! Product reviews.

use chrono::{DateTime, Utc};
use serde::Serialize;

use kirana_core::{ProductId, ReviewId, UserId};

/// A review joined with the reviewer's display name.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Review {
    pub id: ReviewId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub author_name: String,
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
