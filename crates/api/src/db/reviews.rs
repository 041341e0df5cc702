//! Review repository.
//!
//! Every write also refreshes the product's cached rating inside the same
//! transaction.

use sqlx::PgPool;

use kirana_core::{OrderStatus, ProductId, ReviewId, UserId};

use super::{RepositoryError, conflict_on_unique, products};
use crate::models::Review;

const REVIEW_SELECT: &str = r"
    SELECT r.id, r.user_id, r.product_id, u.name AS author_name, r.rating, r.comment,
           r.created_at, r.updated_at
    FROM reviews r
    JOIN users u ON u.id = r.user_id
";

/// Repository for product reviews.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Reviews for a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(&self, product_id: ProductId) -> Result<Vec<Review>, RepositoryError> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            "{REVIEW_SELECT} WHERE r.product_id = $1 ORDER BY r.created_at DESC"
        ))
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;
        Ok(reviews)
    }

    /// Get a review by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError> {
        let review = sqlx::query_as::<_, Review>(&format!("{REVIEW_SELECT} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(review)
    }

    /// Whether the user has a delivered order containing the product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn has_delivered_purchase(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<bool, RepositoryError> {
        let (exists,): (bool,) = sqlx::query_as(
            r"
            SELECT EXISTS (
                SELECT 1 FROM orders o
                JOIN order_items i ON i.order_id = o.id
                WHERE o.user_id = $1 AND i.product_id = $2 AND o.status = $3
            )
            ",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(OrderStatus::Delivered)
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    /// Create a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already reviewed the product.
    pub async fn create(
        &self,
        user_id: UserId,
        product_id: ProductId,
        rating: i16,
        comment: &str,
    ) -> Result<Review, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (id,): (ReviewId,) = sqlx::query_as(
            "INSERT INTO reviews (user_id, product_id, rating, comment) VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(rating)
        .bind(comment.trim())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| conflict_on_unique(e, "you have already reviewed this product"))?;

        products::recompute_rating(&mut tx, product_id).await?;
        tx.commit().await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Update a review's rating and comment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist.
    pub async fn update(&self, id: ReviewId, rating: i16, comment: &str) -> Result<Review, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (product_id,): (ProductId,) = sqlx::query_as(
            "UPDATE reviews SET rating = $2, comment = $3 WHERE id = $1 RETURNING product_id",
        )
        .bind(id)
        .bind(rating)
        .bind(comment.trim())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        products::recompute_rating(&mut tx, product_id).await?;
        tx.commit().await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the review does not exist.
    pub async fn delete(&self, id: ReviewId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (product_id,): (ProductId,) =
            sqlx::query_as("DELETE FROM reviews WHERE id = $1 RETURNING product_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(RepositoryError::NotFound)?;

        products::recompute_rating(&mut tx, product_id).await?;
        tx.commit().await?;
        Ok(())
    }
}
