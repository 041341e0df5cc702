//! Testimonial repository.

use serde::Deserialize;
use sqlx::PgPool;

use kirana_core::TestimonialId;

use super::RepositoryError;
use crate::models::Testimonial;

const TESTIMONIAL_COLUMNS: &str = "id, author_name, author_role, quote, rating, avatar_url, \
                                   is_approved, display_order, created_at, updated_at";

/// Fields an admin sets on a testimonial.
#[derive(Debug, Clone, Deserialize)]
pub struct TestimonialInput {
    pub author_name: String,
    #[serde(default)]
    pub author_role: Option<String>,
    pub quote: String,
    #[serde(default = "default_rating")]
    pub rating: i16,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(default)]
    pub display_order: i32,
}

const fn default_rating() -> i16 {
    5
}

/// Repository for testimonials.
pub struct TestimonialRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TestimonialRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Testimonials, in display order. `approved_only` hides unapproved ones.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, approved_only: bool) -> Result<Vec<Testimonial>, RepositoryError> {
        let rows = sqlx::query_as::<_, Testimonial>(&format!(
            r"
            SELECT {TESTIMONIAL_COLUMNS} FROM testimonials
            WHERE is_approved OR NOT $1
            ORDER BY display_order, created_at DESC
            "
        ))
        .bind(approved_only)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Create a testimonial.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, input: &TestimonialInput) -> Result<Testimonial, RepositoryError> {
        let row = sqlx::query_as::<_, Testimonial>(&format!(
            r"
            INSERT INTO testimonials
                (author_name, author_role, quote, rating, avatar_url, is_approved, display_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {TESTIMONIAL_COLUMNS}
            "
        ))
        .bind(input.author_name.trim())
        .bind(input.author_role.as_deref())
        .bind(input.quote.trim())
        .bind(input.rating)
        .bind(input.avatar_url.as_deref())
        .bind(input.is_approved)
        .bind(input.display_order)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    /// Replace a testimonial's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the testimonial does not exist.
    pub async fn update(
        &self,
        id: TestimonialId,
        input: &TestimonialInput,
    ) -> Result<Testimonial, RepositoryError> {
        sqlx::query_as::<_, Testimonial>(&format!(
            r"
            UPDATE testimonials
            SET author_name = $2, author_role = $3, quote = $4, rating = $5,
                avatar_url = $6, is_approved = $7, display_order = $8
            WHERE id = $1
            RETURNING {TESTIMONIAL_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.author_name.trim())
        .bind(input.author_role.as_deref())
        .bind(input.quote.trim())
        .bind(input.rating)
        .bind(input.avatar_url.as_deref())
        .bind(input.is_approved)
        .bind(input.display_order)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete a testimonial.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the testimonial does not exist.
    pub async fn delete(&self, id: TestimonialId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM testimonials WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
