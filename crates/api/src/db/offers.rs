//! Offer repository.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;

use kirana_core::pricing::OfferRule;
use kirana_core::{CategoryId, OfferId, ProductId};

use super::RepositoryError;
use crate::models::Offer;

const OFFER_COLUMNS: &str = "id, title, description, discount_percent, category_id, product_id, \
                             banner_url, starts_at, ends_at, is_active, created_at, updated_at";

/// Fields an admin sets on an offer.
#[derive(Debug, Clone, Deserialize)]
pub struct OfferInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub discount_percent: Decimal,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub banner_url: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

const fn default_true() -> bool {
    true
}

impl OfferInput {
    /// Check the percent range and window.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title is required".to_string());
        }
        if self.discount_percent < Decimal::ONE || self.discount_percent > Decimal::from(90) {
            return Err("discount_percent must be between 1 and 90".to_string());
        }
        if self.starts_at >= self.ends_at {
            return Err("starts_at must be before ends_at".to_string());
        }
        if self.category_id.is_some() && self.product_id.is_some() {
            return Err("an offer targets a category or a product, not both".to_string());
        }
        Ok(())
    }
}

/// Repository for offers.
pub struct OfferRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OfferRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Offers live at `now`, highest discount first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_live(&self, now: DateTime<Utc>) -> Result<Vec<Offer>, RepositoryError> {
        let offers = sqlx::query_as::<_, Offer>(&format!(
            r"
            SELECT {OFFER_COLUMNS} FROM offers
            WHERE is_active AND starts_at <= $1 AND ends_at > $1
            ORDER BY discount_percent DESC, id
            "
        ))
        .bind(now)
        .fetch_all(self.pool)
        .await?;
        Ok(offers)
    }

    /// Pricing rules of the offers live at `now`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn live_rules(&self, now: DateTime<Utc>) -> Result<Vec<OfferRule>, RepositoryError> {
        Ok(self.list_live(now).await?.iter().map(Offer::to_rule).collect())
    }

    /// All offers, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Offer>, RepositoryError> {
        let offers = sqlx::query_as::<_, Offer>(&format!(
            "SELECT {OFFER_COLUMNS} FROM offers ORDER BY created_at DESC"
        ))
        .fetch_all(self.pool)
        .await?;
        Ok(offers)
    }

    /// Create an offer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self, input: &OfferInput) -> Result<Offer, RepositoryError> {
        let offer = sqlx::query_as::<_, Offer>(&format!(
            r"
            INSERT INTO offers
                (title, description, discount_percent, category_id, product_id,
                 banner_url, starts_at, ends_at, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {OFFER_COLUMNS}
            "
        ))
        .bind(input.title.trim())
        .bind(input.description.as_deref())
        .bind(input.discount_percent)
        .bind(input.category_id)
        .bind(input.product_id)
        .bind(input.banner_url.as_deref())
        .bind(input.starts_at)
        .bind(input.ends_at)
        .bind(input.is_active)
        .fetch_one(self.pool)
        .await?;
        Ok(offer)
    }

    /// Replace an offer's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the offer does not exist.
    pub async fn update(&self, id: OfferId, input: &OfferInput) -> Result<Offer, RepositoryError> {
        sqlx::query_as::<_, Offer>(&format!(
            r"
            UPDATE offers
            SET title = $2, description = $3, discount_percent = $4, category_id = $5,
                product_id = $6, banner_url = $7, starts_at = $8, ends_at = $9, is_active = $10
            WHERE id = $1
            RETURNING {OFFER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(input.title.trim())
        .bind(input.description.as_deref())
        .bind(input.discount_percent)
        .bind(input.category_id)
        .bind(input.product_id)
        .bind(input.banner_url.as_deref())
        .bind(input.starts_at)
        .bind(input.ends_at)
        .bind(input.is_active)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    /// Delete an offer.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the offer does not exist.
    pub async fn delete(&self, id: OfferId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM offers WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_offer_input_validation() {
        let now = Utc::now();
        let mut input = OfferInput {
            title: "Monsoon sale".to_string(),
            description: None,
            discount_percent: Decimal::from(15),
            category_id: Some(CategoryId::new(1)),
            product_id: None,
            banner_url: None,
            starts_at: now,
            ends_at: now + Duration::days(7),
            is_active: true,
        };
        assert!(input.validate().is_ok());

        input.discount_percent = Decimal::from(95);
        assert!(input.validate().is_err());

        input.discount_percent = Decimal::from(15);
        input.product_id = Some(ProductId::new(4));
        assert!(input.validate().is_err());
    }
}
