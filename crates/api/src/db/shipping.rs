//! Shipping settings repository (a single row).

use sqlx::PgPool;

use kirana_core::pricing::ShippingRules;

use super::RepositoryError;
use crate::models::ShippingSettings;

/// Repository for the shipping settings row.
pub struct ShippingRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShippingRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Current settings.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the settings row is missing.
    pub async fn get(&self) -> Result<ShippingSettings, RepositoryError> {
        sqlx::query_as::<_, ShippingSettings>(
            "SELECT flat_fee, free_shipping_threshold, cod_enabled, cod_fee, updated_at FROM shipping_settings",
        )
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| RepositoryError::DataCorruption("shipping_settings row is missing".to_owned()))
    }

    /// Replace the settings.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn update(&self, rules: &ShippingRules) -> Result<ShippingSettings, RepositoryError> {
        let settings = sqlx::query_as::<_, ShippingSettings>(
            r"
            INSERT INTO shipping_settings (id, flat_fee, free_shipping_threshold, cod_enabled, cod_fee)
            VALUES (TRUE, $1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET flat_fee = EXCLUDED.flat_fee,
                free_shipping_threshold = EXCLUDED.free_shipping_threshold,
                cod_enabled = EXCLUDED.cod_enabled,
                cod_fee = EXCLUDED.cod_fee
            RETURNING flat_fee, free_shipping_threshold, cod_enabled, cod_fee, updated_at
            ",
        )
        .bind(rules.flat_fee)
        .bind(rules.free_shipping_threshold)
        .bind(rules.cod_enabled)
        .bind(rules.cod_fee)
        .fetch_one(self.pool)
        .await?;
        Ok(settings)
    }
}
