//! Read-through cache for rarely-changing storefront data.
//!
//! Categories and shipping settings are read on nearly every page and at
//! every checkout, but only change through the admin API. Entries live for
//! 5 minutes and admin writes invalidate them immediately.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tracing::debug;

use crate::db::{CategoryRepository, RepositoryError, ShippingRepository};
use crate::models::{Category, ShippingSettings};

/// Cache key.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum CacheKey {
    Categories { active_only: bool },
    Shipping,
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Categories(Arc<Vec<Category>>),
    Shipping(ShippingSettings),
}

/// Shared catalog cache.
#[derive(Clone)]
pub struct CatalogCache {
    cache: Cache<CacheKey, CacheValue>,
}

impl Default for CatalogCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogCache {
    #[must_use]
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(16)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();
        Self { cache }
    }

    /// Categories, from cache or the database.
    ///
    /// # Errors
    ///
    /// Returns error on a cache miss if the query fails.
    pub async fn categories(
        &self,
        pool: &PgPool,
        active_only: bool,
    ) -> Result<Arc<Vec<Category>>, RepositoryError> {
        let key = CacheKey::Categories { active_only };
        if let Some(CacheValue::Categories(categories)) = self.cache.get(&key).await {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories = Arc::new(CategoryRepository::new(pool).list(active_only).await?);
        self.cache
            .insert(key, CacheValue::Categories(Arc::clone(&categories)))
            .await;
        Ok(categories)
    }

    /// Shipping settings, from cache or the database.
    ///
    /// # Errors
    ///
    /// Returns error on a cache miss if the query fails.
    pub async fn shipping(&self, pool: &PgPool) -> Result<ShippingSettings, RepositoryError> {
        if let Some(CacheValue::Shipping(settings)) = self.cache.get(&CacheKey::Shipping).await {
            debug!("Cache hit for shipping settings");
            return Ok(settings);
        }

        let settings = ShippingRepository::new(pool).get().await?;
        self.cache
            .insert(CacheKey::Shipping, CacheValue::Shipping(settings))
            .await;
        Ok(settings)
    }

    /// Drop cached categories after an admin change.
    pub async fn invalidate_categories(&self) {
        self.cache
            .invalidate(&CacheKey::Categories { active_only: true })
            .await;
        self.cache
            .invalidate(&CacheKey::Categories { active_only: false })
            .await;
    }

    /// Drop cached shipping settings after an admin change.
    pub async fn invalidate_shipping(&self) {
        self.cache.invalidate(&CacheKey::Shipping).await;
    }

    /// Invalidate all cached data.
    pub async fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}
