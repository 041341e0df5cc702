//! Seed the catalog from a YAML file.
//!
//! Categories are matched by slug and products by slug, so running the same
//! file twice only adds what is missing.
//!
//! ```yaml
//! categories:
//!   - name: Staples
//!     description: Rice, flour, and pulses
//! products:
//!   - name: Toor Dal 1kg
//!     category: staples
//!     price: "169.00"
//!     stock: 60
//! ```

use std::collections::HashMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};

use kirana_api::db::categories::CategoryInput;
use kirana_api::db::products::ProductInput;
use kirana_api::db::{CategoryRepository, ProductRepository, RepositoryError};
use kirana_api::models::catalog::slugify;
use kirana_core::CategoryId;

use crate::connect;

/// Top-level seed file.
#[derive(Debug, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub categories: Vec<SeedCategory>,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
}

#[derive(Debug, Deserialize)]
pub struct SeedCategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub name: String,
    /// Category slug.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub mrp: Option<Decimal>,
    pub stock: i32,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub featured: bool,
}

/// Problems found in a seed file before touching the database.
pub fn validate(seed: &CatalogSeed) -> Vec<String> {
    let mut errors = Vec::new();
    let known: Vec<String> = seed.categories.iter().map(|c| slugify(&c.name)).collect();

    for product in &seed.products {
        let input = product_input(product, None);
        if let Err(e) = input.validate() {
            errors.push(format!("{}: {e}", product.name));
        }
        if let Some(slug) = &product.category
            && !known.contains(slug)
        {
            errors.push(format!("{}: unknown category '{slug}'", product.name));
        }
    }
    errors
}

fn product_input(product: &SeedProduct, category_id: Option<CategoryId>) -> ProductInput {
    ProductInput {
        name: product.name.clone(),
        slug: None,
        description: product.description.clone(),
        category_id,
        price: product.price,
        mrp: product.mrp,
        stock: product.stock,
        images: product.images.clone(),
        is_active: true,
        is_featured: product.featured,
    }
}

/// Load categories and products from `file_path`.
///
/// # Errors
///
/// Returns an error if the file is unreadable or invalid, or a query fails.
pub async fn catalog(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog from file");
    let content = tokio::fs::read_to_string(path).await?;
    let seed: CatalogSeed = serde_yaml::from_str(&content)?;

    let errors = validate(&seed);
    if !errors.is_empty() {
        for err in &errors {
            warn!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let pool = connect().await?;
    let categories = CategoryRepository::new(&pool);
    let products = ProductRepository::new(&pool);

    let mut category_ids: HashMap<String, CategoryId> = HashMap::new();
    let mut created_categories = 0;
    for category in &seed.categories {
        let slug = slugify(&category.name);
        if let Some(existing) = categories.get_by_slug(&slug).await? {
            category_ids.insert(slug, existing.id);
            continue;
        }
        let input = CategoryInput {
            name: category.name.clone(),
            slug: None,
            description: category.description.clone(),
            image_url: category.image_url.clone(),
            is_active: true,
        };
        match categories.create(&input, &slug).await {
            Ok(created) => {
                category_ids.insert(slug, created.id);
                created_categories += 1;
            }
            Err(RepositoryError::Conflict(_)) => {
                warn!(slug = %slug, "Category slug taken by an inactive category, skipping");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let mut created_products = 0;
    let mut skipped_products = 0;
    for product in &seed.products {
        let slug = slugify(&product.name);
        if products.get_by_slug(&slug).await?.is_some() {
            skipped_products += 1;
            continue;
        }
        let category_id = product
            .category
            .as_ref()
            .and_then(|c| category_ids.get(c).copied());
        match products.create(&product_input(product, category_id), &slug).await {
            Ok(_) => created_products += 1,
            Err(RepositoryError::Conflict(_)) => skipped_products += 1,
            Err(e) => return Err(e.into()),
        }
    }

    info!("Seeding complete!");
    info!("  Categories created: {created_categories}");
    info!("  Products created: {created_products}");
    info!("  Products skipped (already exist): {skipped_products}");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = include_str!("../../seed/catalog.yaml");

    #[test]
    fn test_sample_catalog_is_valid() {
        let seed: CatalogSeed = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(seed.categories.len(), 3);
        assert!(seed.products.iter().any(|p| p.featured));
        assert!(validate(&seed).is_empty());
    }

    #[test]
    fn test_unknown_category_and_bad_price_reported() {
        let seed: CatalogSeed = serde_yaml::from_str(
            r#"
products:
  - name: Ghee 500ml
    category: dairy
    price: "-1"
    stock: 5
"#,
        )
        .unwrap();
        let errors = validate(&seed);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.contains("unknown category")));
    }
}
