//! Catalog types: categories and products.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use kirana_core::pricing::{self, LineInput, OfferRule};
use kirana_core::{CategoryId, ProductId};

/// A product category.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product, joined with its category's name and slug.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub category_id: Option<CategoryId>,
    pub category_name: Option<String>,
    pub category_slug: Option<String>,
    pub price: Decimal,
    /// Compare-at price shown struck through.
    pub mrp: Option<Decimal>,
    pub stock: i32,
    pub images: Vec<String>,
    pub is_active: bool,
    pub is_featured: bool,
    pub rating_average: Decimal,
    pub rating_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Pricing input for `quantity` units of this product.
    #[must_use]
    pub const fn line_input(&self, quantity: i32) -> LineInput {
        LineInput {
            product_id: self.id,
            category_id: self.category_id,
            list_price: self.price,
            quantity,
        }
    }

    #[must_use]
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// A product as shown to shoppers, with the best live offer applied.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    /// Percent off from the best live offer, zero when none applies.
    pub offer_percent: Decimal,
    /// Price after the offer.
    pub effective_price: Decimal,
    pub in_stock: bool,
}

impl ProductView {
    #[must_use]
    pub fn new(product: Product, offers: &[OfferRule], now: DateTime<Utc>) -> Self {
        let offer_percent =
            pricing::best_offer_percent(offers, product.id, product.category_id, now);
        let effective_price = pricing::discounted_price(product.price, offer_percent);
        let in_stock = product.stock > 0;
        Self {
            product,
            offer_percent,
            effective_price,
            in_stock,
        }
    }
}

/// URL slug from a display name: lower-case ASCII words joined by `-`.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use kirana_core::pricing::OfferTarget;

    use super::*;

    fn product(price: i64, stock: i32) -> Product {
        Product {
            id: ProductId::new(1),
            name: "Basmati Rice 5kg".to_string(),
            slug: "basmati-rice-5kg".to_string(),
            description: String::new(),
            category_id: Some(CategoryId::new(2)),
            category_name: Some("Staples".to_string()),
            category_slug: Some("staples".to_string()),
            price: Decimal::from(price),
            mrp: None,
            stock,
            images: vec![],
            is_active: true,
            is_featured: false,
            rating_average: Decimal::ZERO,
            rating_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Basmati Rice (5 kg)"), "basmati-rice-5-kg");
        assert_eq!(slugify("  Ghee & Oils  "), "ghee-oils");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_product_view_applies_category_offer() {
        let now = Utc::now();
        let offers = [OfferRule {
            target: OfferTarget::Category(CategoryId::new(2)),
            percent: Decimal::from(10),
            active: true,
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(1),
        }];

        let view = ProductView::new(product(500, 3), &offers, now);
        assert_eq!(view.offer_percent, Decimal::from(10));
        assert_eq!(view.effective_price, Decimal::from(450));
        assert!(view.in_stock);

        let view = ProductView::new(product(500, 0), &[], now);
        assert_eq!(view.effective_price, Decimal::from(500));
        assert!(!view.in_stock);
    }
}
