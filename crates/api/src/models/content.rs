//! Offers, testimonials and shipping settings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use kirana_core::pricing::{OfferRule, OfferTarget, ShippingRules};
use kirana_core::{CategoryId, OfferId, ProductId, TestimonialId};

/// A time-boxed percentage offer.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Offer {
    pub id: OfferId,
    pub title: String,
    pub description: Option<String>,
    pub discount_percent: Decimal,
    pub category_id: Option<CategoryId>,
    pub product_id: Option<ProductId>,
    pub banner_url: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Offer {
    #[must_use]
    pub const fn target(&self) -> OfferTarget {
        OfferTarget::from_columns(self.category_id, self.product_id)
    }

    #[must_use]
    pub const fn to_rule(&self) -> OfferRule {
        OfferRule {
            target: self.target(),
            percent: self.discount_percent,
            active: self.is_active,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
        }
    }
}

/// A customer quote shown on the home page.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Testimonial {
    pub id: TestimonialId,
    pub author_name: String,
    pub author_role: Option<String>,
    pub quote: String,
    pub rating: i16,
    pub avatar_url: Option<String>,
    pub is_approved: bool,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The single shipping settings row.
#[derive(Debug, Clone, Copy, Serialize, sqlx::FromRow)]
pub struct ShippingSettings {
    pub flat_fee: Decimal,
    pub free_shipping_threshold: Decimal,
    pub cod_enabled: bool,
    pub cod_fee: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl ShippingSettings {
    #[must_use]
    pub const fn rules(&self) -> ShippingRules {
        ShippingRules {
            flat_fee: self.flat_fee,
            free_shipping_threshold: self.free_shipping_threshold,
            cod_enabled: self.cod_enabled,
            cod_fee: self.cod_fee,
        }
    }
}
