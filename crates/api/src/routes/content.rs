//! Storefront content handlers: offers, testimonials, shipping settings.

use axum::{Json, extract::State};
use chrono::Utc;

use crate::db::{OfferRepository, TestimonialRepository};
use crate::error::Result;
use crate::models::{Offer, ShippingSettings, Testimonial};
use crate::state::AppState;

/// Offers running right now.
///
/// GET /api/offers
pub async fn list_offers(State(state): State<AppState>) -> Result<Json<Vec<Offer>>> {
    let offers = OfferRepository::new(state.pool())
        .list_live(Utc::now())
        .await?;
    Ok(Json(offers))
}

/// Approved testimonials in display order.
///
/// GET /api/testimonials
pub async fn list_testimonials(State(state): State<AppState>) -> Result<Json<Vec<Testimonial>>> {
    let testimonials = TestimonialRepository::new(state.pool()).list(true).await?;
    Ok(Json(testimonials))
}

/// Shipping fees and cash-on-delivery availability.
///
/// GET /api/shipping
pub async fn get_shipping(State(state): State<AppState>) -> Result<Json<ShippingSettings>> {
    Ok(Json(state.cache().shipping(state.pool()).await?))
}
