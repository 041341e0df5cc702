//! Testimonial and shipping settings administration.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use tracing::{info, instrument};

use kirana_core::TestimonialId;
use kirana_core::pricing::ShippingRules;

use crate::db::testimonials::TestimonialInput;
use crate::db::{ShippingRepository, TestimonialRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{ShippingSettings, Testimonial};
use crate::state::AppState;

fn validate_testimonial(input: &TestimonialInput) -> Result<()> {
    if input.author_name.trim().is_empty() || input.quote.trim().is_empty() {
        return Err(AppError::BadRequest(
            "author_name and quote are required".to_string(),
        ));
    }
    if !(1..=5).contains(&input.rating) {
        return Err(AppError::BadRequest(
            "rating must be between 1 and 5".to_string(),
        ));
    }
    Ok(())
}

fn validate_shipping(rules: &ShippingRules) -> Result<()> {
    if rules.flat_fee < Decimal::ZERO
        || rules.free_shipping_threshold < Decimal::ZERO
        || rules.cod_fee < Decimal::ZERO
    {
        return Err(AppError::BadRequest(
            "fees and threshold cannot be negative".to_string(),
        ));
    }
    Ok(())
}

// =============================================================================
// Testimonials
// =============================================================================

/// All testimonials, approved or not.
///
/// GET /api/admin/testimonials
pub async fn list_testimonials(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<Testimonial>>> {
    Ok(Json(TestimonialRepository::new(state.pool()).list(false).await?))
}

/// Create a testimonial.
///
/// POST /api/admin/testimonials
pub async fn create_testimonial(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Json(body): Json<TestimonialInput>,
) -> Result<(StatusCode, Json<Testimonial>)> {
    validate_testimonial(&body)?;
    let testimonial = TestimonialRepository::new(state.pool())
        .create(&body)
        .await?;
    Ok((StatusCode::CREATED, Json(testimonial)))
}

/// Replace a testimonial.
///
/// PUT /api/admin/testimonials/{id}
pub async fn update_testimonial(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<TestimonialId>,
    Json(body): Json<TestimonialInput>,
) -> Result<Json<Testimonial>> {
    validate_testimonial(&body)?;
    let testimonial = TestimonialRepository::new(state.pool())
        .update(id, &body)
        .await?;
    Ok(Json(testimonial))
}

/// Delete a testimonial.
///
/// DELETE /api/admin/testimonials/{id}
pub async fn delete_testimonial(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<TestimonialId>,
) -> Result<StatusCode> {
    TestimonialRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Shipping
// =============================================================================

/// Replace the shipping settings.
///
/// PUT /api/admin/shipping
#[instrument(skip(state, body), fields(admin_id = %admin.id))]
pub async fn update_shipping(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<ShippingRules>,
) -> Result<Json<ShippingSettings>> {
    validate_shipping(&body)?;
    let settings = ShippingRepository::new(state.pool()).update(&body).await?;
    state.cache().invalidate_shipping().await;

    info!(
        flat_fee = %settings.flat_fee,
        free_over = %settings.free_shipping_threshold,
        cod_enabled = settings.cod_enabled,
        "Shipping settings updated"
    );
    Ok(Json(settings))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn testimonial(rating: i16, quote: &str) -> TestimonialInput {
        TestimonialInput {
            author_name: "Meera".to_string(),
            author_role: None,
            quote: quote.to_string(),
            rating,
            avatar_url: None,
            is_approved: true,
            display_order: 0,
        }
    }

    #[test]
    fn test_testimonial_validation() {
        assert!(validate_testimonial(&testimonial(5, "Always fresh")).is_ok());
        assert!(validate_testimonial(&testimonial(0, "Always fresh")).is_err());
        assert!(validate_testimonial(&testimonial(4, "   ")).is_err());
    }

    #[test]
    fn test_shipping_rejects_negative_fees() {
        assert!(validate_shipping(&ShippingRules::default()).is_ok());
        let rules = ShippingRules {
            cod_fee: Decimal::new(-1, 0),
            ..ShippingRules::default()
        };
        assert!(validate_shipping(&rules).is_err());
    }
}
