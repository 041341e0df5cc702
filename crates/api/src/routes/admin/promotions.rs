//! Coupon and offer administration.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::{info, instrument};

use kirana_core::coupon::normalize_code;
use kirana_core::{CouponId, OfferId};

use crate::db::coupons::CouponInput;
use crate::db::offers::OfferInput;
use crate::db::{CouponRepository, OfferRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Coupon, Offer};
use crate::state::AppState;

// =============================================================================
// Coupons
// =============================================================================

/// All coupons.
///
/// GET /api/admin/coupons
pub async fn list_coupons(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<Coupon>>> {
    Ok(Json(CouponRepository::new(state.pool()).list().await?))
}

/// Create a coupon. The code is stored upper-case.
///
/// POST /api/admin/coupons
#[instrument(skip(state, body), fields(admin_id = %admin.id))]
pub async fn create_coupon(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<CouponInput>,
) -> Result<(StatusCode, Json<Coupon>)> {
    body.validate().map_err(AppError::BadRequest)?;
    let coupon = CouponRepository::new(state.pool())
        .create(&body, &normalize_code(&body.code))
        .await?;
    info!(code = %coupon.code, "Coupon created");
    Ok((StatusCode::CREATED, Json(coupon)))
}

/// Replace a coupon. Its usage count is kept.
///
/// PUT /api/admin/coupons/{id}
#[instrument(skip(state, body), fields(admin_id = %admin.id))]
pub async fn update_coupon(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CouponId>,
    Json(body): Json<CouponInput>,
) -> Result<Json<Coupon>> {
    body.validate().map_err(AppError::BadRequest)?;
    let coupon = CouponRepository::new(state.pool())
        .update(id, &body, &normalize_code(&body.code))
        .await?;
    Ok(Json(coupon))
}

/// Delete a coupon. Orders keep the code they used.
///
/// DELETE /api/admin/coupons/{id}
pub async fn delete_coupon(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<CouponId>,
) -> Result<StatusCode> {
    CouponRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Offers
// =============================================================================

/// All offers, including expired and scheduled ones.
///
/// GET /api/admin/offers
pub async fn list_offers(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<Offer>>> {
    Ok(Json(OfferRepository::new(state.pool()).list().await?))
}

/// Create an offer.
///
/// POST /api/admin/offers
#[instrument(skip(state, body), fields(admin_id = %admin.id))]
pub async fn create_offer(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<OfferInput>,
) -> Result<(StatusCode, Json<Offer>)> {
    body.validate().map_err(AppError::BadRequest)?;
    let offer = OfferRepository::new(state.pool()).create(&body).await?;
    info!(offer_id = %offer.id, "Offer created");
    Ok((StatusCode::CREATED, Json(offer)))
}

/// Replace an offer.
///
/// PUT /api/admin/offers/{id}
#[instrument(skip(state, body), fields(admin_id = %admin.id))]
pub async fn update_offer(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OfferId>,
    Json(body): Json<OfferInput>,
) -> Result<Json<Offer>> {
    body.validate().map_err(AppError::BadRequest)?;
    let offer = OfferRepository::new(state.pool()).update(id, &body).await?;
    Ok(Json(offer))
}

/// Delete an offer.
///
/// DELETE /api/admin/offers/{id}
pub async fn delete_offer(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<OfferId>,
) -> Result<StatusCode> {
    OfferRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
