//! Cart and wishlist route handlers.
//!
//! Both are stored per user. Guests keep them in the browser and post them
//! to the merge endpoints after logging in.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use kirana_core::ProductId;
use kirana_core::merge::{CartLine, CartMerge};

use crate::error::{AppError, Result};
use crate::middleware::RequireUser;
use crate::models::ProductView;
use crate::services::{CartService, CartView};
use crate::state::AppState;

/// Most lines accepted in one merge request.
const MAX_MERGE_LINES: usize = 100;

// =============================================================================
// Request/Response Types
// =============================================================================

/// Add-to-cart body.
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: i32,
}

const fn one() -> i32 {
    1
}

/// Set-quantity body.
#[derive(Debug, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i32,
}

/// Guest cart merge body.
#[derive(Debug, Deserialize)]
pub struct MergeCartRequest {
    pub items: Vec<CartLine>,
}

/// Merged cart plus what had to change.
#[derive(Debug, Serialize)]
pub struct MergeCartResponse {
    pub cart: CartView,
    #[serde(flatten)]
    pub merge: CartMerge,
}

/// Guest wishlist merge body.
#[derive(Debug, Deserialize)]
pub struct MergeWishlistRequest {
    pub product_ids: Vec<ProductId>,
}

fn service(state: &AppState) -> CartService<'_> {
    CartService::new(state.pool(), state.cache())
}

// =============================================================================
// Cart
// =============================================================================

/// The caller's cart with current prices.
///
/// GET /api/cart
pub async fn get_cart(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<CartView>> {
    Ok(Json(service(&state).view(user.id).await?))
}

/// Add units of a product, on top of what is already in the cart.
///
/// POST /api/cart/items
#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn add_item(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<AddItemRequest>,
) -> Result<Json<CartView>> {
    let cart = service(&state)
        .add_item(user.id, body.product_id, body.quantity)
        .await?;
    Ok(Json(cart))
}

/// Set a line's quantity; zero removes it.
///
/// PUT /api/cart/items/{product_id}
#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn set_quantity(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(product_id): Path<ProductId>,
    Json(body): Json<SetQuantityRequest>,
) -> Result<Json<CartView>> {
    let cart = service(&state)
        .set_quantity(user.id, product_id, body.quantity)
        .await?;
    Ok(Json(cart))
}

/// Remove a line.
///
/// DELETE /api/cart/items/{product_id}
pub async fn remove_item(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(product_id): Path<ProductId>,
) -> Result<Json<CartView>> {
    Ok(Json(service(&state).remove(user.id, product_id).await?))
}

/// Empty the cart.
///
/// DELETE /api/cart
pub async fn clear_cart(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<CartView>> {
    Ok(Json(service(&state).clear(user.id).await?))
}

/// Merge the browser's guest cart into the saved one.
///
/// POST /api/cart/merge
#[instrument(skip(state, body), fields(user_id = %user.id, lines = body.items.len()))]
pub async fn merge_cart(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<MergeCartRequest>,
) -> Result<Json<MergeCartResponse>> {
    if body.items.len() > MAX_MERGE_LINES {
        return Err(AppError::BadRequest(format!(
            "at most {MAX_MERGE_LINES} items can be merged"
        )));
    }
    let (cart, merge) = service(&state).merge(user.id, &body.items).await?;
    Ok(Json(MergeCartResponse { cart, merge }))
}

// =============================================================================
// Wishlist
// =============================================================================

/// The caller's wishlist.
///
/// GET /api/wishlist
pub async fn get_wishlist(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
) -> Result<Json<Vec<ProductView>>> {
    Ok(Json(service(&state).wishlist(user.id).await?))
}

/// Add a product to the wishlist.
///
/// POST /api/wishlist/{product_id}
pub async fn add_to_wishlist(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(product_id): Path<ProductId>,
) -> Result<Json<Vec<ProductView>>> {
    Ok(Json(
        service(&state).add_to_wishlist(user.id, product_id).await?,
    ))
}

/// Remove a product from the wishlist.
///
/// DELETE /api/wishlist/{product_id}
pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(product_id): Path<ProductId>,
) -> Result<Json<Vec<ProductView>>> {
    Ok(Json(
        service(&state)
            .remove_from_wishlist(user.id, product_id)
            .await?,
    ))
}

/// Union the guest wishlist into the saved one.
///
/// POST /api/wishlist/merge
pub async fn merge_wishlist(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Json(body): Json<MergeWishlistRequest>,
) -> Result<Json<Vec<ProductView>>> {
    if body.product_ids.len() > MAX_MERGE_LINES {
        return Err(AppError::BadRequest(format!(
            "at most {MAX_MERGE_LINES} items can be merged"
        )));
    }
    Ok(Json(
        service(&state)
            .merge_wishlist(user.id, &body.product_ids)
            .await?,
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_add_item_defaults_to_one() {
        let body: AddItemRequest = serde_json::from_str(r#"{"product_id": 7}"#).unwrap();
        assert_eq!(body.quantity, 1);
        assert_eq!(body.product_id, ProductId::new(7));
    }

    #[test]
    fn test_merge_request_shape() {
        let body: MergeCartRequest = serde_json::from_str(
            r#"{"items": [{"product_id": 1, "quantity": 2}, {"product_id": 3, "quantity": 1}]}"#,
        )
        .unwrap();
        assert_eq!(body.items.len(), 2);
        assert_eq!(body.items[0].quantity, 2);
    }
}
