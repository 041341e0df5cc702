//! Catalog route handlers: categories, products, and reviews.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::instrument;

use kirana_core::{ProductId, ReviewId};

use crate::db::products::{ProductFilter, ProductSort};
use crate::db::{OfferRepository, Page, Pagination, ProductRepository, ReviewRepository};
use crate::error::{AppError, Result};
use crate::middleware::{RequireUser, is_active_admin};
use crate::models::{Category, ProductView, Review};
use crate::state::AppState;

/// Default page size for product listings.
const PRODUCTS_PER_PAGE: i64 = 12;

const MAX_COMMENT_LEN: usize = 2000;

// =============================================================================
// Categories
// =============================================================================

/// Active categories.
///
/// GET /api/categories
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Arc<Vec<Category>>>> {
    let categories = state.cache().categories(state.pool(), true).await?;
    Ok(Json(categories))
}

/// One active category.
///
/// GET /api/categories/{slug}
pub async fn get_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<Category>> {
    let categories = state.cache().categories(state.pool(), true).await?;
    categories
        .iter()
        .find(|c| c.slug == slug)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Category '{slug}' not found")))
}

// =============================================================================
// Products
// =============================================================================

/// Query parameters for the product listing.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub q: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub featured: Option<bool>,
    #[serde(default)]
    pub sort: ProductSort,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl ProductQuery {
    fn filter(self) -> (ProductFilter, Pagination) {
        let pagination = Pagination::new(self.page, self.per_page, PRODUCTS_PER_PAGE);
        let filter = ProductFilter {
            category_slug: self.category.filter(|s| !s.is_empty()),
            search: self.q,
            min_price: self.min_price,
            max_price: self.max_price,
            featured: self.featured,
            include_inactive: false,
            sort: self.sort,
        };
        (filter, pagination)
    }
}

/// Product listing with live offer prices.
///
/// GET /api/products
#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Page<ProductView>>> {
    if let (Some(min), Some(max)) = (query.min_price, query.max_price)
        && min > max
    {
        return Err(AppError::BadRequest(
            "min_price must not exceed max_price".to_string(),
        ));
    }
    let (filter, pagination) = query.filter();

    let page = ProductRepository::new(state.pool())
        .list(&filter, pagination)
        .await?;
    let now = Utc::now();
    let offers = OfferRepository::new(state.pool()).live_rules(now).await?;

    let items = page
        .items
        .into_iter()
        .map(|p| ProductView::new(p, &offers, now))
        .collect();
    Ok(Json(pagination.wrap(items, page.total)))
}

/// One active product by slug.
///
/// GET /api/products/{slug}
pub async fn get_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProductView>> {
    let product = ProductRepository::new(state.pool())
        .get_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product '{slug}' not found")))?;

    let now = Utc::now();
    let offers = OfferRepository::new(state.pool()).live_rules(now).await?;
    Ok(Json(ProductView::new(product, &offers, now)))
}

// =============================================================================
// Reviews
// =============================================================================

/// Review create/update body.
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub rating: i16,
    #[serde(default)]
    pub comment: String,
}

impl ReviewRequest {
    fn validate(&self) -> Result<()> {
        if !(1..=5).contains(&self.rating) {
            return Err(AppError::BadRequest(
                "rating must be between 1 and 5".to_string(),
            ));
        }
        if self.comment.chars().count() > MAX_COMMENT_LEN {
            return Err(AppError::BadRequest(format!(
                "comment must be at most {MAX_COMMENT_LEN} characters"
            )));
        }
        Ok(())
    }
}

/// Reviews for a product, newest first.
///
/// GET /api/products/{id}/reviews
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
) -> Result<Json<Vec<Review>>> {
    let reviews = ReviewRepository::new(state.pool())
        .list_for_product(product_id)
        .await?;
    Ok(Json(reviews))
}

/// Review a product the caller has received.
///
/// POST /api/products/{id}/reviews
///
/// # Errors
///
/// 403 without a delivered order containing the product, 409 on a second review.
#[instrument(skip(state, body), fields(user_id = %user.id))]
pub async fn create_review(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(product_id): Path<ProductId>,
    Json(body): Json<ReviewRequest>,
) -> Result<(StatusCode, Json<Review>)> {
    body.validate()?;

    ProductRepository::new(state.pool())
        .get_by_id(product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let reviews = ReviewRepository::new(state.pool());
    if !reviews.has_delivered_purchase(user.id, product_id).await? {
        return Err(AppError::Forbidden(
            "Only customers who received this product can review it".to_string(),
        ));
    }

    let review = reviews
        .create(user.id, product_id, body.rating, &body.comment)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// Edit the caller's own review.
///
/// PUT /api/reviews/{id}
#[instrument(skip(state, body), fields(user_id = %user.id))]
pub async fn update_review(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<ReviewId>,
    Json(body): Json<ReviewRequest>,
) -> Result<Json<Review>> {
    body.validate()?;

    let reviews = ReviewRepository::new(state.pool());
    let review = reviews
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;
    if review.user_id != user.id {
        return Err(AppError::Forbidden("Not your review".to_string()));
    }

    let review = reviews.update(id, body.rating, &body.comment).await?;
    Ok(Json(review))
}

/// Delete a review. Owners and admins only.
///
/// DELETE /api/reviews/{id}
#[instrument(skip(state), fields(user_id = %user.id))]
pub async fn delete_review(
    State(state): State<AppState>,
    RequireUser(user): RequireUser,
    Path(id): Path<ReviewId>,
) -> Result<StatusCode> {
    let reviews = ReviewRepository::new(state.pool());
    let review = reviews
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;
    if review.user_id != user.id && !is_active_admin(&state, user.id).await? {
        return Err(AppError::Forbidden("Not your review".to_string()));
    }

    reviews.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_rating_bounds() {
        let ok = ReviewRequest {
            rating: 5,
            comment: "Fresh and well packed".to_string(),
        };
        assert!(ok.validate().is_ok());

        for rating in [0, 6, -1] {
            let bad = ReviewRequest {
                rating,
                comment: String::new(),
            };
            assert!(matches!(bad.validate(), Err(AppError::BadRequest(_))));
        }
    }

    #[test]
    fn test_review_comment_length() {
        let long = ReviewRequest {
            rating: 4,
            comment: "a".repeat(MAX_COMMENT_LEN + 1),
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_product_query_defaults() {
        let (filter, pagination) = ProductQuery {
            category: Some(String::new()),
            ..ProductQuery::default()
        }
        .filter();
        assert!(filter.category_slug.is_none());
        assert!(!filter.include_inactive);
        assert_eq!(filter.sort, ProductSort::Newest);
        assert_eq!(pagination.per_page, PRODUCTS_PER_PAGE);
        assert_eq!(pagination.page, 1);
    }
}
