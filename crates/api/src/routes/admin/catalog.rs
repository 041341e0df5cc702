//! Catalog administration: products, categories, and image uploads.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use kirana_core::{CategoryId, ProductId};

use crate::db::categories::CategoryInput;
use crate::db::products::{ProductFilter, ProductInput, ProductSort};
use crate::db::{CategoryRepository, Page, Pagination, ProductRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::catalog::slugify;
use crate::models::{Category, Product};
use crate::services::cloudinary::{MAX_UPLOAD_BYTES, UploadedImage};
use crate::state::AppState;

const PRODUCTS_PER_PAGE: i64 = 20;

/// Most files accepted in one upload request.
const MAX_FILES: usize = 10;

/// Slug from an explicit value or the name.
fn slug_for(explicit: Option<&str>, name: &str) -> Result<String> {
    let slug = slugify(explicit.filter(|s| !s.trim().is_empty()).unwrap_or(name));
    if slug.is_empty() {
        return Err(AppError::BadRequest(
            "a slug cannot be derived from that name".to_string(),
        ));
    }
    Ok(slug)
}

// =============================================================================
// Products
// =============================================================================

/// Admin product listing query. Includes inactive products.
#[derive(Debug, Default, Deserialize)]
pub struct AdminProductQuery {
    pub category: Option<String>,
    pub q: Option<String>,
    #[serde(default)]
    pub sort: ProductSort,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// All products, active or not.
///
/// GET /api/admin/products
pub async fn list_products(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(query): Query<AdminProductQuery>,
) -> Result<Json<Page<Product>>> {
    let pagination = Pagination::new(query.page, query.per_page, PRODUCTS_PER_PAGE);
    let filter = ProductFilter {
        category_slug: query.category.filter(|s| !s.is_empty()),
        search: query.q,
        include_inactive: true,
        sort: query.sort,
        ..ProductFilter::default()
    };
    let page = ProductRepository::new(state.pool())
        .list(&filter, pagination)
        .await?;
    Ok(Json(page))
}

/// Create a product.
///
/// POST /api/admin/products
#[instrument(skip(state, body), fields(admin_id = %admin.id))]
pub async fn create_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>)> {
    body.validate().map_err(AppError::BadRequest)?;
    let slug = slug_for(body.slug.as_deref(), &body.name)?;

    let product = ProductRepository::new(state.pool())
        .create(&body, &slug)
        .await?;
    info!(product_id = %product.id, slug = %product.slug, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// Replace a product.
///
/// PUT /api/admin/products/{id}
#[instrument(skip(state, body), fields(admin_id = %admin.id))]
pub async fn update_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Json(body): Json<ProductInput>,
) -> Result<Json<Product>> {
    body.validate().map_err(AppError::BadRequest)?;
    let slug = slug_for(body.slug.as_deref(), &body.name)?;

    let product = ProductRepository::new(state.pool())
        .update(id, &body, &slug)
        .await?;
    Ok(Json(product))
}

/// Delete a product. Order history keeps its own copy of name and price.
///
/// DELETE /api/admin/products/{id}
#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn delete_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    ProductRepository::new(state.pool()).delete(id).await?;
    info!(product_id = %id, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Uploads
// =============================================================================

/// Uploaded image URLs.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub images: Vec<UploadedImage>,
}

/// Upload product or banner images to Cloudinary.
///
/// POST /api/admin/uploads
///
/// Every multipart file field is uploaded; non-file fields are ignored.
///
/// # Errors
///
/// 503 when Cloudinary is not configured, 400 for a bad type or size.
#[instrument(skip(state, multipart), fields(admin_id = %admin.id))]
pub async fn upload_images(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let cloudinary = state.cloudinary();
    if !cloudinary.is_configured() {
        return Err(AppError::ServiceUnavailable(
            "Image uploads are not configured".to_string(),
        ));
    }

    let mut images = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid upload: {e}")))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        if images.len() >= MAX_FILES {
            return Err(AppError::BadRequest(format!(
                "at most {MAX_FILES} files per upload"
            )));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Invalid upload: {e}")))?;

        images.push(cloudinary.upload_image(&filename, bytes.to_vec()).await?);
    }

    if images.is_empty() {
        return Err(AppError::BadRequest("No files uploaded".to_string()));
    }
    info!(count = images.len(), "Images uploaded");
    Ok(Json(UploadResponse { images }))
}

/// Request body limit for uploads: every file at the maximum plus form overhead.
pub const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES * MAX_FILES + 64 * 1024;

// =============================================================================
// Categories
// =============================================================================

/// All categories, active or not.
///
/// GET /api/admin/categories
pub async fn list_categories(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<Category>>> {
    let categories = state.cache().categories(state.pool(), false).await?;
    Ok(Json(categories.as_ref().clone()))
}

/// Create a category.
///
/// POST /api/admin/categories
#[instrument(skip(state, body), fields(admin_id = %admin.id))]
pub async fn create_category(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(body): Json<CategoryInput>,
) -> Result<(StatusCode, Json<Category>)> {
    if body.name.trim().is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }
    let slug = slug_for(body.slug.as_deref(), &body.name)?;

    let category = CategoryRepository::new(state.pool())
        .create(&body, &slug)
        .await?;
    state.cache().invalidate_categories().await;
    Ok((StatusCode::CREATED, Json(category)))
}

/// Replace a category.
///
/// PUT /api/admin/categories/{id}
#[instrument(skip(state, body), fields(admin_id = %admin.id))]
pub async fn update_category(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CategoryId>,
    Json(body): Json<CategoryInput>,
) -> Result<Json<Category>> {
    if body.name.trim().is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }
    let slug = slug_for(body.slug.as_deref(), &body.name)?;

    let category = CategoryRepository::new(state.pool())
        .update(id, &body, &slug)
        .await?;
    state.cache().invalidate_categories().await;
    Ok(Json(category))
}

/// Delete a category. Its products become uncategorized.
///
/// DELETE /api/admin/categories/{id}
#[instrument(skip(state), fields(admin_id = %admin.id))]
pub async fn delete_category(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode> {
    CategoryRepository::new(state.pool()).delete(id).await?;
    state.cache().invalidate_categories().await;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_prefers_explicit_value() {
        assert_eq!(slug_for(Some("Basmati Rice 5kg"), "ignored").unwrap(), "basmati-rice-5kg");
        assert_eq!(slug_for(None, "Toor Dal (1 kg)").unwrap(), "toor-dal-1-kg");
        assert_eq!(slug_for(Some("  "), "Ghee").unwrap(), "ghee");
    }

    #[test]
    fn test_slug_rejects_symbols_only() {
        assert!(matches!(slug_for(None, "***"), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_upload_limit_covers_all_files() {
        assert!(UPLOAD_BODY_LIMIT > MAX_UPLOAD_BYTES * MAX_FILES);
    }
}
