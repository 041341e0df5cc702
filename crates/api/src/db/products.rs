//! Product repository.
//!
//! Stock changes go through [`decrement_stock`] and [`restore_stock`], which
//! run on a caller's transaction. The decrement is a conditional update, so
//! two orders racing for the last unit cannot both succeed.

use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};

use kirana_core::{CategoryId, ProductId};

use super::{Page, Pagination, RepositoryError, conflict_on_unique};
use crate::models::Product;

const PRODUCT_SELECT: &str = r"
    SELECT p.id, p.name, p.slug, p.description, p.category_id,
           c.name AS category_name, c.slug AS category_slug,
           p.price, p.mrp, p.stock, p.images, p.is_active, p.is_featured,
           p.rating_average, p.rating_count, p.created_at, p.updated_at
    FROM products p
    LEFT JOIN categories c ON c.id = p.category_id
";

/// Sort order for product listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Rating,
    Name,
}

impl ProductSort {
    const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC, p.id DESC",
            Self::PriceAsc => "p.price ASC, p.id",
            Self::PriceDesc => "p.price DESC, p.id",
            Self::Rating => "p.rating_average DESC, p.rating_count DESC, p.id",
            Self::Name => "p.name ASC, p.id",
        }
    }
}

/// Filters for product listings.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_slug: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub featured: Option<bool>,
    /// Include inactive products (admin listings).
    pub include_inactive: bool,
    pub sort: ProductSort,
}

/// Fields an admin sets on a product.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub category_id: Option<CategoryId>,
    pub price: Decimal,
    #[serde(default)]
    pub mrp: Option<Decimal>,
    pub stock: i32,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
}

const fn default_true() -> bool {
    true
}

impl ProductInput {
    /// Check prices and stock.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is required".to_string());
        }
        if self.price < Decimal::ZERO {
            return Err("price cannot be negative".to_string());
        }
        if self.mrp.is_some_and(|mrp| mrp < self.price) {
            return Err("mrp cannot be below price".to_string());
        }
        if self.stock < 0 {
            return Err("stock cannot be negative".to_string());
        }
        Ok(())
    }
}

/// A product that is running low.
#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct LowStockProduct {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub stock: i32,
}

/// Repository for products.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        pagination: Pagination,
    ) -> Result<Page<Product>, RepositoryError> {
        const WHERE: &str = r"
            WHERE ($1 OR p.is_active)
              AND ($2::text IS NULL OR c.slug = $2)
              AND ($3::text IS NULL OR p.name ILIKE $3 OR p.description ILIKE $3)
              AND ($4::numeric IS NULL OR p.price >= $4)
              AND ($5::numeric IS NULL OR p.price <= $5)
              AND ($6::boolean IS NULL OR p.is_featured = $6)
        ";
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{s}%"));

        let products = sqlx::query_as::<_, Product>(&format!(
            "{PRODUCT_SELECT} {WHERE} ORDER BY {} LIMIT $7 OFFSET $8",
            filter.sort.order_by()
        ))
        .bind(filter.include_inactive)
        .bind(filter.category_slug.as_deref())
        .bind(pattern.as_deref())
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(filter.featured)
        .bind(pagination.per_page)
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM products p LEFT JOIN categories c ON c.id = p.category_id {WHERE}"
        ))
        .bind(filter.include_inactive)
        .bind(filter.category_slug.as_deref())
        .bind(pattern.as_deref())
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(filter.featured)
        .fetch_one(self.pool)
        .await?;

        Ok(pagination.wrap(products, total))
    }

    /// Get an active product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "{PRODUCT_SELECT} WHERE p.slug = $1 AND p.is_active"
        ))
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;
        Ok(product)
    }

    /// Get a product by id, active or not.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let product = sqlx::query_as::<_, Product>(&format!("{PRODUCT_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(product)
    }

    /// Get several products by id, in no particular order. Unknown ids are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let products =
            sqlx::query_as::<_, Product>(&format!("{PRODUCT_SELECT} WHERE p.id = ANY($1)"))
                .bind(ids)
                .fetch_all(self.pool)
                .await?;
        Ok(products)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the slug is taken.
    pub async fn create(&self, input: &ProductInput, slug: &str) -> Result<Product, RepositoryError> {
        let (id,): (ProductId,) = sqlx::query_as(
            r"
            INSERT INTO products
                (name, slug, description, category_id, price, mrp, stock, images, is_active, is_featured)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            ",
        )
        .bind(input.name.trim())
        .bind(slug)
        .bind(&input.description)
        .bind(input.category_id)
        .bind(input.price)
        .bind(input.mrp)
        .bind(input.stock)
        .bind(&input.images)
        .bind(input.is_active)
        .bind(input.is_featured)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "product slug already exists"))?;

        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Replace a product's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist,
    /// `RepositoryError::Conflict` if the slug is taken.
    pub async fn update(
        &self,
        id: ProductId,
        input: &ProductInput,
        slug: &str,
    ) -> Result<Product, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE products
            SET name = $2, slug = $3, description = $4, category_id = $5, price = $6,
                mrp = $7, stock = $8, images = $9, is_active = $10, is_featured = $11
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(input.name.trim())
        .bind(slug)
        .bind(&input.description)
        .bind(input.category_id)
        .bind(input.price)
        .bind(input.mrp)
        .bind(input.stock)
        .bind(&input.images)
        .bind(input.is_active)
        .bind(input.is_featured)
        .execute(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "product slug already exists"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Delete a product. Past order lines keep their name and price snapshot.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete(&self, id: ProductId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Active products with `stock <= threshold`, lowest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn low_stock(
        &self,
        threshold: i32,
        limit: i64,
    ) -> Result<Vec<LowStockProduct>, RepositoryError> {
        let rows = sqlx::query_as::<_, LowStockProduct>(
            r"
            SELECT id, name, slug, stock FROM products
            WHERE is_active AND stock <= $1
            ORDER BY stock ASC, name
            LIMIT $2
            ",
        )
        .bind(threshold)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}

/// Take `quantity` units of a product if that many are in stock.
///
/// Returns `false` and changes nothing when stock is insufficient.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn decrement_stock(
    conn: &mut PgConnection,
    id: ProductId,
    quantity: i32,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query(
        "UPDATE products SET stock = stock - $2 WHERE id = $1 AND is_active AND stock >= $2",
    )
    .bind(id)
    .bind(quantity)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Put `quantity` units back into stock.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn restore_stock(
    conn: &mut PgConnection,
    id: ProductId,
    quantity: i32,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE products SET stock = stock + $2 WHERE id = $1")
        .bind(id)
        .bind(quantity)
        .execute(conn)
        .await?;
    Ok(())
}

/// Recompute a product's cached rating from its reviews.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn recompute_rating(conn: &mut PgConnection, id: ProductId) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE products p
        SET rating_average = COALESCE(r.average, 0),
            rating_count = r.count
        FROM (
            SELECT ROUND(AVG(rating)::numeric, 2) AS average, COUNT(*)::int AS count
            FROM reviews WHERE product_id = $1
        ) r
        WHERE p.id = $1
        ",
    )
    .bind(id)
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> ProductInput {
        ProductInput {
            name: "Toor Dal 1kg".to_string(),
            slug: None,
            description: String::new(),
            category_id: None,
            price: Decimal::from(180),
            mrp: Some(Decimal::from(200)),
            stock: 20,
            images: vec![],
            is_active: true,
            is_featured: false,
        }
    }

    #[test]
    fn test_product_input_validation() {
        assert!(input().validate().is_ok());

        let mut bad = input();
        bad.mrp = Some(Decimal::from(150));
        assert_eq!(bad.validate(), Err("mrp cannot be below price".to_string()));

        let mut bad = input();
        bad.stock = -1;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_sort_parses_from_query_value() {
        let sort: ProductSort = serde_json::from_str("\"price_desc\"").unwrap_or_default();
        assert_eq!(sort, ProductSort::PriceDesc);
        assert_eq!(ProductSort::default().order_by(), "p.created_at DESC, p.id DESC");
    }
}
