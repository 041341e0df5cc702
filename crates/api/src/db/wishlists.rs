//! Wishlist repository.

use sqlx::{PgConnection, PgPool};

use kirana_core::{ProductId, UserId};

use super::RepositoryError;

/// Repository for per-user wishlists.
pub struct WishlistRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> WishlistRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Product ids on the wishlist, most recently added first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn product_ids(&self, user_id: UserId) -> Result<Vec<ProductId>, RepositoryError> {
        let rows: Vec<(ProductId,)> = sqlx::query_as(
            "SELECT product_id FROM wishlist_items WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Add a product; adding it twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn add(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        add_many(&mut conn, user_id, &[product_id]).await
    }

    /// Remove a product. Returns whether it was present.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2")
                .bind(user_id)
                .bind(product_id)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Add several products on the caller's connection, skipping ones already present.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn add_many(
    conn: &mut PgConnection,
    user_id: UserId,
    product_ids: &[ProductId],
) -> Result<(), RepositoryError> {
    if product_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        r"
        INSERT INTO wishlist_items (user_id, product_id)
        SELECT $1, product_id FROM UNNEST($2::int[]) AS t(product_id)
        ON CONFLICT (user_id, product_id) DO NOTHING
        ",
    )
    .bind(user_id)
    .bind(product_ids)
    .execute(conn)
    .await?;
    Ok(())
}

/// Advisory lock class for per-user wishlist merges.
const WISHLIST_LOCK_CLASS: i32 = 2;

/// Take the user's wishlist lock and read the saved ids on the caller's
/// transaction, most recently added first.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn lock_product_ids(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Vec<ProductId>, RepositoryError> {
    sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
        .bind(WISHLIST_LOCK_CLASS)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    let rows: Vec<(ProductId,)> = sqlx::query_as(
        r"
        SELECT product_id FROM wishlist_items
        WHERE user_id = $1
        ORDER BY created_at DESC
        FOR UPDATE
        ",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}
