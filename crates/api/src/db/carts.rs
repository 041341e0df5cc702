//! Saved cart repository.

use sqlx::{PgConnection, PgPool};

use kirana_core::merge::CartLine;
use kirana_core::{ProductId, UserId};

use super::RepositoryError;

/// Repository for per-user cart lines.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The user's cart lines, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn lines(&self, user_id: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let rows: Vec<(ProductId, i32)> = sqlx::query_as(
            "SELECT product_id, quantity FROM cart_items WHERE user_id = $1 ORDER BY created_at, product_id",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(product_id, quantity)| CartLine {
                product_id,
                quantity,
            })
            .collect())
    }
}

/// Advisory lock class for per-user cart writes.
const CART_LOCK_CLASS: i32 = 1;

/// Take the user's cart lock until the caller's transaction ends.
///
/// Every cart write takes this lock first, so a merge or checkout sees no
/// interleaved line changes.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the lock query fails.
pub async fn lock(conn: &mut PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
        .bind(CART_LOCK_CLASS)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Take the cart lock and read the user's lines on the caller's transaction.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn lock_lines(
    conn: &mut PgConnection,
    user_id: UserId,
) -> Result<Vec<CartLine>, RepositoryError> {
    lock(&mut *conn, user_id).await?;
    let rows: Vec<(ProductId, i32)> = sqlx::query_as(
        r"
        SELECT product_id, quantity FROM cart_items
        WHERE user_id = $1
        ORDER BY created_at, product_id
        FOR UPDATE
        ",
    )
    .bind(user_id)
    .fetch_all(conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(product_id, quantity)| CartLine {
            product_id,
            quantity,
        })
        .collect())
}

/// Quantity of one product in the cart, if present.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn quantity_of(
    conn: &mut PgConnection,
    user_id: UserId,
    product_id: ProductId,
) -> Result<Option<i32>, RepositoryError> {
    let row: Option<(i32,)> =
        sqlx::query_as("SELECT quantity FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .fetch_optional(conn)
            .await?;
    Ok(row.map(|(q,)| q))
}

/// Set the quantity of a line, inserting it if missing.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the upsert fails.
pub async fn set_quantity(
    conn: &mut PgConnection,
    user_id: UserId,
    product_id: ProductId,
    quantity: i32,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO cart_items (user_id, product_id, quantity)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity
        ",
    )
    .bind(user_id)
    .bind(product_id)
    .bind(quantity)
    .execute(conn)
    .await?;
    Ok(())
}

/// Remove a line. Returns whether it existed.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
pub async fn remove(
    conn: &mut PgConnection,
    user_id: UserId,
    product_id: ProductId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
        .bind(user_id)
        .bind(product_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Empty a user's cart on the caller's connection.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
pub async fn clear(conn: &mut PgConnection, user_id: UserId) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Replace a user's cart with `lines` on the caller's connection.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if either statement fails.
pub async fn replace(
    conn: &mut PgConnection,
    user_id: UserId,
    lines: &[CartLine],
) -> Result<(), RepositoryError> {
    clear(&mut *conn, user_id).await?;
    if lines.is_empty() {
        return Ok(());
    }

    let product_ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
    let quantities: Vec<i32> = lines.iter().map(|l| l.quantity).collect();
    sqlx::query(
        r"
        INSERT INTO cart_items (user_id, product_id, quantity)
        SELECT $1, product_id, quantity FROM UNNEST($2::int[], $3::int[]) AS t(product_id, quantity)
        ",
    )
    .bind(user_id)
    .bind(&product_ids)
    .bind(&quantities)
    .execute(conn)
    .await?;
    Ok(())
}
