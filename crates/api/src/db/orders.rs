//! Order repository.
//!
//! Reads go through [`OrderRepository`]. Writes that are part of placement
//! or a lifecycle change take the caller's connection so they commit or roll
//! back together with stock and coupon updates.

use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use kirana_core::pricing::OrderTotals;
use kirana_core::{OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId, UserId};

use super::{Page, Pagination, RepositoryError};
use crate::models::{Order, OrderDetail, OrderItem, ShippingAddress};

const ORDER_COLUMNS: &str = "id, order_number, user_id, shipping_address, status, payment_method, \
                             payment_status, subtotal, discount, shipping_fee, total, coupon_code, \
                             razorpay_order_id, razorpay_payment_id, paid_at, shipped_at, \
                             delivered_at, cancelled_at, created_at, updated_at";

const ITEM_COLUMNS: &str =
    "id, order_id, product_id, product_name, image_url, unit_price, quantity, line_total";

/// Header values for a new order.
#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub order_number: &'a str,
    pub user_id: UserId,
    pub shipping_address: &'a ShippingAddress,
    pub payment_method: PaymentMethod,
    pub totals: OrderTotals,
    pub coupon_code: Option<&'a str>,
}

/// A line for a new order.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub image_url: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// Repository for reading orders.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get an order by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(order)
    }

    /// Get an order by its order number.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_number(&self, number: &str) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1"
        ))
        .bind(number.trim().to_uppercase())
        .fetch_optional(self.pool)
        .await?;
        Ok(order)
    }

    /// Get the order a Razorpay order id was created for.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_razorpay_order_id(
        &self,
        razorpay_order_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE razorpay_order_id = $1"
        ))
        .bind(razorpay_order_id)
        .fetch_optional(self.pool)
        .await?;
        Ok(order)
    }

    /// Lines of an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        items(&mut conn, order_id).await
    }

    /// An order with its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn detail(&self, order: Order) -> Result<OrderDetail, RepositoryError> {
        let items = self.items(order.id).await?;
        Ok(OrderDetail { order, items })
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        pagination: Pagination,
    ) -> Result<Page<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(pagination.per_page)
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(self.pool)
            .await?;

        Ok(pagination.wrap(orders, total))
    }

    /// All orders, newest first, optionally by status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        status: Option<OrderStatus>,
        pagination: Pagination,
    ) -> Result<Page<Order>, RepositoryError> {
        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE $1::order_status IS NULL OR status = $1 \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        ))
        .bind(status)
        .bind(pagination.per_page)
        .bind(pagination.offset())
        .fetch_all(self.pool)
        .await?;

        let (total,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM orders WHERE $1::order_status IS NULL OR status = $1",
        )
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        Ok(pagination.wrap(orders, total))
    }

    /// Record the Razorpay order created for an order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the update fails.
    pub async fn set_razorpay_order_id(
        &self,
        id: OrderId,
        razorpay_order_id: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE orders SET razorpay_order_id = $2 WHERE id = $1")
            .bind(id)
            .bind(razorpay_order_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}

/// Insert an order header on the caller's connection.
///
/// # Errors
///
/// Returns `RepositoryError::Conflict` if the order number collides.
pub async fn insert(conn: &mut PgConnection, new: &NewOrder<'_>) -> Result<Order, RepositoryError> {
    sqlx::query_as::<_, Order>(&format!(
        r"
        INSERT INTO orders
            (order_number, user_id, shipping_address, payment_method,
             subtotal, discount, shipping_fee, total, coupon_code)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(new.order_number)
    .bind(new.user_id)
    .bind(Json(new.shipping_address))
    .bind(new.payment_method)
    .bind(new.totals.subtotal)
    .bind(new.totals.discount)
    .bind(new.totals.shipping_fee)
    .bind(new.totals.total)
    .bind(new.coupon_code)
    .fetch_one(conn)
    .await
    .map_err(|e| super::conflict_on_unique(e, "order number already exists"))
}

/// Insert order lines on the caller's connection.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the insert fails.
pub async fn insert_items(
    conn: &mut PgConnection,
    order_id: OrderId,
    items: &[NewOrderItem],
) -> Result<(), RepositoryError> {
    let product_ids: Vec<ProductId> = items.iter().map(|i| i.product_id).collect();
    let names: Vec<&str> = items.iter().map(|i| i.product_name.as_str()).collect();
    let images: Vec<Option<&str>> = items.iter().map(|i| i.image_url.as_deref()).collect();
    let prices: Vec<Decimal> = items.iter().map(|i| i.unit_price).collect();
    let quantities: Vec<i32> = items.iter().map(|i| i.quantity).collect();
    let totals: Vec<Decimal> = items.iter().map(|i| i.line_total).collect();

    sqlx::query(
        r"
        INSERT INTO order_items
            (order_id, product_id, product_name, image_url, unit_price, quantity, line_total)
        SELECT $1, * FROM UNNEST($2::int[], $3::text[], $4::text[], $5::numeric[], $6::int[], $7::numeric[])
        ",
    )
    .bind(order_id)
    .bind(&product_ids)
    .bind(&names)
    .bind(&images)
    .bind(&prices)
    .bind(&quantities)
    .bind(&totals)
    .execute(conn)
    .await?;
    Ok(())
}

/// Lines of an order on the caller's connection.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn items(conn: &mut PgConnection, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
    let items = sqlx::query_as::<_, OrderItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id"
    ))
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(items)
}

/// Load and row-lock an order for a lifecycle change.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>, RepositoryError> {
    let order = sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

/// Set the fulfilment status and stamp the matching timestamp.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn set_status(
    conn: &mut PgConnection,
    id: OrderId,
    status: OrderStatus,
) -> Result<Order, RepositoryError> {
    sqlx::query_as::<_, Order>(&format!(
        r"
        UPDATE orders
        SET status = $2,
            shipped_at = CASE WHEN $2 = 'shipped'::order_status THEN NOW() ELSE shipped_at END,
            delivered_at = CASE WHEN $2 = 'delivered'::order_status THEN NOW() ELSE delivered_at END,
            cancelled_at = CASE WHEN $2 = 'cancelled'::order_status THEN NOW() ELSE cancelled_at END
        WHERE id = $1
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(id)
    .bind(status)
    .fetch_optional(conn)
    .await?
    .ok_or(RepositoryError::NotFound)
}

/// Set the payment status, recording the gateway payment id when given.
/// Moving to `paid` stamps `paid_at`.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn set_payment_status(
    conn: &mut PgConnection,
    id: OrderId,
    status: PaymentStatus,
    razorpay_payment_id: Option<&str>,
) -> Result<Order, RepositoryError> {
    sqlx::query_as::<_, Order>(&format!(
        r"
        UPDATE orders
        SET payment_status = $2,
            razorpay_payment_id = COALESCE($3, razorpay_payment_id),
            paid_at = CASE WHEN $2 = 'paid'::payment_status THEN COALESCE(paid_at, NOW()) ELSE paid_at END
        WHERE id = $1
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(id)
    .bind(status)
    .bind(razorpay_payment_id)
    .fetch_optional(conn)
    .await?
    .ok_or(RepositoryError::NotFound)
}
