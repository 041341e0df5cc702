//! Saved carts and wishlists.
//!
//! Lines are stored per user as `(product, quantity)`. Prices are never
//! stored on the cart; every view is priced against the live offers at the
//! time it is built, the same way checkout prices the order.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, instrument};

use kirana_core::merge::{self, Availability, CartLine, CartMerge, MAX_LINE_QUANTITY};
use kirana_core::pricing::{self, OfferRule, ShippingRules};
use kirana_core::{PaymentMethod, ProductId, UserId, round_amount};

use crate::db::{
    CartRepository, OfferRepository, ProductRepository, RepositoryError, WishlistRepository, carts,
    wishlists,
};
use crate::models::{Product, ProductView};
use crate::services::cache::CatalogCache;

/// Errors from cart and wishlist changes.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("product not found")]
    ProductNotFound,

    #[error("{name} is no longer available")]
    ProductUnavailable { name: String },

    #[error("only {available} of {name} available")]
    InsufficientStock { name: String, available: i32 },

    #[error("quantity must be between 1 and {MAX_LINE_QUANTITY}")]
    InvalidQuantity,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A cart line as shown to the shopper.
#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    pub product: ProductView,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// A priced cart.
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub item_count: i32,
    pub subtotal: Decimal,
    /// Shipping for a prepaid order; cash on delivery may add a fee.
    pub shipping_fee: Decimal,
    pub total: Decimal,
    pub free_shipping_threshold: Decimal,
}

impl CartView {
    /// Price `lines` against `products` and `offers`. Lines whose product is
    /// missing are left out.
    #[must_use]
    pub fn build(
        lines: &[CartLine],
        products: Vec<Product>,
        offers: &[OfferRule],
        shipping: &ShippingRules,
    ) -> Self {
        let now = Utc::now();
        let mut by_id: HashMap<ProductId, Product> =
            products.into_iter().map(|p| (p.id, p)).collect();

        let items: Vec<CartItemView> = lines
            .iter()
            .filter_map(|line| {
                let product = by_id.remove(&line.product_id)?;
                let view = ProductView::new(product, offers, now);
                let line_total = round_amount(view.effective_price * Decimal::from(line.quantity));
                Some(CartItemView {
                    product: view,
                    quantity: line.quantity,
                    line_total,
                })
            })
            .collect();

        let subtotal = round_amount(items.iter().map(|i| i.line_total).sum());
        let shipping_fee = if items.is_empty() {
            Decimal::ZERO
        } else {
            pricing::shipping_fee(shipping, subtotal, PaymentMethod::Razorpay)
        };
        let totals = pricing::OrderTotals::new(subtotal, Decimal::ZERO, shipping_fee);

        Self {
            item_count: items.iter().map(|i| i.quantity).sum(),
            items,
            subtotal: totals.subtotal,
            shipping_fee: totals.shipping_fee,
            total: totals.total,
            free_shipping_threshold: shipping.free_shipping_threshold,
        }
    }
}

/// Cart and wishlist operations for one request.
pub struct CartService<'a> {
    pool: &'a PgPool,
    cache: &'a CatalogCache,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, cache: &'a CatalogCache) -> Self {
        Self { pool, cache }
    }

    /// The user's priced cart.
    ///
    /// # Errors
    ///
    /// Returns error if a query fails.
    pub async fn view(&self, user_id: UserId) -> Result<CartView, CartError> {
        let lines = CartRepository::new(self.pool).lines(user_id).await?;
        let ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        let products = ProductRepository::new(self.pool).get_many(&ids).await?;
        let offers = OfferRepository::new(self.pool).live_rules(Utc::now()).await?;
        let shipping = self.cache.shipping(self.pool).await?.rules();

        Ok(CartView::build(&lines, products, &offers, &shipping))
    }

    /// Add `quantity` units, on top of any already in the cart.
    ///
    /// # Errors
    ///
    /// Returns `InvalidQuantity`, `ProductNotFound`, `ProductUnavailable`, or
    /// `InsufficientStock` when the resulting line could not be bought.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartView, CartError> {
        if quantity < 1 {
            return Err(CartError::InvalidQuantity);
        }
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        carts::lock(&mut tx, user_id).await?;
        let existing = carts::quantity_of(&mut tx, user_id, product_id).await?.unwrap_or(0);
        let wanted = existing.saturating_add(quantity);

        self.check_line(product_id, wanted).await?;
        carts::set_quantity(&mut tx, user_id, product_id, wanted).await?;
        tx.commit().await.map_err(RepositoryError::from)?;
        self.view(user_id).await
    }

    /// Set a line's quantity. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Same as [`Self::add_item`].
    #[instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartView, CartError> {
        if quantity == 0 {
            return self.remove(user_id, product_id).await;
        }
        if quantity < 0 {
            return Err(CartError::InvalidQuantity);
        }

        self.check_line(product_id, quantity).await?;
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        carts::lock(&mut tx, user_id).await?;
        carts::set_quantity(&mut tx, user_id, product_id, quantity).await?;
        tx.commit().await.map_err(RepositoryError::from)?;
        self.view(user_id).await
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns error if a query fails.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<CartView, CartError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        carts::lock(&mut tx, user_id).await?;
        carts::remove(&mut tx, user_id, product_id).await?;
        tx.commit().await.map_err(RepositoryError::from)?;
        self.view(user_id).await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns error if a query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<CartView, CartError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        carts::lock(&mut tx, user_id).await?;
        carts::clear(&mut tx, user_id).await?;
        tx.commit().await.map_err(RepositoryError::from)?;
        self.view(user_id).await
    }

    /// Fold a guest's lines into the saved cart in one transaction.
    ///
    /// # Errors
    ///
    /// Returns error if a query fails.
    #[instrument(skip(self, guest), fields(guest_lines = guest.len()))]
    pub async fn merge(&self, user_id: UserId, guest: &[CartLine]) -> Result<(CartView, CartMerge), CartError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let saved = carts::lock_lines(&mut tx, user_id).await?;
        let ids: Vec<ProductId> = saved
            .iter()
            .chain(guest)
            .map(|l| l.product_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let products = ProductRepository::new(self.pool).get_many(&ids).await?;
        let availability: HashMap<ProductId, Availability> = products
            .iter()
            .map(|p| {
                (
                    p.id,
                    Availability {
                        active: p.is_active,
                        stock: p.stock,
                    },
                )
            })
            .collect();

        let merged = merge::merge_cart(&saved, guest, &availability);
        carts::replace(&mut tx, user_id, &merged.lines).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        info!(
            lines = merged.lines.len(),
            clamped = merged.clamped.len(),
            dropped = merged.dropped.len(),
            "Guest cart merged"
        );

        let offers = OfferRepository::new(self.pool).live_rules(Utc::now()).await?;
        let shipping = self.cache.shipping(self.pool).await?.rules();
        let view = CartView::build(&merged.lines, products, &offers, &shipping);
        Ok((view, merged))
    }

    async fn check_line(&self, product_id: ProductId, quantity: i32) -> Result<(), CartError> {
        if quantity > MAX_LINE_QUANTITY {
            return Err(CartError::InvalidQuantity);
        }
        let product = ProductRepository::new(self.pool)
            .get_by_id(product_id)
            .await?
            .ok_or(CartError::ProductNotFound)?;
        if !product.is_active {
            return Err(CartError::ProductUnavailable { name: product.name });
        }
        if product.stock < quantity {
            return Err(CartError::InsufficientStock {
                name: product.name,
                available: product.stock,
            });
        }
        Ok(())
    }

    // =========================================================================
    // Wishlist
    // =========================================================================

    /// Products on the user's wishlist, priced.
    ///
    /// # Errors
    ///
    /// Returns error if a query fails.
    pub async fn wishlist(&self, user_id: UserId) -> Result<Vec<ProductView>, CartError> {
        let ids = WishlistRepository::new(self.pool).product_ids(user_id).await?;
        self.product_views(&ids).await
    }

    /// Add a product to the wishlist. Adding twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ProductNotFound` for an unknown product.
    pub async fn add_to_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Vec<ProductView>, CartError> {
        ProductRepository::new(self.pool)
            .get_by_id(product_id)
            .await?
            .ok_or(CartError::ProductNotFound)?;
        WishlistRepository::new(self.pool).add(user_id, product_id).await?;
        self.wishlist(user_id).await
    }

    /// Remove a product from the wishlist.
    ///
    /// # Errors
    ///
    /// Returns error if a query fails.
    pub async fn remove_from_wishlist(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<Vec<ProductView>, CartError> {
        WishlistRepository::new(self.pool).remove(user_id, product_id).await?;
        self.wishlist(user_id).await
    }

    /// Union a guest wishlist into the saved one.
    ///
    /// # Errors
    ///
    /// Returns error if a query fails.
    pub async fn merge_wishlist(
        &self,
        user_id: UserId,
        guest: &[ProductId],
    ) -> Result<Vec<ProductView>, CartError> {
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let saved = wishlists::lock_product_ids(&mut tx, user_id).await?;
        let known: BTreeSet<ProductId> = ProductRepository::new(self.pool)
            .get_many(guest)
            .await?
            .into_iter()
            .map(|p| p.id)
            .chain(saved.iter().copied())
            .collect();
        let merged = merge::merge_wishlist(&saved, guest, &known);
        wishlists::add_many(&mut tx, user_id, &new_wishlist_ids(&saved, &merged)).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        self.wishlist(user_id).await
    }

    async fn product_views(&self, ids: &[ProductId]) -> Result<Vec<ProductView>, CartError> {
        let products = ProductRepository::new(self.pool).get_many(ids).await?;
        let offers = OfferRepository::new(self.pool).live_rules(Utc::now()).await?;
        let now = Utc::now();
        let mut by_id: HashMap<ProductId, Product> =
            products.into_iter().map(|p| (p.id, p)).collect();
        Ok(ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .map(|p| ProductView::new(p, &offers, now))
            .collect())
    }
}

/// Merged ids not already saved; only these are inserted.
fn new_wishlist_ids(saved: &[ProductId], merged: &[ProductId]) -> Vec<ProductId> {
    let saved: BTreeSet<&ProductId> = saved.iter().collect();
    merged.iter().filter(|id| !saved.contains(id)).copied().collect()
}

#[cfg(test)]
mod tests {
    use kirana_core::CategoryId;

    use super::*;

    fn product(id: i32, price: i64) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            slug: format!("product-{id}"),
            description: String::new(),
            category_id: Some(CategoryId::new(1)),
            category_name: None,
            category_slug: None,
            price: Decimal::from(price),
            mrp: None,
            stock: 20,
            images: vec![],
            is_active: true,
            is_featured: false,
            rating_average: Decimal::ZERO,
            rating_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn line(id: i32, quantity: i32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            quantity,
        }
    }

    #[test]
    fn test_wishlist_merge_inserts_only_unsaved_ids() {
        let saved = [ProductId::new(4), ProductId::new(2)];
        let merged = [ProductId::new(1), ProductId::new(2), ProductId::new(4), ProductId::new(7)];
        assert_eq!(
            new_wishlist_ids(&saved, &merged),
            vec![ProductId::new(1), ProductId::new(7)]
        );
        assert!(new_wishlist_ids(&saved, &saved).is_empty());
    }

    #[test]
    fn test_view_prices_lines_and_shipping() {
        let rules = ShippingRules::default();
        let view = CartView::build(
            &[line(1, 2), line(2, 1)],
            vec![product(1, 100), product(2, 150)],
            &[],
            &rules,
        );

        assert_eq!(view.item_count, 3);
        assert_eq!(view.subtotal, Decimal::from(350));
        assert_eq!(view.shipping_fee, rules.flat_fee);
        assert_eq!(view.total, Decimal::from(350) + rules.flat_fee);
    }

    #[test]
    fn test_view_skips_missing_products_and_empty_cart_ships_free() {
        let view = CartView::build(&[line(9, 1)], vec![], &[], &ShippingRules::default());
        assert!(view.items.is_empty());
        assert_eq!(view.shipping_fee, Decimal::ZERO);
        assert_eq!(view.total, Decimal::ZERO);
    }
}
