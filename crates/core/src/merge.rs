//! Merging a guest's browser-local cart and wishlist into an account.
//!
//! Before login the storefront keeps the cart in local storage. On login it
//! posts those lines and the server folds them into the saved cart in one
//! pass, instead of replaying one add-to-cart call per item.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::ProductId;

/// Most units of a single product one cart line may hold.
pub const MAX_LINE_QUANTITY: i32 = 10;

/// A cart line as `(product, quantity)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// What the merge needs to know about a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    pub active: bool,
    pub stock: i32,
}

/// Why a guest line was not carried over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// No such product.
    Unknown,
    /// The product is no longer sold.
    Inactive,
    /// Nothing left in stock.
    OutOfStock,
    /// Quantity was zero or negative.
    InvalidQuantity,
}

/// A line that was dropped, with the reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DroppedLine {
    pub product_id: ProductId,
    pub reason: DropReason,
}

/// Result of merging carts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CartMerge {
    /// The merged cart, ordered by product id.
    pub lines: Vec<CartLine>,
    /// Products whose quantity was reduced to fit stock or the line cap.
    pub clamped: Vec<ProductId>,
    /// Guest lines that could not be kept.
    pub dropped: Vec<DroppedLine>,
}

/// Merge `guest` lines into the `saved` cart.
///
/// Quantities for the same product are summed, then clamped to available
/// stock and [`MAX_LINE_QUANTITY`]. Lines for unknown, inactive, or
/// out-of-stock products are dropped; saved lines are subject to the same
/// rules so the result is always purchasable.
#[must_use]
pub fn merge_cart(
    saved: &[CartLine],
    guest: &[CartLine],
    availability: &HashMap<ProductId, Availability>,
) -> CartMerge {
    let mut wanted: BTreeMap<ProductId, i32> = BTreeMap::new();
    let mut merge = CartMerge::default();

    for line in saved.iter().chain(guest) {
        if line.quantity <= 0 {
            merge.dropped.push(DroppedLine {
                product_id: line.product_id,
                reason: DropReason::InvalidQuantity,
            });
            continue;
        }
        let entry = wanted.entry(line.product_id).or_insert(0);
        *entry = entry.saturating_add(line.quantity);
    }

    for (product_id, quantity) in wanted {
        let Some(avail) = availability.get(&product_id) else {
            merge.dropped.push(DroppedLine {
                product_id,
                reason: DropReason::Unknown,
            });
            continue;
        };
        if !avail.active {
            merge.dropped.push(DroppedLine {
                product_id,
                reason: DropReason::Inactive,
            });
            continue;
        }
        if avail.stock <= 0 {
            merge.dropped.push(DroppedLine {
                product_id,
                reason: DropReason::OutOfStock,
            });
            continue;
        }

        let allowed = quantity.min(avail.stock).min(MAX_LINE_QUANTITY);
        if allowed < quantity {
            merge.clamped.push(product_id);
        }
        merge.lines.push(CartLine {
            product_id,
            quantity: allowed,
        });
    }

    merge
}

/// Union of the saved and guest wishlists, without duplicates, limited to
/// products that exist.
#[must_use]
pub fn merge_wishlist(
    saved: &[ProductId],
    guest: &[ProductId],
    known: &BTreeSet<ProductId>,
) -> Vec<ProductId> {
    saved
        .iter()
        .chain(guest)
        .filter(|id| known.contains(id))
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: i32, quantity: i32) -> CartLine {
        CartLine {
            product_id: ProductId::new(id),
            quantity,
        }
    }

    fn available(stock: i32) -> Availability {
        Availability {
            active: true,
            stock,
        }
    }

    #[test]
    fn test_quantities_are_summed() {
        let availability = HashMap::from([
            (ProductId::new(1), available(50)),
            (ProductId::new(2), available(50)),
        ]);
        let merged = merge_cart(&[line(1, 2)], &[line(1, 3), line(2, 1)], &availability);

        assert_eq!(merged.lines, vec![line(1, 5), line(2, 1)]);
        assert!(merged.clamped.is_empty());
        assert!(merged.dropped.is_empty());
    }

    #[test]
    fn test_clamped_to_stock_and_line_cap() {
        let availability = HashMap::from([
            (ProductId::new(1), available(3)),
            (ProductId::new(2), available(100)),
        ]);
        let merged = merge_cart(&[line(1, 2), line(2, 8)], &[line(1, 2), line(2, 8)], &availability);

        assert_eq!(merged.lines, vec![line(1, 3), line(2, MAX_LINE_QUANTITY)]);
        assert_eq!(merged.clamped, vec![ProductId::new(1), ProductId::new(2)]);
    }

    #[test]
    fn test_unavailable_lines_dropped() {
        let availability = HashMap::from([
            (ProductId::new(1), Availability { active: false, stock: 5 }),
            (ProductId::new(2), available(0)),
        ]);
        let merged = merge_cart(&[], &[line(1, 1), line(2, 1), line(3, 1), line(4, 0)], &availability);

        assert!(merged.lines.is_empty());
        let reasons: Vec<_> = merged.dropped.iter().map(|d| d.reason).collect();
        assert_eq!(
            reasons,
            vec![
                DropReason::InvalidQuantity,
                DropReason::Inactive,
                DropReason::OutOfStock,
                DropReason::Unknown,
            ]
        );
    }

    #[test]
    fn test_wishlist_union_dedupes() {
        let known: BTreeSet<_> = [1, 2, 3].into_iter().map(ProductId::new).collect();
        let merged = merge_wishlist(
            &[ProductId::new(2), ProductId::new(1)],
            &[ProductId::new(2), ProductId::new(3), ProductId::new(99)],
            &known,
        );
        assert_eq!(
            merged,
            vec![ProductId::new(1), ProductId::new(2), ProductId::new(3)]
        );
    }
}
