//! Line items and carts.
//!
//! A [`Cart`] is an ordered list of [`LineItem`]s with at most one line per
//! product. Every constructor and mutator in this module preserves that
//! invariant; there is no way to build a `Cart` holding two lines for the same
//! product or a line with a quantity of zero.

use serde::{Deserialize, Deserializer, Serialize};

use super::id::ProductId;
use super::product::ProductRef;
use super::quantity::Quantity;

/// Cart invariant violations.
///
/// These indicate a programming defect in whatever produced the items, not a
/// user-facing condition.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Two line items reference the same product.
    #[error("duplicate line item for product {0}")]
    DuplicateProduct(ProductId),
}

/// A product and how many of it are in the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// The product being purchased.
    pub product: ProductRef,
    /// How many units; always at least 1.
    pub quantity: Quantity,
}

impl LineItem {
    /// Create a line item.
    #[must_use]
    pub const fn new(product: ProductRef, quantity: Quantity) -> Self {
        Self { product, quantity }
    }

    /// The product identifier of this line.
    #[must_use]
    pub const fn product_id(&self) -> &ProductId {
        &self.product.id
    }
}

/// Result of [`Cart::coalesce`].
#[derive(Debug, Clone, PartialEq)]
pub struct Coalesced {
    /// The deduplicated cart.
    pub cart: Cart,
    /// Number of input lines folded into an earlier line for the same product.
    pub merged: usize,
}

/// An ordered, product-unique list of line items.
///
/// Serialized as a plain JSON array of line items. Deserialization folds
/// duplicate products together (summing quantities) so that data from an
/// untrusted source can never break the uniqueness invariant.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<LineItem>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a cart from items that must already be product-unique.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantViolation::DuplicateProduct`] for the first product
    /// that appears more than once.
    pub fn try_from_items(items: Vec<LineItem>) -> Result<Self, InvariantViolation> {
        for (index, item) in items.iter().enumerate() {
            if items
                .iter()
                .take(index)
                .any(|other| other.product_id() == item.product_id())
            {
                return Err(InvariantViolation::DuplicateProduct(item.product_id().clone()));
            }
        }
        Ok(Self { items })
    }

    /// Build a cart from arbitrary items, folding duplicates together.
    ///
    /// Each product keeps the position of its first occurrence and the sum of
    /// all its quantities.
    #[must_use]
    pub fn coalesce(items: impl IntoIterator<Item = LineItem>) -> Coalesced {
        let mut cart = Self::new();
        let mut merged = 0;
        for item in items {
            if cart.add(item) {
                merged += 1;
            }
        }
        Coalesced { cart, merged }
    }

    /// Add an item, merging into an existing line for the same product.
    ///
    /// Returns `true` if the item was merged into an existing line, `false`
    /// if it was appended.
    pub fn add(&mut self, item: LineItem) -> bool {
        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|line| line.product_id() == item.product_id())
        {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
            true
        } else {
            self.items.push(item);
            false
        }
    }

    /// Combine two carts, summing quantities per product.
    ///
    /// Lines from `self` come first in their existing order; products only
    /// present in `other` are appended in `other`'s order.
    #[must_use]
    pub fn merged_with(&self, other: &Self) -> Self {
        let mut merged = self.clone();
        for item in &other.items {
            merged.add(item.clone());
        }
        merged
    }

    /// The line items, in insertion order.
    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Iterate over the line items.
    pub fn iter(&self) -> std::slice::Iter<'_, LineItem> {
        self.items.iter()
    }

    /// Look up the line for a product.
    #[must_use]
    pub fn get(&self, product_id: &ProductId) -> Option<&LineItem> {
        self.items.iter().find(|line| line.product_id() == product_id)
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of all line quantities. Zero for an empty cart.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.items
            .iter()
            .map(|line| u64::from(line.quantity.get()))
            .sum()
    }

    /// Consume the cart and return its line items.
    #[must_use]
    pub fn into_items(self) -> Vec<LineItem> {
        self.items
    }
}

impl<'de> Deserialize<'de> for Cart {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let items = Vec::<LineItem>::deserialize(deserializer)?;
        Ok(Self::coalesce(items).cart)
    }
}

impl FromIterator<LineItem> for Cart {
    fn from_iter<I: IntoIterator<Item = LineItem>>(iter: I) -> Self {
        Self::coalesce(iter).cart
    }
}

impl IntoIterator for Cart {
    type Item = LineItem;
    type IntoIter = std::vec::IntoIter<LineItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Cart {
    type Item = &'a LineItem;
    type IntoIter = std::slice::Iter<'a, LineItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
