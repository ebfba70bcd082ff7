//! Pure cart state transitions.
//!
//! These functions never touch storage. [`GuestCart`](crate::GuestCart) runs
//! them and mirrors each result to the local store.

use cartsync_core::{Cart, LineItem};

/// A guest cart mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum CartAction {
    /// Add an item, merging with an existing line for the same product.
    Add(LineItem),
    /// Substitute the whole cart.
    Replace(Cart),
    /// Empty the cart.
    Clear,
}

impl CartAction {
    /// Short name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Add(_) => "add",
            Self::Replace(_) => "replace",
            Self::Clear => "clear",
        }
    }
}

/// Apply `action` to `current`, returning the next cart.
#[must_use]
pub fn reduce(current: &Cart, action: CartAction) -> Cart {
    match action {
        CartAction::Add(item) => add_item(current, item),
        CartAction::Replace(items) => replace_cart(current, items),
        CartAction::Clear => clear_cart(current),
    }
}

/// Add `item` to the cart.
///
/// An existing line for the same product has its quantity increased by
/// `item.quantity`; otherwise the item is appended. There is deliberately no
/// per-line maximum here; quantities only saturate at `u32::MAX`.
#[must_use]
pub fn add_item(current: &Cart, item: LineItem) -> Cart {
    let mut next = current.clone();
    next.add(item);
    next
}

/// Substitute the whole cart with `items`.
#[must_use]
pub fn replace_cart(_current: &Cart, items: Cart) -> Cart {
    items
}

/// Empty the cart.
#[must_use]
pub const fn clear_cart(_current: &Cart) -> Cart {
    Cart::new()
}
