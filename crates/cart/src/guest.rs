//! Guest cart state container.
//!
//! [`GuestCart`] owns the in-memory guest cart and is the only writer of its
//! mirror in the local store. It is constructed explicitly around an injected
//! store and lives as long as the caller keeps it; there is no process-wide
//! instance.

use cartsync_core::{Cart, LineItem};
use tracing::{debug, warn};

use crate::error::Result;
use crate::reducer::{self, CartAction};
use crate::store::{LocalCartStore, keys};

/// The guest cart and its persisted mirror.
#[derive(Debug)]
pub struct GuestCart<S> {
    store: S,
    cart: Cart,
}

impl<S: LocalCartStore> GuestCart<S> {
    /// Load the guest cart from `store`.
    ///
    /// Reading is best-effort: an absent key, an unreadable store, or a value
    /// that does not parse all yield an empty cart. Duplicate products in
    /// stored data are folded together.
    pub fn load(store: S) -> Self {
        let cart = read_cart(&store);
        Self { store, cart }
    }

    /// The current guest cart.
    #[must_use]
    pub const fn cart(&self) -> &Cart {
        &self.cart
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Tear down the container and hand back its store.
    #[must_use]
    pub fn into_store(self) -> S {
        self.store
    }

    /// Apply `action`, mirror the result to the store, and return the new cart.
    ///
    /// The store write finishes before this returns. `Add` and `Replace`
    /// overwrite the stored value with the full cart; `Clear` deletes the key.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails. The in-memory cart is then
    /// left as it was, so memory and store stay in step.
    pub fn dispatch(&mut self, action: CartAction) -> Result<&Cart> {
        let name = action.name();
        let clears = matches!(action, CartAction::Clear);
        let next = reducer::reduce(&self.cart, action);

        if clears {
            self.store.remove(keys::GUEST_CART)?;
        } else {
            let serialized = serde_json::to_string(&next)?;
            self.store.set(keys::GUEST_CART, &serialized)?;
        }

        debug!(
            action = name,
            lines = next.len(),
            total_quantity = next.total_quantity(),
            "Guest cart updated"
        );
        self.cart = next;
        Ok(&self.cart)
    }

    /// Add an item to the guest cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub fn add_item(&mut self, item: LineItem) -> Result<&Cart> {
        self.dispatch(CartAction::Add(item))
    }

    /// Replace the guest cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub fn replace(&mut self, cart: Cart) -> Result<&Cart> {
        self.dispatch(CartAction::Replace(cart))
    }

    /// Empty the guest cart and delete its store entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the store entry cannot be deleted.
    pub fn clear(&mut self) -> Result<&Cart> {
        self.dispatch(CartAction::Clear)
    }
}

fn read_cart<S: LocalCartStore>(store: &S) -> Cart {
    let raw = match store.get(keys::GUEST_CART) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Cart::new(),
        Err(e) => {
            warn!(error = %e, "Failed to read guest cart, starting empty");
            return Cart::new();
        }
    };

    let items = match serde_json::from_str::<Vec<LineItem>>(&raw) {
        Ok(items) => items,
        Err(e) => {
            warn!(error = %e, "Stored guest cart is corrupt, starting empty");
            return Cart::new();
        }
    };

    let coalesced = Cart::coalesce(items);
    if coalesced.merged > 0 {
        warn!(
            merged = coalesced.merged,
            "Stored guest cart had duplicate products, merged them"
        );
    }
    coalesced.cart
}
