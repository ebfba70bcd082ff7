//! Guest cart commands.
//!
//! # Usage
//!
//! ```bash
//! cartsync add 64f0c2a9e1 -q 2 -n "Pineapple Soap"
//! cartsync replace cart.json
//! cartsync clear
//! cartsync show
//! ```

use std::path::Path;

use cartsync_core::{LineItem, ProductId, ProductRef, Quantity};

use super::{CommandError, Coordinator, emit, render};

/// Print the visible cart.
///
/// A signed-in session fetches the server cart first. A failed fetch is
/// logged and the last known cart is printed with its error flag set.
pub async fn show(cart: &Coordinator, json: bool) -> Result<(), CommandError> {
    if let Err(e) = cart.refetch().await {
        tracing::warn!("Could not fetch server cart: {e}");
    }
    emit(&render(&cart.snapshot(), json)?)
}

/// Add `quantity` units of a product to the guest cart.
pub fn add(
    cart: &mut Coordinator,
    product_id: &str,
    quantity: u32,
    name: Option<&str>,
    json: bool,
) -> Result<(), CommandError> {
    let item = line_item(product_id, quantity, name)?;
    tracing::info!("Adding {} x {} to guest cart", quantity, product_id);
    cart.add_item(item)?;
    print_guest(cart, json)
}

/// Replace the guest cart with the JSON array of line items in `file`.
pub fn replace(cart: &mut Coordinator, file: &Path, json: bool) -> Result<(), CommandError> {
    let raw = std::fs::read_to_string(file)?;
    let items: Vec<LineItem> = serde_json::from_str(&raw)?;
    tracing::info!("Replacing guest cart with {} lines from {}", items.len(), file.display());
    cart.replace(items)?;
    print_guest(cart, json)
}

/// Empty the guest cart.
pub fn clear(cart: &mut Coordinator, json: bool) -> Result<(), CommandError> {
    cart.clear()?;
    tracing::info!("Guest cart cleared");
    print_guest(cart, json)
}

fn line_item(product_id: &str, quantity: u32, name: Option<&str>) -> Result<LineItem, CommandError> {
    let id = ProductId::parse(product_id)
        .map_err(|e| CommandError::InvalidInput(format!("product id: {e}")))?;
    let quantity =
        Quantity::new(quantity).map_err(|e| CommandError::InvalidInput(format!("quantity: {e}")))?;

    let mut product = ProductRef::new(id);
    if let Some(name) = name {
        product = product.with_display("name", name);
    }
    Ok(LineItem::new(product, quantity))
}

/// Guest commands always report the guest cart, even for a signed-in session
/// whose visible cart is the server's.
fn print_guest(cart: &Coordinator, json: bool) -> Result<(), CommandError> {
    let guest = cart.guest().cart().clone();
    let snapshot = cartsync_cart::CartSnapshot {
        total_quantity: guest.total_quantity(),
        cart: guest,
        is_loading: false,
        is_fetching: false,
        is_error: false,
        source: cartsync_cart::CartSource::Local,
    };
    emit(&render(&snapshot, json)?)
}
