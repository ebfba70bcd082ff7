//! Product references carried by cart line items.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::id::ProductId;

/// A reference to a catalog product, as stored in a cart.
///
/// Only the identifier matters to the cart; every other member is display
/// data (name, image, slug, ...) kept verbatim so that a cart written by one
/// client reads back identically in another.
///
/// Serialized as `{"_id": "...", ...display fields}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRef {
    /// Catalog identifier.
    #[serde(rename = "_id")]
    pub id: ProductId,
    /// Display-only fields.
    #[serde(flatten)]
    pub display: Map<String, Value>,
}

impl ProductRef {
    /// Create a product reference without display data.
    #[must_use]
    pub fn new(id: ProductId) -> Self {
        Self {
            id,
            display: Map::new(),
        }
    }

    /// Attach a display field, replacing any previous value under `key`.
    #[must_use]
    pub fn with_display(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.display.insert(key.into(), value.into());
        self
    }

    /// Display name, if the catalog supplied one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.display.get("name").and_then(Value::as_str)
    }
}

impl From<ProductId> for ProductRef {
    fn from(id: ProductId) -> Self {
        Self::new(id)
    }
}
