//! Client-side key-value persistence for the guest cart.
//!
//! A [`LocalCartStore`] is the device's equivalent of browser local storage:
//! string keys, string values, whole-value overwrites. The guest cart lives
//! under [`keys::GUEST_CART`] as a JSON array of line items.
//!
//! Two implementations are provided:
//! - [`MemoryStore`] - `HashMap`-backed, for tests and embedding
//! - [`FileStore`] - one file per key in a directory

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use thiserror::Error;

/// Storage keys used by the cart.
pub mod keys {
    /// Key for the serialized guest cart.
    pub const GUEST_CART: &str = "guest_cart";
}

/// Errors that can occur when reading or writing a local store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("I/O error on key {key}: {source}")]
    Io {
        /// Key being accessed.
        key: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Key cannot be used by this store.
    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// A string key-value store on the client device.
///
/// Writes fully replace the previous value. Implementations must make a
/// completed `set` or `remove` visible to the next `get` on the same store.
pub trait LocalCartStore {
    /// Read the value under `key`, or `None` if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the value cannot be written.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete `key`. Deleting an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the key exists but cannot be deleted.
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

impl<S: LocalCartStore + ?Sized> LocalCartStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}
