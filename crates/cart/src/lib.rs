//! cartsync Cart - Guest and server cart reconciliation.
//!
//! A shopper's cart lives in one of two places: on the device while they are
//! anonymous, and on the server once they sign in. This crate keeps the two
//! consistent and gives callers a single surface that does not care which one
//! is in use.
//!
//! # Architecture
//!
//! - [`store`] - Client key-value persistence for the guest cart
//! - [`reducer`] - Pure add/replace/clear transitions
//! - [`guest`] - Guest cart container mirroring every transition to the store
//! - [`remote`] - Server cart accessor, HTTP implementation, and query state
//! - [`coordinator`] - Chooses the visible cart from the authentication signal
//!   and reconciles guest and server carts on sign-in
//! - [`config`] - Environment configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use cartsync_cart::{CartCoordinator, GuestCart, HttpCartAccessor, RemoteCart};
//! use cartsync_cart::store::FileStore;
//!
//! let guest = GuestCart::load(FileStore::new(&config.store_dir));
//! let remote = RemoteCart::new(HttpCartAccessor::new(&remote_config)?);
//! let mut cart = CartCoordinator::new(guest, remote, config.invariant_policy);
//!
//! cart.add_item(item)?;
//! if let Transition::LoggedIn { pending_guest_items: true } = cart.set_auth_state(auth) {
//!     cart.merge_guest_into_remote(MergeStrategy::Sum).await?;
//! }
//! let view = cart.snapshot();
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod guest;
pub mod reducer;
pub mod remote;
pub mod store;

pub use config::{CartConfig, ConfigError, RemoteConfig};
pub use coordinator::{
    CartCoordinator, CartProvider, CartSnapshot, CartSource, InvariantPolicy, MergeReport,
    MergeStrategy, SessionPhase, Transition,
};
pub use error::{CartError, Result};
pub use guest::GuestCart;
pub use reducer::CartAction;
pub use remote::{
    CartPayload, FetchOutcome, HttpCartAccessor, RemoteCart, RemoteCartAccessor, RemoteError,
    RemoteSnapshot,
};
pub use store::{FileStore, LocalCartStore, MemoryStore, StoreError};
