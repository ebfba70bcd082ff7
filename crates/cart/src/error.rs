//! Unified error handling for cart operations.
//!
//! Ordinary shopper situations (an empty cart, a product that is not in the
//! cart, a remote fetch that has not finished) are states, not errors. A
//! `CartError` means a store or remote call failed, a caller handed in
//! items that break the cart invariant, or an operation was attempted in the
//! wrong session phase.

use cartsync_core::InvariantViolation;
use thiserror::Error;

use crate::remote::RemoteError;
use crate::store::StoreError;

/// Cart-level error type.
#[derive(Debug, Error)]
pub enum CartError {
    /// Local store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Remote cart operation failed.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Items violate the cart invariant.
    #[error("Invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    /// Cart could not be serialized for the local store.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Operation requires a signed-in user.
    #[error("Not authenticated")]
    NotAuthenticated,
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;
