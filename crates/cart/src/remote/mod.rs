//! Server-backed cart access.
//!
//! # Architecture
//!
//! - [`RemoteCartAccessor`] is the seam to the backend cart service: fetch the
//!   signed-in user's cart, replace it wholesale. The backend treats each
//!   replace as atomic for the cart as a whole.
//! - [`HttpCartAccessor`] implements it over JSON/HTTP with `reqwest`.
//! - [`RemoteCart`] wraps an accessor with query state: the most recently
//!   completed result, in-flight flags, the last error, and stale-response
//!   suppression.
//!
//! Retries and response caching belong to the backend and HTTP layers, not
//! here.

mod http;
mod query;

pub use http::HttpCartAccessor;
pub use query::{FetchOutcome, RemoteCart, RemoteSnapshot};

use std::future::Future;

use cartsync_core::Cart;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when talking to the remote cart service.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Service answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// Response status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Credentials were missing, expired, or rejected.
    #[error("Unauthorized")]
    Unauthorized,

    /// Rate limited by the service.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The service could not be reached or refused the operation.
    #[error("Remote cart unavailable: {0}")]
    Unavailable(String),
}

/// Wire shape of a cart on the remote service: `{"items": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartPayload {
    /// Line items, product-unique after deserialization.
    #[serde(default)]
    pub items: Cart,
}

/// Access to the signed-in user's server cart.
///
/// Implementations must be cheap to share across tasks.
pub trait RemoteCartAccessor: Send + Sync {
    /// Fetch the current server cart.
    fn fetch(&self) -> impl Future<Output = Result<Cart, RemoteError>> + Send;

    /// Replace the server cart with `cart` and return what the server stored.
    fn replace(&self, cart: &Cart) -> impl Future<Output = Result<Cart, RemoteError>> + Send;
}

impl<A: RemoteCartAccessor> RemoteCartAccessor for std::sync::Arc<A> {
    fn fetch(&self) -> impl Future<Output = Result<Cart, RemoteError>> + Send {
        (**self).fetch()
    }

    fn replace(&self, cart: &Cart) -> impl Future<Output = Result<Cart, RemoteError>> + Send {
        (**self).replace(cart)
    }
}
