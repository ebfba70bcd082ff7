//! Integration tests for cartsync.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p cartsync-integration-tests
//! ```
//!
//! No external services are needed. [`CartService`] serves the remote cart
//! API from inside the test process on an ephemeral port.
//!
//! # Test Categories
//!
//! - `guest_cart_flow` - Guest cart persistence through the file store
//! - `remote_http` - HTTP accessor and sign-in reconciliation against
//!   [`CartService`]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use cartsync_cart::{CartPayload, RemoteConfig};
use cartsync_core::{Cart, LineItem, ProductId, ProductRef, Quantity};
use secrecy::SecretString;
use tokio::task::JoinHandle;
use url::Url;

/// Token [`CartService`] accepts unless told otherwise.
pub const TEST_TOKEN: &str = "test-token";

/// Seconds advertised in `Retry-After` for injected 429 responses.
pub const RETRY_AFTER_SECS: u64 = 7;

/// In-process remote cart service.
///
/// Serves `GET /api/cart` and `PUT /api/cart` for a single user. Requests
/// must carry `Authorization: Bearer {token}`. The server task stops when the
/// service is dropped.
pub struct CartService {
    base_url: Url,
    state: Arc<ServiceState>,
    task: JoinHandle<()>,
}

struct ServiceState {
    token: String,
    cart: Mutex<Cart>,
    fail_next: Mutex<Option<StatusCode>>,
    fetches: AtomicUsize,
    replaces: AtomicUsize,
}

impl ServiceState {
    fn cart(&self) -> Cart {
        self.cart
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Injected failures win over the auth check.
    fn reject(&self, headers: &HeaderMap) -> Option<Response> {
        let injected = self
            .fail_next
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(status) = injected {
            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = RETRY_AFTER_SECS.to_string();
                return Some((status, [(header::RETRY_AFTER, retry_after)], "slow down").into_response());
            }
            return Some((status, "injected failure").into_response());
        }

        let expected = format!("Bearer {}", self.token);
        let authorized = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected);
        if authorized {
            None
        } else {
            Some(StatusCode::UNAUTHORIZED.into_response())
        }
    }
}

async fn get_cart(State(state): State<Arc<ServiceState>>, headers: HeaderMap) -> Response {
    if let Some(rejection) = state.reject(&headers) {
        return rejection;
    }
    state.fetches.fetch_add(1, Ordering::SeqCst);
    Json(CartPayload {
        items: state.cart(),
    })
    .into_response()
}

async fn put_cart(
    State(state): State<Arc<ServiceState>>,
    headers: HeaderMap,
    Json(payload): Json<CartPayload>,
) -> Response {
    if let Some(rejection) = state.reject(&headers) {
        return rejection;
    }
    state.replaces.fetch_add(1, Ordering::SeqCst);
    state
        .cart
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone_from(&payload.items);
    Json(payload).into_response()
}

impl CartService {
    /// Start a service holding an empty cart.
    ///
    /// # Errors
    ///
    /// Returns an error if no local port can be bound.
    pub async fn start() -> std::io::Result<Self> {
        Self::with_cart(Cart::new()).await
    }

    /// Start a service already holding `cart`.
    ///
    /// # Errors
    ///
    /// Returns an error if no local port can be bound.
    pub async fn with_cart(cart: Cart) -> std::io::Result<Self> {
        let state = Arc::new(ServiceState {
            token: TEST_TOKEN.to_string(),
            cart: Mutex::new(cart),
            fail_next: Mutex::new(None),
            fetches: AtomicUsize::new(0),
            replaces: AtomicUsize::new(0),
        });

        let app = Router::new()
            .route("/api/cart", get(get_cart).put(put_cart))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;
        let base_url = Url::parse(&format!("http://{addr}/api")).map_err(std::io::Error::other)?;

        let task = tokio::spawn(async move {
            // Ends when the task is aborted.
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url,
            state,
            task,
        })
    }

    /// Base URL to configure the accessor with. The cart lives under it.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Remote configuration with the accepted token.
    #[must_use]
    pub fn remote_config(&self) -> RemoteConfig {
        self.remote_config_with_token(TEST_TOKEN)
    }

    /// Remote configuration with an arbitrary token.
    #[must_use]
    pub fn remote_config_with_token(&self, token: &str) -> RemoteConfig {
        RemoteConfig {
            base_url: self.base_url.clone(),
            token: SecretString::from(token.to_string()),
            timeout: Duration::from_secs(5),
        }
    }

    /// The cart the service currently stores.
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.state.cart()
    }

    /// Answer the next request with `status` instead of serving it.
    pub fn fail_next(&self, status: StatusCode) {
        *self
            .state
            .fail_next
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(status);
    }

    /// Number of successful `GET` requests served.
    #[must_use]
    pub fn fetches(&self) -> usize {
        self.state.fetches.load(Ordering::SeqCst)
    }

    /// Number of successful `PUT` requests served.
    #[must_use]
    pub fn replaces(&self) -> usize {
        self.state.replaces.load(Ordering::SeqCst)
    }
}

impl Drop for CartService {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Build a line item for a product with no display fields.
///
/// # Panics
///
/// Panics if `id` is empty or `quantity` is zero.
#[must_use]
pub fn item(id: &str, quantity: u32) -> LineItem {
    LineItem::new(
        ProductRef::new(ProductId::parse(id).expect("product id must be non-empty")),
        Quantity::new(quantity).expect("quantity must be positive"),
    )
}

/// Build a cart from `(product id, quantity)` pairs.
///
/// # Panics
///
/// Panics under the same conditions as [`item`].
#[must_use]
pub fn cart(items: &[(&str, u32)]) -> Cart {
    items.iter().map(|&(id, quantity)| item(id, quantity)).collect()
}
