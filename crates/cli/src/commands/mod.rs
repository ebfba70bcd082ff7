//! CLI command implementations.
//!
//! Every command works through one [`CartCoordinator`] built by [`open`]:
//! a guest cart in `CARTSYNC_STORE_DIR`, and, when `CARTSYNC_REMOTE_URL` is
//! set, a signed-in session against that cart service.

pub mod cart;
pub mod sync;

use std::io::Write;

use cartsync_cart::{
    CartConfig, CartCoordinator, CartError, CartSnapshot, ConfigError, FileStore, GuestCart,
    HttpCartAccessor, RemoteCart, RemoteCartAccessor, RemoteError,
};
use cartsync_core::{AuthState, Cart, UserDescriptor};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Cart operation failed.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// Remote client could not be created.
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Reading input or writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON input or output failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid command-line input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Command needs a remote cart service.
    #[error("No remote cart service configured (set CARTSYNC_REMOTE_URL and CARTSYNC_REMOTE_TOKEN)")]
    RemoteNotConfigured,
}

/// Remote accessor that may be absent.
///
/// Without a configured service the session stays anonymous, so the
/// coordinator never calls it.
pub struct MaybeRemote(Option<HttpCartAccessor>);

impl MaybeRemote {
    const fn is_configured(&self) -> bool {
        self.0.is_some()
    }
}

impl RemoteCartAccessor for MaybeRemote {
    async fn fetch(&self) -> Result<Cart, RemoteError> {
        match &self.0 {
            Some(http) => http.fetch().await,
            None => Err(RemoteError::Unavailable("not configured".to_string())),
        }
    }

    async fn replace(&self, cart: &Cart) -> Result<Cart, RemoteError> {
        match &self.0 {
            Some(http) => http.replace(cart).await,
            None => Err(RemoteError::Unavailable("not configured".to_string())),
        }
    }
}

/// The coordinator type every command works on.
pub type Coordinator = CartCoordinator<FileStore, MaybeRemote>;

/// Build the coordinator described by `config`.
///
/// A configured remote means the caller holds a bearer token, so the session
/// starts signed in.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub fn open(config: &CartConfig) -> Result<Coordinator, CommandError> {
    let guest = GuestCart::load(FileStore::new(&config.store_dir));
    let remote = match &config.remote {
        Some(remote) => MaybeRemote(Some(HttpCartAccessor::new(remote)?)),
        None => MaybeRemote(None),
    };
    let signed_in = remote.is_configured();

    let mut coordinator =
        CartCoordinator::new(guest, RemoteCart::new(remote), config.invariant_policy);
    if signed_in {
        coordinator.set_auth_state(AuthState::authenticated(UserDescriptor::default()));
    }
    Ok(coordinator)
}

/// Fail unless the coordinator has a remote service behind it.
fn require_remote(cart: &Coordinator) -> Result<(), CommandError> {
    if cart.remote().accessor().is_configured() {
        Ok(())
    } else {
        Err(CommandError::RemoteNotConfigured)
    }
}

/// Format a snapshot as text or JSON.
fn render(snapshot: &CartSnapshot, json: bool) -> Result<String, CommandError> {
    if json {
        let value = serde_json::json!({
            "cart": snapshot.cart,
            "totalQuantity": snapshot.total_quantity,
            "isLoading": snapshot.is_loading,
            "isFetching": snapshot.is_fetching,
            "isError": snapshot.is_error,
            "source": snapshot.source,
        });
        return Ok(serde_json::to_string_pretty(&value)?);
    }

    if snapshot.cart.is_empty() {
        return Ok("Cart is empty".to_string());
    }

    let mut out = String::new();
    for line in &snapshot.cart {
        let label = line.product.name().unwrap_or_else(|| line.product_id().as_str());
        out.push_str(&format!(
            "{:>5} x {label} ({})\n",
            line.quantity.get(),
            line.product_id()
        ));
    }
    out.push_str(&format!("Total quantity: {}", snapshot.total_quantity));
    if snapshot.is_error {
        out.push_str("\n(server unreachable, showing last known cart)");
    }
    Ok(out)
}

/// Write `text` to stdout followed by a newline.
fn emit(text: &str) -> Result<(), CommandError> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{text}")?;
    Ok(())
}
