//! JSON/HTTP remote cart accessor.
//!
//! Talks to a cart service exposing:
//! - `GET {base}/cart` - returns `{"items": [...]}`
//! - `PUT {base}/cart` - body `{"items": [...]}`, returns the stored cart

use std::sync::Arc;

use cartsync_core::Cart;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument};
use url::Url;

use super::{CartPayload, RemoteCartAccessor, RemoteError};
use crate::config::RemoteConfig;

/// Maximum number of response body characters kept in errors and logs.
const BODY_SNIPPET_LEN: usize = 200;

/// Remote cart accessor over HTTP.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct HttpCartAccessor {
    inner: Arc<HttpCartAccessorInner>,
}

struct HttpCartAccessorInner {
    client: reqwest::Client,
    endpoint: Url,
    token: SecretString,
}

impl std::fmt::Debug for HttpCartAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCartAccessor")
            .field("endpoint", &self.inner.endpoint.as_str())
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl HttpCartAccessor {
    /// Create an accessor for the service described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Http` if the HTTP client cannot be built, or
    /// `RemoteError::Unavailable` if the cart endpoint URL cannot be formed.
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpCartAccessorInner {
                client,
                endpoint: cart_endpoint(&config.base_url)?,
                token: config.token.clone(),
            }),
        })
    }

    /// The cart endpoint URL.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }

    /// Send a request and decode a [`CartPayload`] from the response.
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<Cart, RemoteError> {
        let response = request
            .bearer_auth(self.inner.token.expose_secret())
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(RemoteError::Unauthorized);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(RemoteError::RateLimited(retry_after));
        }

        // Get response body as text first for better error diagnostics
        let response_text = response.text().await?;
        let snippet = || response_text.chars().take(BODY_SNIPPET_LEN).collect::<String>();

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %snippet(),
                "Remote cart service returned non-success status"
            );
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: snippet(),
            });
        }

        match serde_json::from_str::<CartPayload>(&response_text) {
            Ok(payload) => Ok(payload.items),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    body = %snippet(),
                    "Failed to parse remote cart response"
                );
                Err(RemoteError::Parse(e))
            }
        }
    }
}

/// Join `cart` onto the base URL, treating the base as a directory.
fn cart_endpoint(base: &Url) -> Result<Url, RemoteError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("cart")
        .map_err(|e| RemoteError::Unavailable(format!("invalid cart endpoint: {e}")))
}

impl RemoteCartAccessor for HttpCartAccessor {
    #[instrument(skip(self), fields(endpoint = %self.inner.endpoint))]
    async fn fetch(&self) -> Result<Cart, RemoteError> {
        let request = self.inner.client.get(self.inner.endpoint.clone());
        let cart = self.execute(request).await?;
        debug!(lines = cart.len(), "Fetched remote cart");
        Ok(cart)
    }

    #[instrument(skip(self, cart), fields(endpoint = %self.inner.endpoint, lines = cart.len()))]
    async fn replace(&self, cart: &Cart) -> Result<Cart, RemoteError> {
        let payload = CartPayload { items: cart.clone() };
        let request = self
            .inner
            .client
            .put(self.inner.endpoint.clone())
            .json(&payload);
        let stored = self.execute(request).await?;
        debug!(lines = stored.len(), "Replaced remote cart");
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn config(base: &str) -> RemoteConfig {
        RemoteConfig {
            base_url: Url::parse(base).unwrap(),
            token: SecretString::from("test-token".to_string()),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_cart_endpoint_with_and_without_trailing_slash() {
        let a = cart_endpoint(&Url::parse("https://api.example.test/v1").unwrap()).unwrap();
        let b = cart_endpoint(&Url::parse("https://api.example.test/v1/").unwrap()).unwrap();
        assert_eq!(a.as_str(), "https://api.example.test/v1/cart");
        assert_eq!(a, b);

        let root = cart_endpoint(&Url::parse("https://api.example.test").unwrap()).unwrap();
        assert_eq!(root.as_str(), "https://api.example.test/cart");
    }

    #[test]
    fn test_debug_redacts_token() {
        let accessor = HttpCartAccessor::new(&config("https://api.example.test/")).unwrap();
        let debug = format!("{accessor:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("test-token"));
    }

    #[test]
    fn test_payload_defaults_missing_items_to_empty() {
        let payload: CartPayload = serde_json::from_str("{}").unwrap();
        assert!(payload.items.is_empty());
    }
}
