//! Cart configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `CARTSYNC_STORE_DIR` - Directory for the guest cart file (default: `.cartsync`)
//! - `CARTSYNC_REMOTE_URL` - Base URL of the remote cart service
//! - `CARTSYNC_REMOTE_TOKEN` - Bearer token for the remote cart service
//!   (required when `CARTSYNC_REMOTE_URL` is set)
//! - `CARTSYNC_REQUEST_TIMEOUT_SECS` - Remote request timeout (default: 10)
//! - `CARTSYNC_INVARIANT_POLICY` - `strict` or `coalesce` (default: `strict`
//!   in debug builds, `coalesce` in release builds)

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::coordinator::InvariantPolicy;

const DEFAULT_STORE_DIR: &str = ".cartsync";
const DEFAULT_TIMEOUT_SECS: &str = "10";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart configuration.
#[derive(Debug, Clone)]
pub struct CartConfig {
    /// Directory holding the guest cart file
    pub store_dir: PathBuf,
    /// Remote cart service, if configured
    pub remote: Option<RemoteConfig>,
    /// How `replace` treats duplicate products
    pub invariant_policy: InvariantPolicy,
}

/// Remote cart service configuration.
///
/// Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct RemoteConfig {
    /// Base URL; the cart lives at `{base_url}/cart`
    pub base_url: Url,
    /// Bearer token for the signed-in user
    pub token: SecretString,
    /// Per-request timeout
    pub timeout: Duration,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for CartConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            remote: None,
            invariant_policy: InvariantPolicy::default(),
        }
    }
}

impl CartConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid, or if the
    /// remote URL is set without a token.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let store_dir = PathBuf::from(
            lookup("CARTSYNC_STORE_DIR").unwrap_or_else(|| DEFAULT_STORE_DIR.to_string()),
        );

        let invariant_policy = match lookup("CARTSYNC_INVARIANT_POLICY") {
            Some(raw) => raw.parse::<InvariantPolicy>().map_err(|e| {
                ConfigError::InvalidEnvVar("CARTSYNC_INVARIANT_POLICY".to_string(), e)
            })?,
            None => InvariantPolicy::default(),
        };

        let remote = match lookup("CARTSYNC_REMOTE_URL") {
            Some(raw) => Some(RemoteConfig::from_lookup(&raw, &lookup)?),
            None => None,
        };

        Ok(Self {
            store_dir,
            remote,
            invariant_policy,
        })
    }
}

impl RemoteConfig {
    fn from_lookup<F>(raw_url: &str, lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = Url::parse(raw_url).map_err(|e| {
            ConfigError::InvalidEnvVar("CARTSYNC_REMOTE_URL".to_string(), e.to_string())
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEnvVar(
                "CARTSYNC_REMOTE_URL".to_string(),
                format!("unsupported scheme: {}", base_url.scheme()),
            ));
        }

        let token = lookup("CARTSYNC_REMOTE_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("CARTSYNC_REMOTE_TOKEN".to_string()))?;

        let timeout_secs = lookup("CARTSYNC_REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|| DEFAULT_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar(
                    "CARTSYNC_REQUEST_TIMEOUT_SECS".to_string(),
                    e.to_string(),
                )
            })?;

        Ok(Self {
            base_url,
            token,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CartConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.store_dir, PathBuf::from(".cartsync"));
        assert!(config.remote.is_none());
        assert_eq!(config.invariant_policy, InvariantPolicy::default());
    }

    #[test]
    fn test_remote_config() {
        let config = CartConfig::from_lookup(lookup(&[
            ("CARTSYNC_REMOTE_URL", "https://carts.example.test/api"),
            ("CARTSYNC_REMOTE_TOKEN", "tok_123"),
            ("CARTSYNC_REQUEST_TIMEOUT_SECS", "3"),
            ("CARTSYNC_INVARIANT_POLICY", "coalesce"),
        ]))
        .unwrap();

        let remote = config.remote.unwrap();
        assert_eq!(remote.base_url.as_str(), "https://carts.example.test/api");
        assert_eq!(remote.token.expose_secret(), "tok_123");
        assert_eq!(remote.timeout, Duration::from_secs(3));
        assert_eq!(config.invariant_policy, InvariantPolicy::Coalesce);
    }

    #[test]
    fn test_remote_url_without_token_is_rejected() {
        let err = CartConfig::from_lookup(lookup(&[(
            "CARTSYNC_REMOTE_URL",
            "https://carts.example.test",
        )]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "CARTSYNC_REMOTE_TOKEN"));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = CartConfig::from_lookup(lookup(&[("CARTSYNC_REMOTE_URL", "not a url")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref k, _) if k == "CARTSYNC_REMOTE_URL"));

        let err = CartConfig::from_lookup(lookup(&[
            ("CARTSYNC_REMOTE_URL", "ftp://carts.example.test"),
            ("CARTSYNC_REMOTE_TOKEN", "tok"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(..)));

        let err = CartConfig::from_lookup(lookup(&[("CARTSYNC_INVARIANT_POLICY", "lenient")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref k, _) if k == "CARTSYNC_INVARIANT_POLICY"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = CartConfig::from_lookup(lookup(&[
            ("CARTSYNC_REMOTE_URL", "https://carts.example.test"),
            ("CARTSYNC_REMOTE_TOKEN", "very-secret-token"),
        ]))
        .unwrap();
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("very-secret-token"));
    }
}
