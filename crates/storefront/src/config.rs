//! Cart engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BASKET_API_URL` - Base URL of the shop API (the cart lives at `{url}/cart`)
//!
//! ## Optional
//! - `BASKET_API_TOKEN` - Bearer token for authenticated cart calls
//! - `BASKET_STORAGE_DIR` - Directory for the guest cart (default: `.basket`)
//! - `BASKET_HTTP_TIMEOUT_SECS` - Request timeout in seconds (default: 10)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const DEFAULT_STORAGE_DIR: &str = ".basket";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart engine configuration.
#[derive(Debug, Clone)]
pub struct BasketConfig {
    /// Server cart API configuration
    pub api: CartApiConfig,
    /// Bearer token for the authenticated cart, if already signed in
    pub api_token: Option<SecretString>,
    /// Directory holding the guest cart
    pub storage_dir: PathBuf,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Server cart API configuration.
#[derive(Debug, Clone)]
pub struct CartApiConfig {
    /// Base URL of the shop API (without the `/cart` suffix)
    pub base_url: Url,
    /// Per-request timeout
    pub timeout: Duration,
}

impl BasketConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api = CartApiConfig::from_env()?;
        let api_token = api_token(get_optional_env("BASKET_API_TOKEN"));
        let storage_dir =
            PathBuf::from(get_env_or_default("BASKET_STORAGE_DIR", DEFAULT_STORAGE_DIR));

        Ok(Self {
            api,
            api_token,
            storage_dir,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

impl CartApiConfig {
    /// Create an API configuration with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an absolute http(s) URL.
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(base_url, "base_url")?,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    fn from_env() -> Result<Self, ConfigError> {
        let base_url = parse_base_url(&get_required_env("BASKET_API_URL")?, "BASKET_API_URL")?;
        let default_timeout = DEFAULT_TIMEOUT_SECS.to_string();
        let timeout_secs = get_env_or_default("BASKET_HTTP_TIMEOUT_SECS", &default_timeout)
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("BASKET_HTTP_TIMEOUT_SECS".to_string(), e.to_string())
            })?;

        Ok(Self {
            base_url,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// URL of a cart endpoint, e.g. `endpoint("/items")` for `{base}/cart/items`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/cart{path}", self.base_url.as_str().trim_end_matches('/'))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse and validate the API base URL.
fn parse_base_url(value: &str, var_name: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }

    Ok(url)
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// The server issues the token, so any non-blank value is taken as-is.
fn api_token(value: Option<String>) -> Option<SecretString> {
    value
        .filter(|token| !token.trim().is_empty())
        .map(SecretString::from)
}

/// Expose a token for the `Authorization` header.
pub(crate) fn bearer_value(token: &SecretString) -> String {
    format!("Bearer {}", token.expose_secret())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_api_token_accepts_any_issued_value() {
        let token = api_token(Some("todo-xxx-insert-aaaa".to_string())).unwrap();
        assert_eq!(token.expose_secret(), "todo-xxx-insert-aaaa");
    }

    #[test]
    fn test_api_token_blank_is_none() {
        assert!(api_token(None).is_none());
        assert!(api_token(Some("   ".to_string())).is_none());
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let config = CartApiConfig::new("https://shop.test/api").unwrap();
        assert_eq!(config.endpoint(""), "https://shop.test/api/cart");
        assert_eq!(config.endpoint("/items"), "https://shop.test/api/cart/items");

        let trailing = CartApiConfig::new("https://shop.test/api/").unwrap();
        assert_eq!(trailing.endpoint("/sync"), "https://shop.test/api/cart/sync");
    }

    #[test]
    fn test_base_url_rejects_other_schemes() {
        assert!(matches!(
            CartApiConfig::new("ftp://shop.test"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
        assert!(CartApiConfig::new("not a url").is_err());
    }

    #[test]
    fn test_bearer_value() {
        let token = SecretString::from("abc123");
        assert_eq!(bearer_value(&token), "Bearer abc123");
    }
}
