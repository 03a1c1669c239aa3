//! REST implementation of [`CartApi`].

use std::sync::Arc;

use basket_core::{CartLineInput, ProductId};
use reqwest::StatusCode;
use tracing::{debug, instrument};

use super::{CartApi, RemoteCart, RemoteError, SyncRequest};
use crate::auth::AuthToken;
use crate::config::CartApiConfig;

/// Longest slice of an error body kept in a [`RemoteError::Api`] message.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Client for the server cart API.
///
/// Cheap to clone. The bearer token is read from the shared [`AuthToken`] on
/// every request, so signing in or out never requires a new client.
#[derive(Clone)]
pub struct HttpCartClient {
    inner: Arc<HttpCartClientInner>,
}

struct HttpCartClientInner {
    client: reqwest::Client,
    config: CartApiConfig,
    token: AuthToken,
}

impl HttpCartClient {
    /// Create a new cart API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: CartApiConfig, token: AuthToken) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpCartClientInner {
                client,
                config,
                token,
            }),
        })
    }

    /// Attach the bearer token (if any) and send.
    ///
    /// Connection and timeout failures surface as [`RemoteError::Unavailable`].
    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, RemoteError> {
        let request = match self.inner.token.header_value() {
            Some(value) => request.header(reqwest::header::AUTHORIZATION, value),
            None => request,
        };

        let response = request
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    RemoteError::Unavailable(e.to_string())
                } else {
                    RemoteError::Http(e)
                }
            })?;
        debug!(status = %response.status(), url = %response.url(), "Cart API response");
        Ok(response)
    }

    /// Map a non-success response to an error, pass success through.
    async fn expect_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, RemoteError> {
        if response.status().is_success() {
            return Ok(response);
        }
        Err(parse_error(response).await)
    }
}

impl CartApi for HttpCartClient {
    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<RemoteCart, RemoteError> {
        let url = self.inner.config.endpoint("");
        let response = self.send(self.inner.client.get(&url)).await?;

        // No cart created server-side yet
        if response.status() == StatusCode::NOT_FOUND {
            debug!("Server has no cart yet");
            return Ok(RemoteCart::default());
        }

        let response = Self::expect_success(response).await?;
        let body = response.text().await?;
        let trimmed = body.trim();
        if trimmed.is_empty() || trimmed == "null" {
            return Ok(RemoteCart::default());
        }

        serde_json::from_str(trimmed)
            .map_err(|e| RemoteError::Parse(format!("Failed to parse cart: {e}")))
    }

    #[instrument(skip(self), fields(product_id = %line.product_id, quantity = line.quantity))]
    async fn add(&self, line: CartLineInput) -> Result<(), RemoteError> {
        let url = self.inner.config.endpoint("");
        let response = self.send(self.inner.client.post(&url).json(&line)).await?;
        Self::expect_success(response).await.map(drop)
    }

    #[instrument(skip(self), fields(product_id = %line.product_id, quantity = line.quantity))]
    async fn set_quantity(&self, line: CartLineInput) -> Result<(), RemoteError> {
        let url = self.inner.config.endpoint("/items");
        let response = self.send(self.inner.client.put(&url).json(&line)).await?;
        Self::expect_success(response).await.map(drop)
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn remove(&self, product_id: ProductId) -> Result<(), RemoteError> {
        let url = self.inner.config.endpoint(&format!("/{product_id}"));
        let response = self.send(self.inner.client.delete(&url)).await?;

        // Line already gone
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Self::expect_success(response).await.map(drop)
    }

    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    async fn sync_guest_items(&self, lines: Vec<CartLineInput>) -> Result<(), RemoteError> {
        let url = self.inner.config.endpoint("/sync");
        let body = SyncRequest { items: lines };
        let response = self.send(self.inner.client.post(&url).json(&body)).await?;
        Self::expect_success(response).await.map(drop)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<(), RemoteError> {
        let url = self.inner.config.endpoint("");
        let response = self.send(self.inner.client.delete(&url)).await?;
        Self::expect_success(response).await.map(drop)
    }
}

/// Parse an error response from the cart API.
async fn parse_error(response: reqwest::Response) -> RemoteError {
    let status = response.status().as_u16();

    if status == 429 {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);
        return RemoteError::RateLimited(retry_after);
    }

    if status == 401 || status == 403 {
        return RemoteError::Unauthorized;
    }

    let body = response.text().await.unwrap_or_default();
    let message = extract_error_message(&body).unwrap_or_else(|| format!("HTTP {status}"));

    if status == 404 {
        return RemoteError::NotFound(message);
    }

    RemoteError::Api { status, message }
}

/// Pull a human-readable message out of an error body.
///
/// Accepts JSON objects with a `message`, `error`, `title` or `detail`
/// string field, a bare JSON string, or plain text.
fn extract_error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    let message = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => ["message", "error", "title", "detail"]
            .iter()
            .find_map(|key| map.get(*key).and_then(serde_json::Value::as_str))
            .map_or_else(|| body.to_string(), str::to_string),
        Ok(serde_json::Value::String(s)) => s,
        _ => body.to_string(),
    };

    Some(message.chars().take(MAX_ERROR_BODY_CHARS).collect())
}

impl std::fmt::Debug for HttpCartClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCartClient")
            .field("base_url", &self.inner.config.base_url.as_str())
            .field("authenticated", &self.inner.token.is_set())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_error_message_json_fields() {
        assert_eq!(
            extract_error_message(r#"{"message":"Insufficient stock"}"#).as_deref(),
            Some("Insufficient stock")
        );
        assert_eq!(
            extract_error_message(r#"{"title":"Not Found","status":404}"#).as_deref(),
            Some("Not Found")
        );
        assert_eq!(
            extract_error_message(r#""Product not found""#).as_deref(),
            Some("Product not found")
        );
    }

    #[test]
    fn test_extract_error_message_plain_text() {
        assert_eq!(
            extract_error_message("  User not logged in \n").as_deref(),
            Some("User not logged in")
        );
        assert_eq!(extract_error_message("   "), None);
    }

    #[test]
    fn test_extract_error_message_truncates() {
        let long = "x".repeat(500);
        let message = extract_error_message(&long).unwrap();
        assert_eq!(message.len(), MAX_ERROR_BODY_CHARS);
    }

    #[test]
    fn test_debug_hides_token() {
        let token = AuthToken::default();
        token.set(secrecy::SecretString::from("secret-token-value"));
        let config = CartApiConfig::new("https://shop.test/api").unwrap();
        let client = HttpCartClient::new(config, token).unwrap();

        let debug = format!("{client:?}");
        assert!(debug.contains("shop.test"));
        assert!(!debug.contains("secret-token-value"));
    }
}
