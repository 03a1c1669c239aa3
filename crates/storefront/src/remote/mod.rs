//! Server cart API contract.
//!
//! # Architecture
//!
//! - [`CartApi`] is the request/response seam the engine talks to; it holds
//!   no cart state of its own
//! - [`HttpCartClient`] implements it with `reqwest` against the REST cart API
//! - The server is the source of truth for the authenticated cart, so every
//!   mutation is followed by a fresh [`CartApi::fetch`]
//!
//! # Endpoints
//!
//! | Call | Request |
//! |---|---|
//! | `fetch` | `GET /cart` (404 means "no cart yet") |
//! | `add` | `POST /cart` `{productId, quantity}` (upsert, additive) |
//! | `set_quantity` | `PUT /cart/items` `{productId, quantity}` (absolute) |
//! | `remove` | `DELETE /cart/{productId}` |
//! | `clear` | `DELETE /cart` |
//! | `sync_guest_items` | `POST /cart/sync` `{items: [{productId, quantity}]}` |

mod http;
#[cfg(any(test, feature = "test-util"))]
mod memory;

pub use http::HttpCartClient;
#[cfg(any(test, feature = "test-util"))]
pub use memory::{CartOp, MemoryCartApi};

use std::future::Future;

use basket_core::{Cart, CartItem, CartLineInput, ProductId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Errors that can occur when talking to the cart API.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or rejected bearer token.
    #[error("Unauthorized")]
    Unauthorized,

    /// Rate limited by the API.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The cart service could not be reached.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl RemoteError {
    /// Message the server put in its error body, if any.
    #[must_use]
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Api { message, .. } | Self::NotFound(message) => Some(message),
            Self::Unauthorized => Some("unauthorized"),
            _ => None,
        }
    }
}

/// Cart as returned by `GET /cart`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCart {
    /// Server cart lines.
    #[serde(default)]
    pub items: Vec<CartItem>,
    /// Unit count computed by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_count: Option<u32>,
    /// Total computed by the server.
    #[serde(default)]
    pub total_amount: Decimal,
}

impl RemoteCart {
    /// Build the canonical [`Cart`] snapshot.
    ///
    /// Counts and totals are re-derived from the lines; a disagreement with
    /// the server's own figures is logged, since the lines are what the
    /// shopper sees.
    #[must_use]
    pub fn into_cart(self) -> Cart {
        let reported_total = self.total_amount;
        let reported_count = self.items_count;
        let cart = Cart::from_items(self.items);

        if reported_total != cart.total_amount()
            || reported_count.is_some_and(|c| c != cart.items_count())
        {
            warn!(
                reported_total = %reported_total,
                derived_total = %cart.total_amount(),
                reported_count = ?reported_count,
                derived_count = cart.items_count(),
                "Server cart totals disagree with its lines"
            );
        }

        cart
    }
}

impl From<&Cart> for RemoteCart {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.items().to_vec(),
            items_count: Some(cart.items_count()),
            total_amount: cart.total_amount(),
        }
    }
}

/// Body of `POST /cart/sync`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Guest lines to merge into the server cart.
    pub items: Vec<CartLineInput>,
}

/// Request/response contract of the server cart.
///
/// Every call may fail with a [`RemoteError`]; callers decide how to surface
/// it. `fetch` reports a cart that does not exist yet as empty.
pub trait CartApi: Send + Sync {
    /// Load the current server cart.
    fn fetch(&self) -> impl Future<Output = Result<RemoteCart, RemoteError>> + Send;

    /// Add `line.quantity` units (upsert: the server adds to any existing line).
    fn add(&self, line: CartLineInput) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Set the line to exactly `line.quantity` units.
    fn set_quantity(
        &self,
        line: CartLineInput,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Remove one line. Removing a line the server does not have succeeds.
    fn remove(&self, product_id: ProductId)
    -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Merge guest lines into the server cart in one batch.
    fn sync_guest_items(
        &self,
        lines: Vec<CartLineInput>,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Remove every line.
    fn clear(&self) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_cart_parses_server_payload() {
        let json = r#"{
            "items": [{"productId": 1, "productName": "Tea", "unitPrice": 12.5, "quantity": 2}],
            "itemsCount": 2,
            "totalAmount": 25.0
        }"#;
        let remote: RemoteCart = serde_json::from_str(json).unwrap();
        let cart = remote.into_cart();

        assert_eq!(cart.items_count(), 2);
        assert_eq!(cart.total_amount(), Decimal::from(25));
    }

    #[test]
    fn test_remote_cart_missing_fields_default() {
        let remote: RemoteCart = serde_json::from_str("{}").unwrap();
        assert!(remote.items.is_empty());
        assert_eq!(remote.total_amount, Decimal::ZERO);
        assert!(remote.into_cart().is_empty());
    }

    #[test]
    fn test_remote_cart_totals_are_rederived() {
        let json = r#"{
            "items": [{"productId": 1, "productName": "Tea", "unitPrice": 10, "quantity": 3}],
            "totalAmount": 999
        }"#;
        let cart = serde_json::from_str::<RemoteCart>(json).unwrap().into_cart();
        assert_eq!(cart.total_amount(), Decimal::from(30));
    }

    #[test]
    fn test_sync_request_shape() {
        let body = SyncRequest {
            items: vec![CartLineInput {
                product_id: ProductId::new(1),
                quantity: 5,
            }],
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"items":[{"productId":1,"quantity":5}]}"#
        );
    }

    #[test]
    fn test_server_message() {
        let err = RemoteError::Api {
            status: 400,
            message: "Insufficient stock for product 3".to_string(),
        };
        assert_eq!(err.server_message(), Some("Insufficient stock for product 3"));
        assert_eq!(RemoteError::RateLimited(5).server_message(), None);
        assert_eq!(
            RemoteError::RateLimited(5).to_string(),
            "Rate limited, retry after 5 seconds"
        );
    }
}
