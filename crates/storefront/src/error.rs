//! Cart operation errors with Sentry integration.
//!
//! Every engine operation returns `Result<(), CartError>`. Validation
//! failures are expected shopper mistakes; remote failures are system faults
//! and get captured to Sentry before being reported. Either way the shopper
//! only ever sees a [`MessageCatalog`] translation.

use basket_core::{MAX_CART_ITEMS, ProductId, QuantityError};
use thiserror::Error;

use crate::messages::{
    CAPACITY_KEY, INSUFFICIENT_STOCK_KEY, INVALID_QUANTITY_KEY, MessageCatalog,
};
use crate::remote::RemoteError;

/// A mutation rejected before any store was touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The cart would hold more than [`MAX_CART_ITEMS`] units.
    #[error("Cart limit exceeded: {requested} units requested, limit is {limit}")]
    CapacityExceeded { requested: u32, limit: u32 },

    /// Quantity was not a positive whole number.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Known stock is lower than the requested quantity.
    #[error("Insufficient stock for product {product_id}: {available} left, {requested} wanted")]
    InsufficientStock {
        product_id: ProductId,
        available: i32,
        requested: i32,
    },
}

impl ValidationError {
    /// Capacity error for a cart that would reach `requested` units.
    #[must_use]
    pub const fn capacity(requested: u32) -> Self {
        Self::CapacityExceeded {
            requested,
            limit: MAX_CART_ITEMS,
        }
    }

    const fn message_key(&self) -> &'static str {
        match self {
            Self::CapacityExceeded { .. } => CAPACITY_KEY,
            Self::InvalidQuantity(_) => INVALID_QUANTITY_KEY,
            Self::InsufficientStock { .. } => INSUFFICIENT_STOCK_KEY,
        }
    }
}

impl From<QuantityError> for ValidationError {
    fn from(err: QuantityError) -> Self {
        Self::InvalidQuantity(err.to_string())
    }
}

/// Failure of a cart operation.
#[derive(Debug, Error)]
pub enum CartError {
    /// Rejected by validation; nothing changed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The server cart call failed; nothing changed.
    #[error("Cart service error: {0}")]
    Remote(#[from] RemoteError),
}

impl CartError {
    /// Whether this is a validation rejection rather than a fault.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Localized text for the shopper.
    ///
    /// `fallback_key` names the operation-specific message used when the
    /// server message has no translation.
    #[must_use]
    pub fn user_message(&self, catalog: &MessageCatalog, fallback_key: &str) -> String {
        match self {
            Self::Validation(err) => catalog.text(err.message_key()),
            Self::Remote(err) => catalog.translate_or(err.server_message(), fallback_key),
        }
    }

    /// Record the error: remote faults go to Sentry and the error log,
    /// validation rejections only to debug.
    pub fn report(&self, operation: &str) {
        match self {
            Self::Validation(err) => {
                tracing::debug!(operation, error = %err, "Cart operation rejected");
            }
            Self::Remote(err) => {
                let event_id = sentry::capture_error(err);
                tracing::error!(
                    operation,
                    error = %err,
                    sentry_event_id = %event_id,
                    "Cart operation failed"
                );
            }
        }
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;

/// Add a breadcrumb for a cart action.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of cart
/// actions leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::messages::{ADD_FAILED_KEY, UPDATE_FAILED_KEY};

    #[test]
    fn test_validation_messages_are_translated() {
        let catalog = MessageCatalog::default();

        let err = CartError::from(ValidationError::capacity(150));
        assert!(err.is_validation());
        assert_eq!(
            err.user_message(&catalog, ADD_FAILED_KEY),
            "Koszyk może zawierać maksymalnie 100 sztuk produktów"
        );

        let err = CartError::from(ValidationError::InsufficientStock {
            product_id: ProductId::new(1),
            available: 2,
            requested: 5,
        });
        assert_eq!(
            err.user_message(&catalog, ADD_FAILED_KEY),
            "Niewystarczająca ilość produktu w magazynie"
        );
    }

    #[test]
    fn test_remote_message_uses_server_text() {
        let catalog = MessageCatalog::default();
        let err = CartError::from(RemoteError::Api {
            status: 400,
            message: "Insufficient stock for product 3".to_string(),
        });
        assert!(!err.is_validation());
        assert_eq!(
            err.user_message(&catalog, ADD_FAILED_KEY),
            "Niewystarczająca ilość produktu w magazynie"
        );
    }

    #[test]
    fn test_remote_message_never_leaks_technical_text() {
        let catalog = MessageCatalog::default();
        let err = CartError::from(RemoteError::Unavailable("connection refused".to_string()));
        assert_eq!(
            err.user_message(&catalog, UPDATE_FAILED_KEY),
            "Błąd podczas aktualizacji koszyka"
        );
    }

    #[test]
    fn test_quantity_error_converts() {
        let err: ValidationError = basket_core::Quantity::parse("abc").unwrap_err().into();
        assert!(matches!(err, ValidationError::InvalidQuantity(_)));
    }

    #[test]
    fn test_capacity_display() {
        assert_eq!(
            ValidationError::capacity(150).to_string(),
            "Cart limit exceeded: 150 units requested, limit is 100"
        );
    }

    #[test]
    fn test_report_without_sentry_client() {
        CartError::from(RemoteError::Unauthorized).report("add");
        CartError::from(ValidationError::InvalidQuantity("0".to_string())).report("add");
        add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "1")]));
    }
}
