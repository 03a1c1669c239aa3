//! Live stock level updates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ProductId;

/// Hub method the server invokes for every stock change.
pub const STOCK_UPDATE_TARGET: &str = "ReceiveStockUpdate";

/// Hub frames end with this record separator.
const RECORD_SEPARATOR: char = '\u{1e}';

/// Hub message type for a method invocation.
const INVOCATION: u8 = 1;

/// Errors decoding a pushed stock message.
#[derive(Debug, Error)]
pub enum StockMessageError {
    /// Payload is not valid JSON or not an object.
    #[error("Malformed hub message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// `ReceiveStockUpdate` did not carry `[productId, stock]`.
    #[error("Invalid stock update arguments: {0}")]
    InvalidArguments(String),
}

/// One pushed stock level for a product.
///
/// A later update for the same product supersedes an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockUpdate {
    /// Product whose stock changed.
    pub product_id: ProductId,
    /// Units currently in stock.
    pub stock_quantity: i32,
}

#[derive(Debug, Deserialize)]
struct HubMessage {
    #[serde(rename = "type", default)]
    kind: Option<u8>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    arguments: Vec<serde_json::Value>,
}

impl StockUpdate {
    /// Create a stock update.
    #[must_use]
    pub const fn new(product_id: ProductId, stock_quantity: i32) -> Self {
        Self {
            product_id,
            stock_quantity,
        }
    }

    /// Decode one push-channel frame.
    ///
    /// Returns `Ok(None)` for pings and for invocations of other hub methods.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not JSON, or if a
    /// `ReceiveStockUpdate` invocation does not carry two integer arguments.
    pub fn from_hub_message(frame: &str) -> Result<Option<Self>, StockMessageError> {
        let frame = frame.trim().trim_end_matches(RECORD_SEPARATOR).trim();
        let message: HubMessage = serde_json::from_str(frame)?;

        if message.kind.is_some_and(|k| k != INVOCATION)
            || message.target.as_deref() != Some(STOCK_UPDATE_TARGET)
        {
            return Ok(None);
        }

        let [product_id, stock] = message.arguments.as_slice() else {
            return Err(StockMessageError::InvalidArguments(format!(
                "expected 2 arguments, got {}",
                message.arguments.len()
            )));
        };

        let product_id = as_i32(product_id).ok_or_else(|| {
            StockMessageError::InvalidArguments(format!("product id {product_id}"))
        })?;
        let stock = as_i32(stock)
            .ok_or_else(|| StockMessageError::InvalidArguments(format!("stock {stock}")))?;

        Ok(Some(Self::new(ProductId::new(product_id), stock)))
    }
}

fn as_i32(value: &serde_json::Value) -> Option<i32> {
    value.as_i64().and_then(|v| i32::try_from(v).ok())
}
