//! Live stock levels fed by the push channel.
//!
//! The transport (a hub connection, a poller, a test) is anything that yields
//! [`StockUpdate`]s. [`StockListener`] drains it into [`StockLevels`], which
//! the engine consults when validating guest-path mutations. Stock never
//! mutates the cart.

use std::collections::HashMap;
use std::sync::Arc;

use basket_core::{ProductId, StockUpdate};
use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tracing::{debug, info};

/// Latest known stock per product.
pub type StockSnapshot = Arc<HashMap<ProductId, i32>>;

/// Shared, observable stock table. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StockLevels {
    tx: Arc<watch::Sender<StockSnapshot>>,
}

impl StockLevels {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(StockSnapshot::default());
        Self { tx: Arc::new(tx) }
    }

    /// Record `update`, superseding any earlier value for the product.
    pub fn apply(&self, update: StockUpdate) {
        self.tx.send_modify(|snapshot| {
            Arc::make_mut(snapshot).insert(update.product_id, update.stock_quantity);
        });
    }

    /// Last known stock for `product_id`.
    #[must_use]
    pub fn get(&self, product_id: ProductId) -> Option<i32> {
        self.tx.borrow().get(&product_id).copied()
    }

    /// Current table.
    #[must_use]
    pub fn snapshot(&self) -> StockSnapshot {
        Arc::clone(&self.tx.borrow())
    }

    /// Observe table changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StockSnapshot> {
        self.tx.subscribe()
    }
}

impl Default for StockLevels {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies a stream of stock updates to a [`StockLevels`] table.
#[derive(Debug, Clone)]
pub struct StockListener {
    levels: StockLevels,
}

impl StockListener {
    #[must_use]
    pub const fn new(levels: StockLevels) -> Self {
        Self { levels }
    }

    /// Consume `updates` until the stream ends. Returns how many were applied.
    pub async fn run<S>(&self, updates: S) -> usize
    where
        S: Stream<Item = StockUpdate> + Send,
    {
        let mut updates = std::pin::pin!(updates);
        let mut applied = 0_usize;

        while let Some(update) = updates.next().await {
            debug!(
                product_id = %update.product_id,
                stock = update.stock_quantity,
                "Stock update"
            );
            self.levels.apply(update);
            applied += 1;
        }

        info!(applied, "Stock feed ended");
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_later_update_supersedes() {
        let levels = StockLevels::new();
        levels.apply(StockUpdate::new(ProductId::new(1), 5));
        levels.apply(StockUpdate::new(ProductId::new(2), 8));
        levels.apply(StockUpdate::new(ProductId::new(1), 0));

        assert_eq!(levels.get(ProductId::new(1)), Some(0));
        assert_eq!(levels.get(ProductId::new(2)), Some(8));
        assert_eq!(levels.get(ProductId::new(3)), None);
    }

    #[test]
    fn test_snapshot_is_immutable() {
        let levels = StockLevels::new();
        levels.apply(StockUpdate::new(ProductId::new(1), 5));
        let before = levels.snapshot();

        levels.apply(StockUpdate::new(ProductId::new(1), 2));

        assert_eq!(before.get(&ProductId::new(1)), Some(&5));
        assert_eq!(levels.snapshot().get(&ProductId::new(1)), Some(&2));
    }

    #[tokio::test]
    async fn test_listener_drains_stream() {
        let levels = StockLevels::new();
        let mut rx = levels.subscribe();
        let listener = StockListener::new(levels.clone());

        let feed = futures::stream::iter(vec![
            StockUpdate::new(ProductId::new(4), 10),
            StockUpdate::new(ProductId::new(4), 7),
            StockUpdate::new(ProductId::new(5), 1),
        ]);

        assert_eq!(listener.run(feed).await, 3);
        assert!(rx.has_changed().unwrap_or(false));
        assert_eq!(rx.borrow_and_update().get(&ProductId::new(4)), Some(&7));
        assert_eq!(levels.get(ProductId::new(5)), Some(1));
    }
}
