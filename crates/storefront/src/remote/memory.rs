//! In-memory [`CartApi`] for tests.
//!
//! Behaves like the REST cart: `add` is an additive upsert, `set_quantity`
//! is absolute, `sync_guest_items` adds every guest line. Products must be
//! registered so the server can fill in names and prices, and a registered
//! stock level is enforced the way the real server enforces it.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use basket_core::{Cart, CartItem, CartLineInput, Product, ProductId};

use super::{CartApi, RemoteCart, RemoteError};

/// Cart API operation, used for failure injection and call logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartOp {
    Fetch,
    Add,
    SetQuantity,
    Remove,
    Sync,
    Clear,
}

#[derive(Debug, Default)]
struct State {
    catalog: HashMap<ProductId, Product>,
    items: Vec<CartItem>,
    failing: HashSet<CartOp>,
    calls: Vec<CartOp>,
    latency: Option<Duration>,
}

/// Server cart held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryCartApi {
    state: Arc<Mutex<State>>,
}

impl MemoryCartApi {
    /// Create an empty server cart with an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not hide the state from the others
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register a catalog product.
    #[must_use]
    pub fn with_product(self, product: Product) -> Self {
        self.state().catalog.insert(product.id, product);
        self
    }

    /// Replace the server cart lines.
    pub fn seed(&self, items: Vec<CartItem>) {
        self.state().items = Cart::from_items(items).into_items();
    }

    /// Current server cart.
    #[must_use]
    pub fn cart(&self) -> Cart {
        Cart::from_items(self.state().items.clone())
    }

    /// Make every later `op` call fail until [`Self::recover`].
    pub fn fail(&self, op: CartOp) {
        self.state().failing.insert(op);
    }

    /// Stop failing `op`.
    pub fn recover(&self, op: CartOp) {
        self.state().failing.remove(&op);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = Some(latency);
    }

    /// Every call received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<CartOp> {
        self.state().calls.clone()
    }

    /// Number of calls received for `op`.
    #[must_use]
    pub fn call_count(&self, op: CartOp) -> usize {
        self.state().calls.iter().filter(|c| **c == op).count()
    }

    async fn begin(&self, op: CartOp) -> Result<(), RemoteError> {
        let latency = {
            let mut state = self.state();
            state.calls.push(op);
            state.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.state().failing.contains(&op) {
            return Err(RemoteError::Unavailable(format!("{op:?} failed")));
        }
        Ok(())
    }

    /// Apply an upsert or absolute set, enforcing catalog and stock.
    fn apply(&self, line: CartLineInput, additive: bool) -> Result<(), RemoteError> {
        let mut state = self.state();
        let product = state
            .catalog
            .get(&line.product_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound("Product not found".to_string()))?;

        let current = state
            .items
            .iter()
            .find(|i| i.product_id == line.product_id)
            .map_or(0, |i| i.quantity);
        let target = if additive {
            current.saturating_add(line.quantity)
        } else {
            line.quantity
        };

        if let Some(stock) = product.stock_quantity
            && target > stock
        {
            return Err(RemoteError::Api {
                status: 400,
                message: format!("Insufficient stock for product {}", product.id),
            });
        }

        let cart = Cart::from_items(std::mem::take(&mut state.items));
        let updated = if cart.line(product.id).is_some() {
            cart.with_quantity(product.id, target)
        } else {
            cart.with_added(&product, target)
        };
        state.items = updated.into_items();
        Ok(())
    }
}

impl CartApi for MemoryCartApi {
    async fn fetch(&self) -> Result<RemoteCart, RemoteError> {
        self.begin(CartOp::Fetch).await?;
        Ok(RemoteCart::from(&self.cart()))
    }

    async fn add(&self, line: CartLineInput) -> Result<(), RemoteError> {
        self.begin(CartOp::Add).await?;
        self.apply(line, true)
    }

    async fn set_quantity(&self, line: CartLineInput) -> Result<(), RemoteError> {
        self.begin(CartOp::SetQuantity).await?;
        self.apply(line, false)
    }

    async fn remove(&self, product_id: ProductId) -> Result<(), RemoteError> {
        self.begin(CartOp::Remove).await?;
        self.state().items.retain(|i| i.product_id != product_id);
        Ok(())
    }

    async fn sync_guest_items(&self, lines: Vec<CartLineInput>) -> Result<(), RemoteError> {
        self.begin(CartOp::Sync).await?;
        for line in lines {
            self.apply(line, true)?;
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), RemoteError> {
        self.begin(CartOp::Clear).await?;
        self.state().items.clear();
        Ok(())
    }
}
