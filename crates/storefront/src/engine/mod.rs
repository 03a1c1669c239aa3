//! Cart reconciliation engine.
//!
//! # Architecture
//!
//! - One published [`Cart`] snapshot per session, replaced atomically through
//!   a `watch` channel after every confirmed mutation, merge or reload
//! - Two backing stores: the [`GuestStore`] while signed out, the server
//!   [`CartApi`] while signed in
//! - Signing in merges the guest cart into the server cart once
//!   ([`SessionState::Merging`]), then the server becomes authoritative
//! - Every mutation and auth transition holds a single-flight operation lock,
//!   so validation always sees the cart left by the previous operation
//!
//! A failed operation returns `Err`, emits an error [`Notice`] with the
//! translated message, and leaves the published cart untouched.


use std::future::Future;
use std::sync::Arc;

use basket_core::{
    Cart, CartItem, CartLineInput, LastAddedEvent, MAX_CART_ITEMS, Product, ProductId, Quantity,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{Result, ValidationError, add_breadcrumb};
use crate::guest::GuestStore;
use crate::messages::{ADD_FAILED_KEY, ADDED_KEY, MessageCatalog, UPDATE_FAILED_KEY};
use crate::notify::{Notice, Notifier};
use crate::remote::CartApi;
use crate::stock::StockLevels;

/// Which store currently backs the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Signed out; the cart lives in local storage.
    Guest,
    /// Signed in, guest lines being pushed to the server.
    Merging,
    /// Signed in; the server cart is authoritative.
    Authenticated,
}

/// Options for [`CartEngine::add_to_cart_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOptions {
    /// Publish a [`LastAddedEvent`] and a success notice.
    pub notify: bool,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self { notify: true }
    }
}

struct EngineInner<R> {
    guest: GuestStore,
    remote: R,
    cart: watch::Sender<Cart>,
    last_added: watch::Sender<Option<LastAddedEvent>>,
    session: watch::Sender<SessionState>,
    notifier: Notifier,
    op_lock: Mutex<()>,
}

/// Session-scoped cart engine. Cheap to clone; clones share one cart.
pub struct CartEngine<R> {
    inner: Arc<EngineInner<R>>,
    stock: Option<StockLevels>,
    messages: Arc<MessageCatalog>,
}

impl<R> Clone for CartEngine<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            stock: self.stock.clone(),
            messages: Arc::clone(&self.messages),
        }
    }
}

impl<R> std::fmt::Debug for CartEngine<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cart = self.inner.cart.borrow();
        f.debug_struct("CartEngine")
            .field("state", &*self.inner.session.borrow())
            .field("lines", &cart.items().len())
            .field("items_count", &cart.items_count())
            .finish_non_exhaustive()
    }
}

impl<R: CartApi> CartEngine<R> {
    /// Create an engine in the guest state with the stored guest cart loaded.
    pub fn new(guest: GuestStore, remote: R) -> Self {
        let initial = Cart::from_items(guest.read());
        debug!(items_count = initial.items_count(), "Loaded guest cart");

        let (cart, _) = watch::channel(initial);
        let (last_added, _) = watch::channel(None);
        let (session, _) = watch::channel(SessionState::Guest);

        Self {
            inner: Arc::new(EngineInner {
                guest,
                remote,
                cart,
                last_added,
                session,
                notifier: Notifier::new(),
                op_lock: Mutex::new(()),
            }),
            stock: None,
            messages: Arc::new(MessageCatalog::default()),
        }
    }

    /// Validate guest-path quantities against live stock levels.
    #[must_use]
    pub fn with_stock_levels(mut self, levels: StockLevels) -> Self {
        self.stock = Some(levels);
        self
    }

    /// Replace the message catalog used for notices.
    #[must_use]
    pub fn with_messages(mut self, messages: MessageCatalog) -> Self {
        self.messages = Arc::new(messages);
        self
    }

    // =========================================================================
    // Published state
    // =========================================================================

    /// Current cart snapshot.
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.inner.cart.borrow().clone()
    }

    /// Observe cart snapshots.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Cart> {
        self.inner.cart.subscribe()
    }

    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.inner.cart.borrow().items_count()
    }

    #[must_use]
    pub fn total_amount(&self) -> Decimal {
        self.inner.cart.borrow().total_amount()
    }

    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.inner.cart.borrow().items().to_vec()
    }

    /// Observe "just added" events.
    #[must_use]
    pub fn last_added(&self) -> watch::Receiver<Option<LastAddedEvent>> {
        self.inner.last_added.subscribe()
    }

    /// Consume the pending "just added" event, if any.
    pub fn take_last_added(&self) -> Option<LastAddedEvent> {
        self.inner.last_added.send_replace(None)
    }

    /// Subscribe to shopper notices.
    #[must_use]
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notifier.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.inner.session.borrow()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state() != SessionState::Guest
    }

    /// Message catalog used for notices and [`crate::error::CartError::user_message`].
    #[must_use]
    pub fn messages(&self) -> &MessageCatalog {
        &self.messages
    }

    // =========================================================================
    // Auth transitions
    // =========================================================================

    /// Apply an auth flag change.
    ///
    /// Signing in merges the guest cart into the server cart and loads the
    /// result; signing out switches back to the stored guest cart without a
    /// network call. A value equal to the current one is ignored. Never fails:
    /// merge problems are logged and the engine still ends up signed in.
    #[instrument(skip(self))]
    pub async fn on_auth_changed(&self, signed_in: bool) {
        let _guard = self.inner.op_lock.lock().await;

        match (signed_in, self.state()) {
            (true, SessionState::Guest) => {
                add_breadcrumb("auth", "Signed in", None);
                self.merge_locked().await;
            }
            (false, SessionState::Authenticated | SessionState::Merging) => {
                add_breadcrumb("auth", "Signed out", None);
                self.enter_guest_locked();
            }
            _ => debug!("Auth state unchanged"),
        }
    }

    /// Drive [`Self::on_auth_changed`] from an auth observer until its sender
    /// is dropped.
    pub fn watch_auth(&self, mut signed_in: watch::Receiver<bool>) -> JoinHandle<()>
    where
        R: 'static,
    {
        let engine = self.clone();
        tokio::spawn(async move {
            loop {
                let value = *signed_in.borrow_and_update();
                engine.on_auth_changed(value).await;
                if signed_in.changed().await.is_err() {
                    debug!("Auth observer closed");
                    break;
                }
            }
        })
    }

    /// Push the guest cart to the server, then load the server cart.
    async fn merge_locked(&self) {
        self.set_state(SessionState::Merging);

        let guest = Cart::from_items(self.inner.guest.read());
        if guest.is_empty() {
            debug!("No guest lines to merge");
        } else {
            let lines = guest.lines();
            let count = lines.len();
            match self.inner.remote.sync_guest_items(lines).await {
                Ok(()) => {
                    self.inner.guest.clear();
                    info!(lines = count, "Merged guest cart into server cart");
                }
                Err(e) => {
                    // Guest lines stay stored for the next attempt
                    warn!(error = %e, lines = count, "Guest cart sync failed");
                }
            }
        }

        let cart = match self.inner.remote.fetch().await {
            Ok(remote) => remote.into_cart(),
            Err(e) => {
                error!(error = %e, "Failed to load server cart after sign-in");
                Cart::empty()
            }
        };

        self.publish(cart);
        self.set_state(SessionState::Authenticated);
    }

    fn enter_guest_locked(&self) {
        self.set_state(SessionState::Guest);
        self.publish(Cart::from_items(self.inner.guest.read()));
        info!("Switched to guest cart");
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Add `quantity` units of `product` and announce it.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a non-positive quantity, a cart that
    /// would exceed [`MAX_CART_ITEMS`], or insufficient known stock (signed
    /// out), and a remote error if the server rejects the add (signed in).
    pub async fn add_to_cart(&self, product: &Product, quantity: i32) -> Result<()> {
        self.add_to_cart_with(product, quantity, AddOptions::default())
            .await
    }

    /// Add `quantity` units of `product`.
    ///
    /// # Errors
    ///
    /// See [`Self::add_to_cart`].
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add_to_cart_with(
        &self,
        product: &Product,
        quantity: i32,
        options: AddOptions,
    ) -> Result<()> {
        self.run("add", ADD_FAILED_KEY, async {
            self.add_locked(product, quantity).await?;

            if options.notify {
                self.inner
                    .last_added
                    .send_replace(Some(LastAddedEvent::now(product.clone(), quantity)));
                self.inner
                    .notifier
                    .send(Notice::success(self.messages.text(ADDED_KEY)));
            }
            Ok(())
        })
        .await
    }

    /// Set the line for `product_id` to exactly `quantity` units.
    ///
    /// Zero or less removes the line.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the cart would exceed
    /// [`MAX_CART_ITEMS`] or live stock is too low (signed out), and a remote
    /// error if the server rejects the change (signed in).
    #[instrument(skip(self))]
    pub async fn set_quantity(&self, product_id: ProductId, quantity: i32) -> Result<()> {
        self.run("set_quantity", UPDATE_FAILED_KEY, async {
            self.set_quantity_locked(product_id, quantity).await
        })
        .await
    }

    /// Set a quantity typed in by the shopper.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidQuantity`] if `input` is not a whole
    /// number, otherwise as [`Self::set_quantity`].
    #[instrument(skip(self))]
    pub async fn set_quantity_input(&self, product_id: ProductId, input: &str) -> Result<()> {
        self.run("set_quantity", UPDATE_FAILED_KEY, async {
            let quantity = Quantity::parse(input).map_err(ValidationError::from)?;
            self.set_quantity_locked(product_id, quantity.get()).await
        })
        .await
    }

    /// Change the line for `product_id` by `delta` units (may be negative).
    ///
    /// # Errors
    ///
    /// See [`Self::set_quantity`].
    #[instrument(skip(self))]
    pub async fn update_quantity(&self, product_id: ProductId, delta: i32) -> Result<()> {
        self.run("update_quantity", UPDATE_FAILED_KEY, async {
            let current = self.base_cart().quantity_of(product_id);
            self.set_quantity_locked(product_id, current.saturating_add(delta))
                .await
        })
        .await
    }

    /// Remove the line for `product_id`. Removing an absent line succeeds.
    ///
    /// # Errors
    ///
    /// Returns a remote error if the server rejects the removal (signed in).
    #[instrument(skip(self))]
    pub async fn remove_from_cart(&self, product_id: ProductId) -> Result<()> {
        self.run("remove", UPDATE_FAILED_KEY, async {
            self.remove_locked(product_id).await
        })
        .await
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns a remote error if the server rejects the clear (signed in).
    #[instrument(skip(self))]
    pub async fn clear_cart(&self) -> Result<()> {
        self.run("clear", UPDATE_FAILED_KEY, async {
            if self.is_authenticated() {
                self.inner.remote.clear().await?;
            } else {
                self.inner.guest.write(&[]);
            }
            self.publish(Cart::empty());
            Ok(())
        })
        .await
    }

    /// Re-run the sign-in merge.
    ///
    /// Signed out this only reloads the guest cart. Merge problems are logged,
    /// never returned.
    ///
    /// # Errors
    ///
    /// Currently always succeeds; the signature matches the other operations.
    #[instrument(skip(self))]
    pub async fn sync_cart(&self) -> Result<()> {
        self.run("sync", UPDATE_FAILED_KEY, async {
            if self.is_authenticated() {
                self.merge_locked().await;
            } else {
                self.publish(Cart::from_items(self.inner.guest.read()));
            }
            Ok(())
        })
        .await
    }

    /// Re-read the current backing store and publish it.
    ///
    /// # Errors
    ///
    /// Returns a remote error if the server cart cannot be loaded (signed in).
    #[instrument(skip(self))]
    pub async fn reload(&self) -> Result<()> {
        self.run("reload", UPDATE_FAILED_KEY, async {
            if self.is_authenticated() {
                self.refresh_remote().await
            } else {
                self.publish(Cart::from_items(self.inner.guest.read()));
                Ok(())
            }
        })
        .await
    }

    // =========================================================================
    // Internals (operation lock held)
    // =========================================================================

    /// Serialize `operation` behind the operation lock and surface failures.
    async fn run<F>(&self, operation: &'static str, fallback_key: &str, body: F) -> Result<()>
    where
        F: Future<Output = Result<()>>,
    {
        let _guard = self.inner.op_lock.lock().await;
        let result = body.await;

        if let Err(e) = &result {
            e.report(operation);
            self.inner
                .notifier
                .send(Notice::error(e.user_message(&self.messages, fallback_key)));
        }
        result
    }

    async fn add_locked(&self, product: &Product, quantity: i32) -> Result<()> {
        if quantity <= 0 {
            return Err(ValidationError::InvalidQuantity(quantity.to_string()).into());
        }

        let cart = self.base_cart();
        let requested = cart.items_count().saturating_add(quantity.unsigned_abs());
        if requested > MAX_CART_ITEMS {
            return Err(ValidationError::capacity(requested).into());
        }

        if self.is_authenticated() {
            self.inner
                .remote
                .add(CartLineInput {
                    product_id: product.id,
                    quantity,
                })
                .await?;
            return self.refresh_remote().await;
        }

        let known = self.live_stock(product.id).or(product.stock_quantity);
        check_stock(product.id, known, quantity)?;

        let updated = cart.with_added(product, quantity);
        self.inner.guest.write(updated.items());
        self.publish(updated);
        Ok(())
    }

    async fn set_quantity_locked(&self, product_id: ProductId, quantity: i32) -> Result<()> {
        let cart = self.base_cart();

        if quantity > 0 {
            let requested = cart
                .other_items_count(product_id)
                .saturating_add(quantity.unsigned_abs());
            if requested > MAX_CART_ITEMS {
                return Err(ValidationError::capacity(requested).into());
            }
        } else {
            return self.remove_locked(product_id).await;
        }

        if self.is_authenticated() {
            self.inner
                .remote
                .set_quantity(CartLineInput {
                    product_id,
                    quantity,
                })
                .await?;
            return self.refresh_remote().await;
        }

        check_stock(product_id, self.live_stock(product_id), quantity)?;

        if cart.line(product_id).is_none() {
            debug!("Line not in guest cart, nothing to set");
            return Ok(());
        }

        let updated = cart.with_quantity(product_id, quantity);
        self.inner.guest.write(updated.items());
        self.publish(updated);
        Ok(())
    }

    async fn remove_locked(&self, product_id: ProductId) -> Result<()> {
        if self.is_authenticated() {
            self.inner.remote.remove(product_id).await?;
            return self.refresh_remote().await;
        }

        let cart = self.base_cart();
        if cart.line(product_id).is_none() {
            debug!("Line not in guest cart, nothing to remove");
            return Ok(());
        }

        let updated = cart.without(product_id);
        self.inner.guest.write(updated.items());
        self.publish(updated);
        Ok(())
    }

    /// Cart a mutation starts from. Signed out, this is the stored guest
    /// cart so lines saved by another session survive the write; the
    /// published cart stands in when storage cannot be read.
    fn base_cart(&self) -> Cart {
        if self.is_authenticated() {
            return self.cart();
        }
        self.inner
            .guest
            .load()
            .map_or_else(|| self.cart(), Cart::from_items)
    }

    /// Load the server cart and publish it.
    async fn refresh_remote(&self) -> Result<()> {
        let cart = self.inner.remote.fetch().await?.into_cart();
        self.publish(cart);
        Ok(())
    }

    fn live_stock(&self, product_id: ProductId) -> Option<i32> {
        self.stock.as_ref().and_then(|levels| levels.get(product_id))
    }

    /// Replace the published cart; subscribers are only woken by a change.
    fn publish(&self, cart: Cart) {
        let items_count = cart.items_count();
        let changed = self.inner.cart.send_if_modified(|current| {
            if *current == cart {
                false
            } else {
                *current = cart;
                true
            }
        });
        debug!(items_count, changed, "Published cart");
    }

    fn set_state(&self, state: SessionState) {
        self.inner.session.send_replace(state);
    }
}

fn check_stock(
    product_id: ProductId,
    available: Option<i32>,
    requested: i32,
) -> std::result::Result<(), ValidationError> {
    match available {
        Some(available) if available < requested => Err(ValidationError::InsufficientStock {
            product_id,
            available,
            requested,
        }),
        _ => Ok(()),
    }
}
