//! Guest cart persisted in local storage.
//!
//! The guest store never fails: a missing, unreadable or corrupt value reads
//! as an empty cart, and writes that cannot be persisted are logged and
//! dropped. The engine's published cart stays authoritative for the rest of
//! the session either way.

mod storage;

pub use storage::{FileStorage, LocalStorage, MemoryStorage, StorageError};

use std::sync::Arc;

use basket_core::CartItem;
use tracing::{debug, warn};

/// Storage key holding the JSON-encoded guest cart lines.
pub const GUEST_CART_KEY: &str = "guest_cart";

/// Reads and writes the anonymous cart.
#[derive(Clone)]
pub struct GuestStore {
    storage: Arc<dyn LocalStorage>,
}

impl GuestStore {
    /// Create a guest store over `storage`.
    #[must_use]
    pub fn new(storage: impl LocalStorage + 'static) -> Self {
        Self {
            storage: Arc::new(storage),
        }
    }

    /// Create a guest store sharing an existing storage handle.
    #[must_use]
    pub fn from_shared(storage: Arc<dyn LocalStorage>) -> Self {
        Self { storage }
    }

    /// Read the stored guest lines.
    ///
    /// Returns an empty list when nothing is stored or the value cannot be
    /// read. Lines with a non-positive quantity are dropped.
    #[must_use]
    pub fn read(&self) -> Vec<CartItem> {
        self.load().unwrap_or_default()
    }

    /// Read the stored guest lines, or `None` when storage cannot be read
    /// at all. A corrupt value loads as an empty cart.
    #[must_use]
    pub fn load(&self) -> Option<Vec<CartItem>> {
        let raw = match self.storage.get(GUEST_CART_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Some(Vec::new()),
            Err(StorageError::Unavailable) => {
                debug!("Guest storage unavailable");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read guest cart");
                return None;
            }
        };

        match serde_json::from_str::<Vec<CartItem>>(&raw) {
            Ok(items) => Some(items.into_iter().filter(|i| i.quantity > 0).collect()),
            Err(e) => {
                warn!(error = %e, "Stored guest cart is corrupt, ignoring it");
                Some(Vec::new())
            }
        }
    }

    /// Persist the guest lines. Best effort.
    pub fn write(&self, items: &[CartItem]) {
        let result = serde_json::to_string(items)
            .map_err(StorageError::from)
            .and_then(|json| self.storage.set(GUEST_CART_KEY, &json));

        match result {
            Ok(()) => debug!(lines = items.len(), "Guest cart saved"),
            Err(StorageError::Unavailable) => debug!("Guest storage unavailable, cart not saved"),
            Err(e) => warn!(error = %e, "Failed to save guest cart"),
        }
    }

    /// Remove the stored guest cart. Best effort.
    pub fn clear(&self) {
        match self.storage.remove(GUEST_CART_KEY) {
            Ok(()) => debug!("Guest cart cleared"),
            Err(StorageError::Unavailable) => {}
            Err(e) => warn!(error = %e, "Failed to clear guest cart"),
        }
    }
}

impl std::fmt::Debug for GuestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuestStore")
            .field("key", &GUEST_CART_KEY)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use basket_core::{Product, ProductId};
    use rust_decimal::Decimal;

    use super::*;

    fn item(id: i32, quantity: i32) -> CartItem {
        let product = Product::new(ProductId::new(id), "Item", Decimal::from(10));
        CartItem::from_product(&product, quantity)
    }

    #[test]
    fn test_read_empty_when_nothing_stored() {
        let store = GuestStore::new(MemoryStorage::new());
        assert!(store.read().is_empty());
    }

    #[test]
    fn test_write_then_read() {
        let store = GuestStore::new(MemoryStorage::new());
        store.write(&[item(1, 3), item(2, 1)]);

        let items = store.read();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].quantity, 3);
    }

    #[test]
    fn test_clear_removes_key() {
        let storage = Arc::new(MemoryStorage::new());
        let store = GuestStore::from_shared(storage.clone());
        store.write(&[item(1, 3)]);
        store.clear();

        assert!(storage.get(GUEST_CART_KEY).unwrap().is_none());
        assert!(store.read().is_empty());
    }

    #[test]
    fn test_unavailable_storage_never_fails() {
        let store = GuestStore::new(MemoryStorage::unavailable());
        store.write(&[item(1, 3)]);
        store.clear();
        assert!(store.read().is_empty());
    }

    #[test]
    fn test_load_distinguishes_unavailable_from_empty() {
        assert!(GuestStore::new(MemoryStorage::unavailable()).load().is_none());
        assert_eq!(GuestStore::new(MemoryStorage::new()).load(), Some(Vec::new()));
    }

    #[test]
    fn test_corrupt_value_reads_as_empty() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(GUEST_CART_KEY, "{not json").unwrap();

        let store = GuestStore::from_shared(storage);
        assert!(store.read().is_empty());
    }

    #[test]
    fn test_read_drops_non_positive_lines() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set(
                GUEST_CART_KEY,
                r#"[{"productId":1,"productName":"A","unitPrice":"1","quantity":0},
                    {"productId":2,"productName":"B","unitPrice":"1","quantity":2}]"#,
            )
            .unwrap();

        let items = GuestStore::from_shared(storage).read();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_id, ProductId::new(2));
    }

    #[test]
    fn test_file_backed_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        GuestStore::new(FileStorage::new(dir.path())).write(&[item(4, 2)]);

        let items = GuestStore::new(FileStorage::new(dir.path())).read();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_id, ProductId::new(4));
    }
}
