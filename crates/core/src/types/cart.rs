//! Cart lines and the derived cart snapshot.
//!
//! A [`Cart`] can only be built from its lines, so `items_count` and
//! `total_amount` are always the reduction of `items`. Mutating helpers
//! (`with_added`, `with_quantity`, `without`) return a new snapshot and leave
//! the receiver untouched.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Product, ProductId};

/// Maximum number of units (summed over all lines) a cart may hold.
pub const MAX_CART_ITEMS: u32 = 100;

/// A single cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Product in this line.
    pub product_id: ProductId,
    /// Product name at the time it was added.
    pub product_name: String,
    /// Unit price.
    pub unit_price: Decimal,
    /// Number of units (always at least 1 inside a [`Cart`]).
    pub quantity: i32,
    /// Product image, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl CartItem {
    /// Build a new line for `product`.
    #[must_use]
    pub fn from_product(product: &Product, quantity: i32) -> Self {
        Self {
            product_id: product.id,
            product_name: product.name.clone(),
            unit_price: product.price,
            quantity,
            image_url: product.image_url.clone(),
        }
    }

    /// Price of the whole line.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }

    /// Lines that break the positive-quantity or non-negative-price rules
    /// are never kept in a cart.
    fn is_valid(&self) -> bool {
        self.quantity > 0 && !self.unit_price.is_sign_negative()
    }
}

/// `{productId, quantity}` pair sent to the server cart API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineInput {
    /// Product to add or set.
    pub product_id: ProductId,
    /// Units to add (upsert) or to set (absolute), depending on the endpoint.
    pub quantity: i32,
}

impl From<&CartItem> for CartLineInput {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id,
            quantity: item.quantity,
        }
    }
}

/// Immutable cart snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    items: Vec<CartItem>,
    items_count: u32,
    total_amount: Decimal,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a cart from its lines.
    ///
    /// Lines with a non-positive quantity or a negative price are dropped.
    /// Repeated product IDs are folded into the first occurrence by summing
    /// their quantities, so every product appears at most once.
    #[must_use]
    pub fn from_items(items: impl IntoIterator<Item = CartItem>) -> Self {
        let mut lines: Vec<CartItem> = Vec::new();

        for item in items.into_iter().filter(CartItem::is_valid) {
            match lines.iter_mut().find(|l| l.product_id == item.product_id) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(item.quantity);
                }
                None => lines.push(item),
            }
        }

        let items_count = lines
            .iter()
            .map(|l| u32::try_from(l.quantity).unwrap_or(0))
            .fold(0_u32, u32::saturating_add);
        let total_amount = lines.iter().map(CartItem::line_total).sum();

        Self {
            items: lines,
            items_count,
            total_amount,
        }
    }

    /// Cart lines in display order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Total units across all lines.
    #[must_use]
    pub const fn items_count(&self) -> u32 {
        self.items_count
    }

    /// Sum of all line totals.
    #[must_use]
    pub const fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Line for `product_id`, if present.
    #[must_use]
    pub fn line(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    /// Quantity of `product_id` in the cart (0 when absent).
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> i32 {
        self.line(product_id).map_or(0, |i| i.quantity)
    }

    /// Units held by every line except `product_id`.
    #[must_use]
    pub fn other_items_count(&self, product_id: ProductId) -> u32 {
        let own = u32::try_from(self.quantity_of(product_id)).unwrap_or(0);
        self.items_count.saturating_sub(own)
    }

    /// `{productId, quantity}` projection of every line.
    #[must_use]
    pub fn lines(&self) -> Vec<CartLineInput> {
        self.items.iter().map(CartLineInput::from).collect()
    }

    /// Consume the cart and return its lines.
    #[must_use]
    pub fn into_items(self) -> Vec<CartItem> {
        self.items
    }

    /// New cart with `quantity` more units of `product`.
    ///
    /// An existing line is incremented; otherwise a line is appended.
    #[must_use]
    pub fn with_added(&self, product: &Product, quantity: i32) -> Self {
        let mut items = self.items.clone();
        match items.iter_mut().find(|i| i.product_id == product.id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(quantity),
            None => items.push(CartItem::from_product(product, quantity)),
        }
        Self::from_items(items)
    }

    /// New cart with the line for `product_id` set to exactly `quantity`.
    ///
    /// A quantity of zero or less removes the line. Setting a product that is
    /// not in the cart returns an identical cart.
    #[must_use]
    pub fn with_quantity(&self, product_id: ProductId, quantity: i32) -> Self {
        if quantity <= 0 {
            return self.without(product_id);
        }

        let items = self
            .items
            .iter()
            .cloned()
            .map(|mut item| {
                if item.product_id == product_id {
                    item.quantity = quantity;
                }
                item
            })
            .collect::<Vec<_>>();
        Self::from_items(items)
    }

    /// New cart without the line for `product_id`.
    #[must_use]
    pub fn without(&self, product_id: ProductId) -> Self {
        Self::from_items(
            self.items
                .iter()
                .filter(|i| i.product_id != product_id)
                .cloned()
                .collect::<Vec<_>>(),
        )
    }
}

/// "Just added to cart" signal.
///
/// Not part of [`Cart`]; consumers show a confirmation and then discard it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastAddedEvent {
    /// Product that was added.
    pub product: Product,
    /// Units added by this call.
    pub quantity: i32,
    /// When the add was confirmed.
    pub added_at: DateTime<Utc>,
}

impl LastAddedEvent {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn now(product: Product, quantity: i32) -> Self {
        Self {
            product,
            quantity,
            added_at: Utc::now(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product(id: i32, price: i64) -> Product {
        Product::new(ProductId::new(id), format!("Product {id}"), Decimal::from(price))
    }

    fn assert_derived(cart: &Cart) {
        let count: i32 = cart.items().iter().map(|i| i.quantity).sum();
        let total: Decimal = cart.items().iter().map(CartItem::line_total).sum();
        assert_eq!(i64::from(cart.items_count()), i64::from(count));
        assert_eq!(cart.total_amount(), total);
    }

    #[test]
    fn test_empty_cart() {
        let cart = Cart::empty();
        assert!(cart.is_empty());
        assert_eq!(cart.items_count(), 0);
        assert_eq!(cart.total_amount(), Decimal::ZERO);
    }

    #[test]
    fn test_add_then_add_again_merges_line() {
        let p = product(1, 10);
        let cart = Cart::empty().with_added(&p, 3);
        assert_eq!(cart.items_count(), 3);
        assert_eq!(cart.total_amount(), Decimal::from(30));

        let cart = cart.with_added(&p, 2);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.quantity_of(p.id), 5);
        assert_eq!(cart.total_amount(), Decimal::from(50));
        assert_derived(&cart);
    }

    #[test]
    fn test_from_items_drops_invalid_and_folds_duplicates() {
        let a = CartItem::from_product(&product(1, 2), 2);
        let b = CartItem::from_product(&product(2, 5), 0);
        let c = CartItem::from_product(&product(1, 2), 3);
        let mut d = CartItem::from_product(&product(3, 1), 1);
        d.unit_price = Decimal::from(-1);

        let cart = Cart::from_items(vec![a, b, c, d]);

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.quantity_of(ProductId::new(1)), 5);
        assert_eq!(cart.total_amount(), Decimal::from(10));
        assert_derived(&cart);
    }

    #[test]
    fn test_with_quantity_is_absolute() {
        let cart = Cart::empty()
            .with_added(&product(1, 4), 2)
            .with_added(&product(2, 1), 1);

        let updated = cart.with_quantity(ProductId::new(1), 7);
        assert_eq!(updated.quantity_of(ProductId::new(1)), 7);
        assert_eq!(updated.items_count(), 8);
        assert_derived(&updated);

        // Original snapshot is untouched
        assert_eq!(cart.quantity_of(ProductId::new(1)), 2);
    }

    #[test]
    fn test_with_quantity_zero_removes_line() {
        let cart = Cart::empty().with_added(&product(1, 4), 2);
        let updated = cart.with_quantity(ProductId::new(1), 0);
        assert!(updated.is_empty());
    }

    #[test]
    fn test_with_quantity_unknown_line_is_identity() {
        let cart = Cart::empty().with_added(&product(1, 4), 2);
        assert_eq!(cart.with_quantity(ProductId::new(9), 3), cart);
    }

    #[test]
    fn test_without_keeps_order() {
        let cart = Cart::empty()
            .with_added(&product(1, 1), 1)
            .with_added(&product(2, 1), 1)
            .with_added(&product(3, 1), 1);

        let ids: Vec<i32> = cart
            .without(ProductId::new(2))
            .items()
            .iter()
            .map(|i| i.product_id.as_i32())
            .collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_other_items_count() {
        let cart = Cart::empty()
            .with_added(&product(1, 1), 40)
            .with_added(&product(2, 1), 10);

        assert_eq!(cart.other_items_count(ProductId::new(1)), 10);
        assert_eq!(cart.other_items_count(ProductId::new(7)), 50);
    }

    #[test]
    fn test_decimal_prices() {
        let p = Product::new(ProductId::new(1), "Soap", Decimal::new(1999, 2));
        let cart = Cart::empty().with_added(&p, 3);
        assert_eq!(cart.total_amount(), Decimal::new(5997, 2));
    }

    #[test]
    fn test_cart_item_json_shape() {
        let item = CartItem::from_product(&product(5, 3), 2);
        let json = serde_json::to_value(&item).unwrap();

        assert_eq!(json["productId"], 5);
        assert_eq!(json["productName"], "Product 5");
        assert_eq!(json["quantity"], 2);
        assert!(json.get("imageUrl").is_none());

        let from_number: CartItem = serde_json::from_str(
            r#"{"productId":5,"productName":"x","unitPrice":2.75,"quantity":1}"#,
        )
        .unwrap();
        assert_eq!(from_number.unit_price, Decimal::new(275, 2));
    }

    #[test]
    fn test_lines_projection() {
        let cart = Cart::empty().with_added(&product(4, 9), 6);
        assert_eq!(
            cart.lines(),
            vec![CartLineInput {
                product_id: ProductId::new(4),
                quantity: 6
            }]
        );
    }
}
