//! Core types for Basket.
//!
//! This module provides type-safe wrappers for the cart domain.

pub mod cart;
pub mod id;
pub mod product;
pub mod quantity;
pub mod stock;

pub use cart::{Cart, CartItem, CartLineInput, LastAddedEvent, MAX_CART_ITEMS};
pub use id::*;
pub use product::Product;
pub use quantity::{Quantity, QuantityError};
pub use stock::{STOCK_UPDATE_TARGET, StockMessageError, StockUpdate};
