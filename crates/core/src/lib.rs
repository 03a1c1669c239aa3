//! Basket Core - Shared cart domain types.
//!
//! This crate provides the types used by every Basket component:
//! - `storefront` - Cart reconciliation engine (guest + server carts)
//! - `cli` - Command-line driver for the engine
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! storage access, no HTTP clients. Every cart mutation here returns a new
//! [`Cart`] rather than editing one in place, so the engine can publish
//! whole snapshots.
//!
//! # Modules
//!
//! - [`types`] - Product IDs, products, cart lines, carts, quantities, stock levels

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
