//! Basket storefront cart engine.
//!
//! Keeps one shopper's cart consistent across a signed-out guest cart held
//! in local storage and the server cart used once they sign in.
//!
//! # Modules
//!
//! - [`engine`]: the [`CartEngine`] state machine and its operations
//! - [`guest`]: guest cart persistence over a [`guest::LocalStorage`] seam
//! - [`remote`]: the server cart contract ([`CartApi`]) and its HTTP client
//! - [`stock`]: live stock levels fed by the push channel
//! - [`auth`]: the sign-in flag and bearer token the engine consumes
//! - [`messages`], [`notify`]: localized shopper notices
//! - [`config`]: environment configuration

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod config;
pub mod engine;
pub mod error;
pub mod guest;
pub mod messages;
pub mod notify;
pub mod remote;
pub mod stock;

pub use auth::{AuthSession, AuthToken};
pub use config::{BasketConfig, CartApiConfig, ConfigError};
pub use engine::{AddOptions, CartEngine, SessionState};
pub use error::{CartError, ValidationError};
pub use guest::{FileStorage, GuestStore, MemoryStorage};
pub use messages::MessageCatalog;
pub use notify::{Notice, NoticeKind};
pub use remote::{CartApi, HttpCartClient, RemoteCart, RemoteError};
pub use stock::{StockLevels, StockListener};
