//! CLI command implementations.

pub mod cart;

use basket_storefront::{
    AuthSession, BasketConfig, CartEngine, CartError, ConfigError, FileStorage, GuestStore,
    HttpCartClient, Notice, NoticeKind, RemoteError,
};
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The cart API client could not be built.
    #[error("Cart API client error: {0}")]
    Client(#[from] RemoteError),

    /// A signed-in command was run without a token.
    #[error("BASKET_API_TOKEN is required for signed-in commands")]
    MissingToken,

    /// The cart operation failed.
    #[error("{0}")]
    Cart(#[from] CartError),

    /// The cart could not be printed.
    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

/// One CLI invocation's cart session.
pub struct Session {
    engine: CartEngine<HttpCartClient>,
    auth: AuthSession,
}

impl Session {
    /// Build the engine over the guest directory and the HTTP cart client,
    /// signing in first when `signed_in` is set.
    pub async fn open(config: &BasketConfig, signed_in: bool) -> Result<Self, CommandError> {
        let auth = AuthSession::new();
        let client = HttpCartClient::new(config.api.clone(), auth.token())?;
        let guest = GuestStore::new(FileStorage::new(&config.storage_dir));
        let engine = CartEngine::new(guest, client);

        if signed_in {
            let token = config
                .api_token
                .clone()
                .ok_or(CommandError::MissingToken)?;
            auth.sign_in(token);
            engine.on_auth_changed(auth.is_signed_in()).await;
        }

        tracing::debug!(state = ?engine.state(), "Cart session ready");
        Ok(Self { engine, auth })
    }

    pub const fn engine(&self) -> &CartEngine<HttpCartClient> {
        &self.engine
    }

    pub fn is_signed_in(&self) -> bool {
        self.auth.is_signed_in()
    }
}

/// Print queued notices to stderr.
#[allow(clippy::print_stderr)]
pub fn print_notices(notices: &mut broadcast::Receiver<Notice>) {
    while let Ok(notice) = notices.try_recv() {
        let marker = match notice.kind {
            NoticeKind::Success => "ok",
            NoticeKind::Error => "error",
            NoticeKind::Info => "info",
        };
        eprintln!("[{marker}] {}", notice.message);
    }
}
