//! Authentication boundary.
//!
//! The engine does not own sign-in. It consumes two things from whoever does:
//! a reactive "is signed in" flag (a `watch` channel) and a bearer token that
//! the HTTP client attaches to cart requests. [`AuthSession`] bundles both so
//! an embedding application (or the CLI) flips them together.

use std::sync::{Arc, RwLock};

use secrecy::SecretString;
use tokio::sync::watch;

use crate::config::bearer_value;

/// Shared bearer token slot read by [`crate::remote::HttpCartClient`].
#[derive(Clone, Default)]
pub struct AuthToken {
    inner: Arc<RwLock<Option<SecretString>>>,
}

impl AuthToken {
    /// Create a slot holding `token`.
    #[must_use]
    pub fn with_token(token: SecretString) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(token))),
        }
    }

    /// Replace the token.
    pub fn set(&self, token: SecretString) {
        if let Ok(mut slot) = self.inner.write() {
            *slot = Some(token);
        }
    }

    /// Drop the token.
    pub fn clear(&self) {
        if let Ok(mut slot) = self.inner.write() {
            *slot = None;
        }
    }

    /// Whether a token is present.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.inner.read().is_ok_and(|slot| slot.is_some())
    }

    /// `Authorization` header value, if a token is present.
    pub(crate) fn header_value(&self) -> Option<String> {
        self.inner
            .read()
            .ok()
            .and_then(|slot| slot.as_ref().map(bearer_value))
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("token", &if self.is_set() { "[REDACTED]" } else { "None" })
            .finish()
    }
}

/// Sign-in state as seen by the cart: the token plus the observable flag.
#[derive(Debug, Clone)]
pub struct AuthSession {
    token: AuthToken,
    signed_in: Arc<watch::Sender<bool>>,
}

impl AuthSession {
    /// Create a signed-out session.
    #[must_use]
    pub fn new() -> Self {
        let (signed_in, _) = watch::channel(false);
        Self {
            token: AuthToken::default(),
            signed_in: Arc::new(signed_in),
        }
    }

    /// Token slot to hand to the HTTP client.
    #[must_use]
    pub fn token(&self) -> AuthToken {
        self.token.clone()
    }

    /// Observe the signed-in flag.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.signed_in.subscribe()
    }

    /// Current value of the signed-in flag.
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        *self.signed_in.borrow()
    }

    /// Store the token, then flip the flag to signed in.
    pub fn sign_in(&self, token: SecretString) {
        self.token.set(token);
        self.signed_in.send_replace(true);
    }

    /// Flip the flag to signed out, then drop the token.
    pub fn sign_out(&self) {
        self.signed_in.send_replace(false);
        self.token.clear();
    }
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_header_value() {
        let token = AuthToken::default();
        assert!(token.header_value().is_none());

        token.set(SecretString::from("abc"));
        assert_eq!(token.header_value().as_deref(), Some("Bearer abc"));

        token.clear();
        assert!(!token.is_set());
    }

    #[test]
    fn test_token_debug_redacts() {
        let token = AuthToken::with_token(SecretString::from("very-secret"));
        let debug = format!("{token:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("very-secret"));
    }

    #[test]
    fn test_session_flips_flag_and_token() {
        let session = AuthSession::new();
        let rx = session.subscribe();
        assert!(!*rx.borrow());

        session.sign_in(SecretString::from("t0ken"));
        assert!(*rx.borrow());
        assert!(session.token().is_set());

        session.sign_out();
        assert!(!session.is_signed_in());
        assert!(!session.token().is_set());
    }
}
