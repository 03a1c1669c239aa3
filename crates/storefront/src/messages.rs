//! User-facing message catalog.
//!
//! Server and engine messages are English keys; shoppers see the storefront
//! locale (Polish). Lookup is case-insensitive: an exact key match wins,
//! otherwise the first key contained in the message is used. Messages with
//! no translation fall back to a caller-supplied key, and finally to
//! [`GENERIC_ERROR_KEY`], so raw technical text never reaches the shopper.

use std::collections::HashMap;

/// Fallback key for failures with no specific translation.
pub const GENERIC_ERROR_KEY: &str = "an unexpected error occurred";
/// Fallback key for a failed add.
pub const ADD_FAILED_KEY: &str = "error adding to cart";
/// Fallback key for a failed update, remove or clear.
pub const UPDATE_FAILED_KEY: &str = "error updating cart";
/// Capacity cap reached.
pub const CAPACITY_KEY: &str = "cart limit exceeded";
/// Quantity input was not a whole number.
pub const INVALID_QUANTITY_KEY: &str = "invalid quantity";
/// Known stock is lower than requested.
pub const INSUFFICIENT_STOCK_KEY: &str = "insufficient stock";
/// Successful add.
pub const ADDED_KEY: &str = "added to cart";

/// Built-in translations, longest-first where keys overlap so the substring
/// pass prefers the most specific entry.
const DEFAULT_TRANSLATIONS: &[(&str, &str)] = &[
    (
        "insufficient stock for product",
        "Niewystarczająca ilość produktu w magazynie",
    ),
    (
        INSUFFICIENT_STOCK_KEY,
        "Niewystarczająca ilość produktu w magazynie",
    ),
    ("product not found", "Produkt nie został znaleziony"),
    ("not found", "Nie znaleziono zasobu"),
    (
        "user not logged in",
        "Musisz być zalogowany, aby wykonać tę operację",
    ),
    ("unauthorized", "Brak uprawnień"),
    (
        CAPACITY_KEY,
        "Koszyk może zawierać maksymalnie 100 sztuk produktów",
    ),
    (INVALID_QUANTITY_KEY, "Nieprawidłowa ilość"),
    (ADD_FAILED_KEY, "Błąd podczas dodawania do koszyka"),
    (UPDATE_FAILED_KEY, "Błąd podczas aktualizacji koszyka"),
    (ADDED_KEY, "Dodano do koszyka"),
    (GENERIC_ERROR_KEY, "Wystąpił nieoczekiwany błąd"),
];

/// Lookup table from English message keys to localized strings.
#[derive(Debug, Clone)]
pub struct MessageCatalog {
    /// Insertion order matters for the substring pass.
    entries: Vec<(String, String)>,
    exact: HashMap<String, usize>,
}

impl MessageCatalog {
    /// Empty catalog; every lookup falls through to the raw fallback key.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            exact: HashMap::new(),
        }
    }

    /// Add or replace a translation.
    #[must_use]
    pub fn with(mut self, key: &str, text: &str) -> Self {
        self.insert(key, text);
        self
    }

    /// Add or replace a translation.
    pub fn insert(&mut self, key: &str, text: &str) {
        let key = key.to_lowercase();
        if let Some(&idx) = self.exact.get(&key) {
            if let Some(entry) = self.entries.get_mut(idx) {
                entry.1 = text.to_string();
            }
            return;
        }
        self.exact.insert(key.clone(), self.entries.len());
        self.entries.push((key, text.to_string()));
    }

    /// Translate `message`, or `None` when no key matches.
    #[must_use]
    pub fn lookup(&self, message: &str) -> Option<&str> {
        let normalized = message.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }

        if let Some(entry) = self.exact.get(&normalized).and_then(|&i| self.entries.get(i)) {
            return Some(&entry.1);
        }

        self.entries
            .iter()
            .find(|(key, _)| normalized.contains(key.as_str()))
            .map(|(_, text)| text.as_str())
    }

    /// Translate `message`, falling back to `fallback_key`, then to the
    /// generic error message.
    #[must_use]
    pub fn translate_or(&self, message: Option<&str>, fallback_key: &str) -> String {
        message
            .and_then(|m| self.lookup(m))
            .or_else(|| self.lookup(fallback_key))
            .or_else(|| self.lookup(GENERIC_ERROR_KEY))
            .map_or_else(|| fallback_key.to_string(), str::to_string)
    }

    /// Translate a key the engine itself emits.
    #[must_use]
    pub fn text(&self, key: &str) -> String {
        self.translate_or(Some(key), key)
    }
}

impl Default for MessageCatalog {
    fn default() -> Self {
        DEFAULT_TRANSLATIONS
            .iter()
            .fold(Self::empty(), |catalog, (key, text)| catalog.with(key, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_is_case_insensitive() {
        let catalog = MessageCatalog::default();
        assert_eq!(
            catalog.lookup("Product Not Found"),
            Some("Produkt nie został znaleziony")
        );
    }

    #[test]
    fn test_substring_match() {
        let catalog = MessageCatalog::default();
        assert_eq!(
            catalog.lookup("Insufficient stock for product 42 (requested 5)"),
            Some("Niewystarczająca ilość produktu w magazynie")
        );
        // "product not found" is listed before "not found"
        assert_eq!(
            catalog.lookup("Error: product not found"),
            Some("Produkt nie został znaleziony")
        );
    }

    #[test]
    fn test_unknown_message_uses_fallback_key() {
        let catalog = MessageCatalog::default();
        assert_eq!(
            catalog.translate_or(Some("Connection reset by peer"), ADD_FAILED_KEY),
            "Błąd podczas dodawania do koszyka"
        );
        assert_eq!(
            catalog.translate_or(None, UPDATE_FAILED_KEY),
            "Błąd podczas aktualizacji koszyka"
        );
    }

    #[test]
    fn test_generic_fallback() {
        let catalog = MessageCatalog::default();
        assert_eq!(
            catalog.translate_or(Some("boom"), "no such key"),
            "Wystąpił nieoczekiwany błąd"
        );
    }

    #[test]
    fn test_empty_catalog_returns_key() {
        let catalog = MessageCatalog::empty();
        assert_eq!(catalog.text(ADDED_KEY), ADDED_KEY);
    }

    #[test]
    fn test_insert_overrides() {
        let catalog = MessageCatalog::default().with(ADDED_KEY, "Added!");
        assert_eq!(catalog.text("Added to cart"), "Added!");
    }
}
