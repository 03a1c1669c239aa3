//! Quantity input parsing.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Quantity`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// The input string is empty.
    #[error("quantity cannot be empty")]
    Empty,
    /// The input is not a whole number.
    #[error("quantity must be a whole number, got {0:?}")]
    NotANumber(String),
}

/// A quantity typed in by a shopper.
///
/// Parsing only checks that the input is a whole number. Zero and negative
/// values are valid here: setting a line to zero or less removes it, so the
/// range check belongs to the cart operation, not the parser.
///
/// ## Examples
///
/// ```
/// use basket_core::Quantity;
///
/// assert_eq!(Quantity::parse("3").unwrap().get(), 3);
/// assert_eq!(Quantity::parse(" 0 ").unwrap().get(), 0);
///
/// assert!(Quantity::parse("").is_err());
/// assert!(Quantity::parse("two").is_err());
/// assert!(Quantity::parse("1.5").is_err());
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Quantity(i32);

impl Quantity {
    /// Parse a `Quantity` from free-text input.
    ///
    /// Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or is not a whole number
    /// that fits in an `i32`.
    pub fn parse(s: &str) -> Result<Self, QuantityError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(QuantityError::Empty);
        }

        trimmed
            .parse::<i32>()
            .map(Self)
            .map_err(|_| QuantityError::NotANumber(trimmed.to_owned()))
    }

    /// Returns the parsed value.
    #[must_use]
    pub const fn get(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Quantity {
    type Err = QuantityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Quantity> for i32 {
    fn from(q: Quantity) -> Self {
        q.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_whole_numbers() {
        assert_eq!(Quantity::parse("1").unwrap().get(), 1);
        assert_eq!(Quantity::parse("100").unwrap().get(), 100);
        assert_eq!(Quantity::parse("-2").unwrap().get(), -2);
        assert_eq!(Quantity::parse("\t5\n").unwrap().get(), 5);
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(Quantity::parse(""), Err(QuantityError::Empty));
        assert_eq!(Quantity::parse("   "), Err(QuantityError::Empty));
    }

    #[test]
    fn test_parse_not_a_number() {
        assert!(matches!(
            Quantity::parse("NaN"),
            Err(QuantityError::NotANumber(s)) if s == "NaN"
        ));
        assert!(Quantity::parse("2.5").is_err());
        assert!(Quantity::parse("99999999999").is_err());
    }

    #[test]
    fn test_from_str() {
        let q: Quantity = "12".parse().unwrap();
        assert_eq!(i32::from(q), 12);
    }
}
