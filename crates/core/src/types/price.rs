//! Type-safe price representation using decimal arithmetic.

use core::fmt;
use core::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

/// Errors that can occur when building a [`Price`] or [`CurrencyCode`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceError {
    /// The amount is below zero.
    #[error("price must not be negative (got {0})")]
    Negative(Decimal),
    /// The amount is NaN, infinite, or out of decimal range.
    #[error("price is not a finite number")]
    NotFinite,
    /// The currency code is not three ASCII letters.
    #[error("currency code must be three ASCII letters (got {0:?})")]
    InvalidCurrency(String),
}

/// A price with currency information.
///
/// Fields are public so records can be mapped without ceremony; use
/// [`Price::parse`] or [`Price::from_f64`] for untrusted input and
/// [`Price::validate`] before money moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 style currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price without validation.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Create a validated price.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] if the amount is below zero.
    pub fn parse(amount: Decimal, currency_code: CurrencyCode) -> Result<Self, PriceError> {
        let price = Self::new(amount, currency_code);
        price.validate()?;
        Ok(price)
    }

    /// Create a validated price from a floating point amount, as found in
    /// JSON payloads.
    ///
    /// # Errors
    ///
    /// Returns an error if the amount is not finite or is negative.
    pub fn from_f64(amount: f64, currency_code: CurrencyCode) -> Result<Self, PriceError> {
        if !amount.is_finite() {
            return Err(PriceError::NotFinite);
        }
        let amount = Decimal::from_f64(amount)
            .ok_or(PriceError::NotFinite)?
            .normalize();
        Self::parse(amount, currency_code)
    }

    /// Check that the amount is a well-formed non-negative number.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::Negative`] if the amount is below zero.
    pub fn validate(&self) -> Result<(), PriceError> {
        if self.amount.is_sign_negative() && !self.amount.is_zero() {
            return Err(PriceError::Negative(self.amount));
        }
        Ok(())
    }

    /// Format for display (e.g., "$49.99" or "NGN 25000.00").
    #[must_use]
    pub fn display(&self) -> String {
        match self.currency_code.symbol() {
            Some(symbol) => format!("{symbol}{:.2}", self.amount),
            None => format!("{} {:.2}", self.currency_code, self.amount),
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// A three-letter, upper-case currency code.
///
/// The set is open: any three ASCII letters are accepted, since catalog
/// records carry whatever currency the backend stores.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode([u8; 3]);

impl CurrencyCode {
    /// US dollar.
    pub const USD: Self = Self(*b"USD");
    /// Euro.
    pub const EUR: Self = Self(*b"EUR");
    /// Pound sterling.
    pub const GBP: Self = Self(*b"GBP");
    /// Nigerian naira.
    pub const NGN: Self = Self(*b"NGN");

    /// Parse a currency code, normalizing to upper case.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::InvalidCurrency`] unless the input is exactly
    /// three ASCII letters (surrounding whitespace is ignored).
    pub fn parse(s: &str) -> Result<Self, PriceError> {
        let trimmed = s.trim();
        let bytes: [u8; 3] = trimmed
            .as_bytes()
            .try_into()
            .map_err(|_| PriceError::InvalidCurrency(s.to_string()))?;
        if !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(PriceError::InvalidCurrency(s.to_string()));
        }
        Ok(Self(bytes.map(|b| b.to_ascii_uppercase())))
    }

    /// Returns the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Only ASCII letters are ever stored.
        core::str::from_utf8(&self.0).unwrap_or("XXX")
    }

    /// Currency symbol for the common codes.
    #[must_use]
    pub const fn symbol(&self) -> Option<&'static str> {
        match &self.0 {
            b"USD" => Some("$"),
            b"EUR" => Some("€"),
            b"GBP" => Some("£"),
            b"NGN" => Some("₦"),
            _ => None,
        }
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self::USD
    }
}

impl fmt::Debug for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CurrencyCode({})", self.as_str())
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurrencyCode {
    type Err = PriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = PriceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.as_str().to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_parse_normalizes_case() {
        assert_eq!(CurrencyCode::parse("usd").unwrap(), CurrencyCode::USD);
        assert_eq!(CurrencyCode::parse(" ngn ").unwrap(), CurrencyCode::NGN);
    }

    #[test]
    fn test_currency_parse_rejects_bad_codes() {
        assert!(CurrencyCode::parse("").is_err());
        assert!(CurrencyCode::parse("US").is_err());
        assert!(CurrencyCode::parse("USDX").is_err());
        assert!(CurrencyCode::parse("U$D").is_err());
    }

    #[test]
    fn test_currency_serde_as_string() {
        let json = serde_json::to_string(&CurrencyCode::EUR).unwrap();
        assert_eq!(json, "\"EUR\"");
        let parsed: CurrencyCode = serde_json::from_str("\"gbp\"").unwrap();
        assert_eq!(parsed, CurrencyCode::GBP);
        assert!(serde_json::from_str::<CurrencyCode>("\"dollars\"").is_err());
    }

    #[test]
    fn test_from_f64_keeps_cents() {
        let price = Price::from_f64(49.99, CurrencyCode::USD).unwrap();
        assert_eq!(price.amount, Decimal::new(4999, 2));
    }

    #[test]
    fn test_from_f64_rejects_non_finite_and_negative() {
        assert_eq!(
            Price::from_f64(f64::NAN, CurrencyCode::USD),
            Err(PriceError::NotFinite)
        );
        assert_eq!(
            Price::from_f64(f64::INFINITY, CurrencyCode::USD),
            Err(PriceError::NotFinite)
        );
        assert!(matches!(
            Price::from_f64(-1.0, CurrencyCode::USD),
            Err(PriceError::Negative(_))
        ));
    }

    #[test]
    fn test_zero_is_valid() {
        assert!(Price::new(Decimal::ZERO, CurrencyCode::USD).validate().is_ok());
    }

    #[test]
    fn test_validate_catches_unchecked_negative() {
        let price = Price::new(Decimal::new(-500, 2), CurrencyCode::USD);
        assert!(price.validate().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Price::new(Decimal::new(2999, 2), CurrencyCode::USD).display(), "$29.99");
        assert_eq!(Price::new(Decimal::new(25000, 0), CurrencyCode::NGN).display(), "₦25000.00");
        let kes = CurrencyCode::parse("KES").unwrap();
        assert_eq!(Price::new(Decimal::new(150, 0), kes).display(), "KES 150.00");
    }
}
