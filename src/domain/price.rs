//! Price type
//!
//! Domain primitive for ticket prices and booking totals.
//! Prices are validated at construction time, ensuring invalid values
//! cannot exist in the system. On the wire they are plain JSON numbers.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::DomainError;

/// Maximum ticket price
const MAX_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Maximum decimal places (cents)
const MAX_SCALE: u32 = 2;

/// A validated ticket price.
///
/// # Invariants
/// - Value is zero (free event) or positive
/// - At most 2 decimal places
/// - At most 1,000,000
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use event_booking::domain::Price;
///
/// let price = Price::new(Decimal::new(29900, 2)).unwrap();
/// assert_eq!(price.value(), Decimal::new(299, 0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Price(Decimal);

impl Price {
    /// Create a new Price with validation.
    ///
    /// # Errors
    /// `DomainError::InvalidPrice` if negative, finer than cents, or above the maximum.
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        let value = value.normalize();

        if value.is_sign_negative() && !value.is_zero() {
            return Err(DomainError::InvalidPrice(format!(
                "must not be negative (got {value})"
            )));
        }

        if value.scale() > MAX_SCALE {
            return Err(DomainError::InvalidPrice(format!(
                "at most {MAX_SCALE} decimal places (got {value})"
            )));
        }

        if value > MAX_PRICE {
            return Err(DomainError::InvalidPrice(format!(
                "exceeds maximum of {MAX_PRICE}"
            )));
        }

        Ok(Self(value.abs()))
    }

    /// Free admission
    pub fn free() -> Self {
        Self(Decimal::ZERO)
    }

    /// Get the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Price {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal =
            Decimal::from_str(s.trim()).map_err(|e| DomainError::InvalidPrice(e.to_string()))?;
        Price::new(decimal)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        rust_decimal::serde::float::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = rust_decimal::serde::float::deserialize(deserializer)?;
        Price::new(value).map_err(serde::de::Error::custom)
    }
}

/// Booking price rules: a flat per-ticket service fee on top of the event price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pricing {
    service_fee: Decimal,
}

impl Pricing {
    pub fn new(service_fee: Decimal) -> Self {
        Self { service_fee }
    }

    pub fn service_fee(&self) -> Decimal {
        self.service_fee
    }

    /// `ticket_count × (price + service_fee)`, rounded to cents.
    pub fn total_for(&self, price: Price, ticket_count: u32) -> Decimal {
        (Decimal::from(ticket_count) * (price.value() + self.service_fee)).round_dp(MAX_SCALE)
    }
}

impl Default for Pricing {
    fn default() -> Self {
        // Flat fee shown on the booking form
        Self::new(Decimal::new(250, 2))
    }
}
