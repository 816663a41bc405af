//! Common types used across OpenTerm
//!
//! This module provides the fundamental domain types used throughout
//! the fixed-maturity lending exchange.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scale of the fixed-point unit price. A unit price of 10000 is par:
/// present value and future value are equal.
pub const PRICE_SCALE: u64 = 10_000;

/// Unique identifier for orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub Uuid);

impl OrderId {
    /// Create a new random OrderId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an OrderId from an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for market participants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Create a new random UserId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order side (lend or borrow)
///
/// The unit price is a bond-style discount price. A lend order bids for
/// future value (a lower executed price yields more future value per unit
/// of present value), so its limit is the maximum acceptable price. A
/// borrow order asks (its limit is the minimum acceptable price).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Lend order (pays present value now, holds a claim at maturity)
    Lend,
    /// Borrow order (receives present value now, owes at maturity)
    Borrow,
}

impl Side {
    /// Returns the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Lend => Side::Borrow,
            Side::Borrow => Side::Lend,
        }
    }

    /// Returns true if this is a lend order
    pub fn is_lend(&self) -> bool {
        matches!(self, Side::Lend)
    }

    /// Returns true if this is a borrow order
    pub fn is_borrow(&self) -> bool {
        matches!(self, Side::Borrow)
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Lend => write!(f, "lend"),
            Side::Borrow => write!(f, "borrow"),
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Market order - execute immediately at best available prices
    Market,
    /// Limit order - execute at the limit unit price or better
    Limit,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "market"),
            OrderType::Limit => write!(f, "limit"),
        }
    }
}

/// Fixed-point unit price in `[1, PRICE_SCALE]`
///
/// Converts present value to future value:
/// `fv = pv * PRICE_SCALE / price`. Par (10000) means no discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitPrice(u64);

impl UnitPrice {
    /// Par price (no discount)
    pub const PAR: UnitPrice = UnitPrice(PRICE_SCALE);

    /// Validate and wrap a raw unit price
    pub fn try_new(raw: u64) -> Option<Self> {
        if (1..=PRICE_SCALE).contains(&raw) {
            Some(Self(raw))
        } else {
            None
        }
    }

    /// Get the raw fixed-point value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for UnitPrice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Currency symbol (e.g., "USDC", "ETH")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency(pub String);

impl Currency {
    /// Create a new Currency
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().to_uppercase())
    }

    /// Get the currency as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Currency {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Maturity of a market, as a Unix timestamp in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Maturity(pub i64);

impl Maturity {
    /// Create a maturity from a Unix timestamp in seconds
    pub fn from_timestamp(secs: i64) -> Self {
        Self(secs)
    }

    /// Get the Unix timestamp in seconds
    pub fn as_timestamp(&self) -> i64 {
        self.0
    }

    /// Check whether this maturity has passed at the given time
    pub fn is_matured(&self, now: i64) -> bool {
        now >= self.0
    }
}

impl std::fmt::Display for Maturity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_id() {
        let id1 = OrderId::new();
        let id2 = OrderId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_side() {
        assert_eq!(Side::Lend.opposite(), Side::Borrow);
        assert_eq!(Side::Borrow.opposite(), Side::Lend);
        assert!(Side::Lend.is_lend());
        assert!(Side::Borrow.is_borrow());
    }

    #[test]
    fn test_unit_price_bounds() {
        assert!(UnitPrice::try_new(0).is_none());
        assert!(UnitPrice::try_new(1).is_some());
        assert!(UnitPrice::try_new(PRICE_SCALE).is_some());
        assert!(UnitPrice::try_new(PRICE_SCALE + 1).is_none());
        assert_eq!(UnitPrice::PAR.as_u64(), PRICE_SCALE);
    }

    #[test]
    fn test_currency() {
        let ccy = Currency::new("usdc");
        assert_eq!(ccy.as_str(), "USDC");
    }

    #[test]
    fn test_maturity_ordering() {
        let m1 = Maturity::from_timestamp(1_700_000_000);
        let m2 = Maturity::from_timestamp(1_710_000_000);
        assert!(m1 < m2);
        assert!(m1.is_matured(1_700_000_000));
        assert!(!m2.is_matured(1_700_000_000));
    }
}
