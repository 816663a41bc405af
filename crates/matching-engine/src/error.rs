//! Matching engine error types

use common::OrderId;
use settlement::SettlementError;
use thiserror::Error;

/// Errors that can occur during order matching
#[derive(Error, Debug)]
pub enum MatchingError {
    /// Invalid order parameters (zero amount, price out of range, ...)
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    /// Order not found (unknown id, or already fully matched)
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Order exists but belongs to a different user
    #[error("Order not owned by caller: {0}")]
    OrderNotOwned(OrderId),

    /// No order book exists for the requested currency and maturity
    #[error("Order book not found: {currency} {maturity}")]
    BookNotFound { currency: String, maturity: i64 },

    /// An order book for this currency and maturity already exists
    #[error("Order book already exists: {currency} {maturity}")]
    BookAlreadyExists { currency: String, maturity: i64 },

    /// Continuous trading has not opened yet
    #[error("Market not open: {currency} {maturity}")]
    MarketNotOpen { currency: String, maturity: i64 },

    /// The maturity has passed; the book only awaits rotation
    #[error("Market matured: {currency} {maturity}")]
    MarketMatured { currency: String, maturity: i64 },

    /// The opening auction already ran for this book
    #[error("Itayose already executed: {currency} {maturity}")]
    ItayoseAlreadyExecuted { currency: String, maturity: i64 },

    /// Pre-orders are only accepted inside the pre-open window
    #[error("Pre-order window closed: {currency} {maturity}")]
    PreOrderWindowClosed { currency: String, maturity: i64 },

    /// The user already queued a pre-order on the opposite side
    #[error("Opposite-side pre-order exists for user")]
    OppositeSidePreOrder,

    /// Fixed-point conversion failure
    #[error(transparent)]
    Arithmetic(#[from] SettlementError),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
