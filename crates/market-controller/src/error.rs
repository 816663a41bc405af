//! Market controller error types

use matching_engine::MatchingError;
use settlement::SettlementError;
use thiserror::Error;

/// Errors raised by market orchestration
#[derive(Error, Debug)]
pub enum ControllerError {
    /// Matching engine rejected the operation
    #[error(transparent)]
    Matching(#[from] MatchingError),

    /// Settlement arithmetic rejected the operation
    #[error(transparent)]
    Settlement(#[from] SettlementError),

    /// No maturities are listed for the currency
    #[error("No active maturity for currency: {0}")]
    NoActiveMaturity(String),

    /// The active maturity has not passed yet
    #[error("Maturity not yet matured: {currency} {maturity}")]
    MarketNotMatured { currency: String, maturity: i64 },

    /// Rotation needs a successor maturity to roll into
    #[error("No next maturity listed for currency: {0}")]
    NoNextMaturity(String),

    /// Neither a traded price nor an opening price exists for the roll
    #[error("No closing price available: {currency} {maturity}")]
    NoClosingPrice { currency: String, maturity: i64 },

    /// Every order-book slot is occupied by an unrotated maturity
    #[error("Order book slots exhausted for currency: {0}")]
    SlotsExhausted(String),

    /// Maturities must be listed in strictly increasing order
    #[error("Maturity not after the latest listed: {currency} {maturity}")]
    NonChronologicalMaturity { currency: String, maturity: i64 },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
