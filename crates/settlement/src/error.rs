//! Settlement error types

use thiserror::Error;

/// Errors that can occur during settlement operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    /// Unit price outside the valid [1, 10000] range
    #[error("Unit price out of range: {0}")]
    PriceOutOfRange(u64),

    /// Conversion result does not fit the target integer width
    #[error("Amount overflow converting {0}")]
    AmountOverflow(String),

    /// No maturity record exists for the requested maturity
    #[error("Maturity not found: {0}")]
    MaturityNotFound(i64),

    /// A record for this maturity was already created
    #[error("Maturity already recorded: {0}")]
    MaturityAlreadyRecorded(i64),

    /// Maturity records must be appended in chronological order
    #[error("Maturity {0} is not after the latest recorded maturity")]
    NonChronologicalMaturity(i64),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
