//! Market orchestration for OpenTerm
//!
//! The [`MarketController`] owns the matrix of (currency, maturity)
//! order books, routes order flow into the matching engine, keeps
//! per-user positions settled for both parties of every trade, and
//! drives auto-roll through the genesis-value vault when maturities
//! close.

pub mod controller;
pub mod error;
pub mod position;
pub mod price_source;

pub use controller::{MarketController, RotationResult};
pub use error::ControllerError;
pub use position::PositionStore;
pub use price_source::StaticPriceSource;

/// Result type for controller operations
pub type Result<T> = std::result::Result<T, ControllerError>;
