//! Settlement arithmetic for OpenTerm
//!
//! This crate holds the two value layers of the exchange:
//!
//! - [`value`] - stateless fixed-point conversion between present value
//!   (the notional exchanged at trade time) and future value (the payoff
//!   due at maturity)
//! - [`genesis`] - the per-currency maturity chain and genesis-value
//!   ledger that carries positions across auto-rolled maturities

pub mod error;
pub mod genesis;
pub mod value;

pub use error::SettlementError;
pub use genesis::{GenesisValueVault, MaturityUnitPriceRecord, GENESIS_FACTOR};

/// Result type for settlement operations
pub type Result<T> = std::result::Result<T, SettlementError>;
