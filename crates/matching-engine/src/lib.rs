//! Order matching engine for OpenTerm
//!
//! This crate implements the core of the fixed-maturity lending
//! exchange: per (currency, maturity) order books with price-time
//! priority, the per-settlement-step circuit breaker, and the Itayose
//! opening auction.
//!
//! # Properties
//!
//! 1. Deterministic (same operation stream, same trades, always)
//! 2. Fully serialized (no operation observes another mid-flight)
//! 3. Price-time priority (strictly enforced, FIFO within a level)
//! 4. Per-trade conservation (one future value credits the lender and
//!    debits the borrower)

pub mod circuit_breaker;
pub mod domain;
pub mod engine;
pub mod error;
pub mod event;
pub mod itayose;
pub mod metrics;
pub mod result;

pub use circuit_breaker::{BootstrapPriceSource, CircuitBreakerConfig, PriceBand};
pub use domain::{BookOrder, FilledOrder, ItayoseState, OrderBook, OrderBookSnapshot, StepPrice, Trade};
pub use engine::{MatchingEngine, MAX_ORDER_AMOUNT};
pub use error::MatchingError;
pub use event::{EngineEvent, EventJournal};
pub use metrics::MetricsSnapshot;
pub use result::{CancelResult, FillResult, ItayoseResult};

/// Result type for matching operations
pub type Result<T> = std::result::Result<T, MatchingError>;
