//! Observability infrastructure for OpenTerm
//!
//! This crate provides structured logging via tracing.
//!
//! # Quick Start
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("termx", LogFormat::Pretty)?;
//! tracing::info!("Exchange started");
//! ```

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat};
