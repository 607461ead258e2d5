//! Core types and configuration for the kate backtester.
//!
//! This crate provides shared types used across all other crates:
//! - OHLCV price candles and trade direction
//! - Run configuration
//! - Common error types

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, MarketType, MAINTENANCE_MARGIN_RATE};
pub use error::{Error, Result};
pub use types::*;
