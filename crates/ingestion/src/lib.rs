//! Price data ingestion for the kate backtester.
//!
//! This crate handles:
//! - Loading OHLCV candles from CSV with strict validation
//! - Serving them to the simulation as a restartable feed

pub mod csv_loader;
pub mod prices;

pub use csv_loader::{load_prices_from_csv, load_prices_from_reader};
pub use prices::PriceFeed;
