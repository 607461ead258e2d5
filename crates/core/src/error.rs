//! Error types for the kate backtester.

use crate::types::Direction;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the kate backtester.
///
/// Exchange errors (`PositionAlreadyOpen` through `InvalidTakeProfitPrice`) are
/// recoverable: the rejected request leaves the exchange untouched.
#[derive(Error, Debug)]
pub enum Error {
    /// Dequeue attempted on an empty event queue.
    #[error("Event queue is empty")]
    EmptyQueue,

    /// A position is already open.
    #[error("A position is already open, it cannot be increased or merged")]
    PositionAlreadyOpen,

    /// Not enough balance left to open a position.
    #[error("Insufficient balance to trade: {balance}")]
    InsufficientBalance { balance: f64 },

    /// No position is open.
    #[error("There is no open position")]
    NoOpenPosition,

    /// An order arrived before any price tick.
    #[error("No price tick has been processed yet")]
    NoMarketPrice,

    /// Stoploss on the wrong side of the current price.
    #[error("Invalid stoploss {price} for {direction} position at current price {current}")]
    InvalidStopPrice {
        price: f64,
        current: f64,
        direction: Direction,
    },

    /// Takeprofit on the wrong side of the current price.
    #[error("Invalid takeprofit {price} for {direction} position at current price {current}")]
    InvalidTakeProfitPrice {
        price: f64,
        current: f64,
        direction: Direction,
    },

    /// A price record that could not be parsed.
    #[error("Malformed price record at row {row}, column '{column}': invalid value '{value}'")]
    MalformedPriceRecord {
        row: usize,
        column: String,
        value: String,
    },

    /// A required OHLCV column is missing from the header.
    #[error("Missing required column '{0}', expected header: open,high,low,close,volume")]
    MissingColumn(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reader error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a malformed price record error.
    pub fn malformed(row: usize, column: impl Into<String>, value: impl Into<String>) -> Self {
        Error::MalformedPriceRecord {
            row,
            column: column.into(),
            value: value.into(),
        }
    }

    /// Is this a rejected exchange request the run can continue past?
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::PositionAlreadyOpen
                | Error::InsufficientBalance { .. }
                | Error::NoOpenPosition
                | Error::NoMarketPrice
                | Error::InvalidStopPrice { .. }
                | Error::InvalidTakeProfitPrice { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_message_names_value() {
        let err = Error::malformed(2, "high", "xpto");
        let msg = err.to_string();
        assert!(msg.contains("xpto"));
        assert!(msg.contains("row 2"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_exchange_errors_are_recoverable() {
        assert!(Error::PositionAlreadyOpen.is_recoverable());
        assert!(Error::InsufficientBalance { balance: 0.5 }.is_recoverable());
        assert!(Error::NoOpenPosition.is_recoverable());
        assert!(!Error::EmptyQueue.is_recoverable());
    }
}
