//! Run configuration for the kate backtester.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Maintenance margin rate used by the isolated-margin liquidation formulas.
pub const MAINTENANCE_MARGIN_RATE: f64 = 0.005;

/// Kind of derivatives market being simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketType {
    /// Linear contract, margined and settled in the quote currency.
    UsdMargined,
    /// Inverse contract, margined and settled in the base coin.
    CoinMargined,
}

/// Configuration for a single backtest run.
///
/// Fees, trade fraction and slippage are percentages: `0.04` means 0.04 %.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Market type.
    pub market: MarketType,
    /// Maker (limit order) fee in percent.
    pub maker_fee_pct: f64,
    /// Taker (market order) fee in percent.
    pub taker_fee_pct: f64,
    /// Percentage of the balance committed as margin per trade.
    pub trade_fraction_pct: f64,
    /// Fixed stake per trade, overrides `trade_fraction_pct` when set.
    pub fixed_trade_amount: Option<f64>,
    /// Starting balance.
    pub initial_balance: f64,
    /// Slippage in percent applied to market fills.
    pub slippage_pct: f64,
}

impl Default for Config {
    fn default() -> Self {
        // Binance VIP 0 futures fees
        Self {
            market: MarketType::UsdMargined,
            maker_fee_pct: 0.02,
            taker_fee_pct: 0.04,
            trade_fraction_pct: 1.0,
            fixed_trade_amount: None,
            initial_balance: 1000.0,
            slippage_pct: 0.0,
        }
    }
}

impl Config {
    /// Parse a configuration from JSON, filling missing fields with defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Check that every field is in range.
    pub fn validate(&self) -> Result<()> {
        if self.maker_fee_pct < 0.0 || self.taker_fee_pct < 0.0 {
            return Err(Error::config("fees must not be negative"));
        }
        if !(self.initial_balance > 0.0) {
            return Err(Error::config(format!(
                "initial balance must be positive, got {}",
                self.initial_balance
            )));
        }
        if !(self.trade_fraction_pct > 0.0 && self.trade_fraction_pct <= 100.0) {
            return Err(Error::config(format!(
                "trade fraction must be in (0, 100], got {}",
                self.trade_fraction_pct
            )));
        }
        if let Some(amount) = self.fixed_trade_amount {
            if !(amount > 0.0) {
                return Err(Error::config(format!(
                    "fixed trade amount must be positive, got {amount}"
                )));
            }
        }
        if self.slippage_pct < 0.0 {
            return Err(Error::config("slippage must not be negative"));
        }
        Ok(())
    }

    /// Maker fee as a rate.
    pub fn maker_fee_rate(&self) -> f64 {
        self.maker_fee_pct / 100.0
    }

    /// Taker fee as a rate.
    pub fn taker_fee_rate(&self) -> f64 {
        self.taker_fee_pct / 100.0
    }

    /// Trade fraction as a rate.
    pub fn trade_fraction(&self) -> f64 {
        self.trade_fraction_pct / 100.0
    }

    /// Slippage as a rate.
    pub fn slippage_rate(&self) -> f64 {
        self.slippage_pct / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.market, MarketType::UsdMargined);
        assert_relative_eq!(config.maker_fee_rate(), 0.0002);
        assert_relative_eq!(config.taker_fee_rate(), 0.0004);
        assert_relative_eq!(config.trade_fraction(), 0.01);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            Config::from_json_str(r#"{"market": "coin_margined", "initial_balance": 2.5}"#).unwrap();
        assert_eq!(config.market, MarketType::CoinMargined);
        assert_eq!(config.initial_balance, 2.5);
        assert_eq!(config.taker_fee_pct, 0.04);
        assert!(config.fixed_trade_amount.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad = [
            r#"{"initial_balance": 0}"#,
            r#"{"trade_fraction_pct": 150}"#,
            r#"{"maker_fee_pct": -1}"#,
            r#"{"fixed_trade_amount": -5}"#,
            r#"{"slippage_pct": -0.1}"#,
        ];
        for json in bad {
            assert!(matches!(Config::from_json_str(json), Err(Error::Config(_))), "{json}");
        }
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"fixed_trade_amount": 7, "slippage_pct": 0.1}}"#).unwrap();

        let config = Config::from_json_file(file.path()).unwrap();
        assert_eq!(config.fixed_trade_amount, Some(7.0));
        assert_relative_eq!(config.slippage_rate(), 0.001);
    }
}
