//! Market models for backtesting.
//!
//! Position sizing, P&L, liquidation and fee formulas for USD-margined
//! (linear) and coin-margined (inverse) contracts. Liquidation prices assume
//! isolated margin with a fixed maintenance margin rate.

use crate::position::Position;
use kate_core::{Direction, MarketType, MAINTENANCE_MARGIN_RATE};

/// Which fee schedule applies to a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeKind {
    /// Resting limit order.
    Maker,
    /// Market order.
    Taker,
    /// Forced close by the exchange.
    Liquidation,
}

/// Maker/taker fee rates (0.0004 = 0.04 %).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeSchedule {
    /// Maker fee rate.
    pub maker_rate: f64,
    /// Taker fee rate.
    pub taker_rate: f64,
}

/// Market-specific formulas used by the exchange.
pub trait MarketModel: std::fmt::Debug + Send + Sync {
    /// Which market this model simulates.
    fn market_type(&self) -> MarketType;

    /// Fee rates for this market.
    fn fees(&self) -> FeeSchedule;

    /// Size a new position committing `fraction` of `balance` as margin.
    fn create_position(
        &self,
        direction: Direction,
        current_price: f64,
        balance: f64,
        fraction: f64,
        leverage: u32,
    ) -> Position;

    /// Mark-to-market P&L of `position` at `price`.
    fn unrealized_pnl(&self, position: &Position, price: f64) -> f64;

    /// Isolated-margin liquidation price.
    fn liquidation_price(&self, position: &Position) -> f64;

    /// Fee for a market (taker) fill.
    fn market_fee(&self, position: &Position) -> f64 {
        position.size * position.reference_price() * self.fees().taker_rate
    }

    /// Fee for a limit (maker) fill.
    fn limit_fee(&self, position: &Position) -> f64 {
        position.size * position.reference_price() * self.fees().maker_rate
    }

    /// Fee charged when the exchange liquidates the position.
    fn liquidation_fee(&self, position: &Position) -> f64 {
        2.0 * self.market_fee(position)
    }

    /// Fee of the given kind.
    fn fee(&self, position: &Position, kind: FeeKind) -> f64 {
        match kind {
            FeeKind::Maker => self.limit_fee(position),
            FeeKind::Taker => self.market_fee(position),
            FeeKind::Liquidation => self.liquidation_fee(position),
        }
    }
}

/// Linear contract margined in the quote currency.
#[derive(Debug, Clone)]
pub struct UsdMargined {
    fees: FeeSchedule,
}

impl UsdMargined {
    /// Create a new USD-margined model.
    pub fn new(maker_rate: f64, taker_rate: f64) -> Self {
        Self {
            fees: FeeSchedule {
                maker_rate,
                taker_rate,
            },
        }
    }
}

impl MarketModel for UsdMargined {
    fn market_type(&self) -> MarketType {
        MarketType::UsdMargined
    }

    fn fees(&self) -> FeeSchedule {
        self.fees
    }

    fn create_position(
        &self,
        direction: Direction,
        current_price: f64,
        balance: f64,
        fraction: f64,
        leverage: u32,
    ) -> Position {
        let margin = balance * fraction;
        let mut position = Position::new(direction, current_price, margin, leverage);
        position.liquidation_price = self.liquidation_price(&position);
        position
    }

    fn unrealized_pnl(&self, position: &Position, price: f64) -> f64 {
        position.size * (price - position.entry_price) * position.direction.sign()
    }

    fn liquidation_price(&self, position: &Position) -> f64 {
        let imr = 1.0 / position.leverage.max(1) as f64;
        match position.direction {
            Direction::Long => position.entry_price * (1.0 - imr + MAINTENANCE_MARGIN_RATE),
            Direction::Short => position.entry_price * (1.0 + imr - MAINTENANCE_MARGIN_RATE),
        }
    }
}

/// Inverse contract margined in the base coin.
#[derive(Debug, Clone)]
pub struct CoinMargined {
    fees: FeeSchedule,
}

impl CoinMargined {
    /// Create a new coin-margined model.
    pub fn new(maker_rate: f64, taker_rate: f64) -> Self {
        Self {
            fees: FeeSchedule {
                maker_rate,
                taker_rate,
            },
        }
    }
}

impl MarketModel for CoinMargined {
    fn market_type(&self) -> MarketType {
        MarketType::CoinMargined
    }

    fn fees(&self) -> FeeSchedule {
        self.fees
    }

    fn create_position(
        &self,
        direction: Direction,
        current_price: f64,
        balance: f64,
        fraction: f64,
        leverage: u32,
    ) -> Position {
        let margin = balance * fraction / current_price;
        let mut position = Position::new(direction, current_price, margin, leverage);
        position.liquidation_price = self.liquidation_price(&position);
        position
    }

    fn unrealized_pnl(&self, position: &Position, price: f64) -> f64 {
        let inverse_diff = 1.0 / position.entry_price - 1.0 / price;
        position.size * inverse_diff * position.direction.sign()
    }

    fn liquidation_price(&self, position: &Position) -> f64 {
        let leverage = position.leverage.max(1) as f64;
        let notional = position.entry_price * leverage;
        match position.direction {
            Direction::Long => notional / (leverage + 1.0 - MAINTENANCE_MARGIN_RATE * leverage),
            Direction::Short => notional / (leverage - 1.0 + MAINTENANCE_MARGIN_RATE * leverage),
        }
    }
}

/// Build the model for `market`.
pub fn market_model(market: MarketType, maker_rate: f64, taker_rate: f64) -> Box<dyn MarketModel> {
    match market {
        MarketType::UsdMargined => Box::new(UsdMargined::new(maker_rate, taker_rate)),
        MarketType::CoinMargined => Box::new(CoinMargined::new(maker_rate, taker_rate)),
    }
}
