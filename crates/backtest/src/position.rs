//! Position records for backtesting.
//!
//! A `Position` is mutated in place by the exchange while it is open and frozen
//! into the trade history once it closes.

use kate_core::{DataPoint, Direction};
use serde::{Deserialize, Serialize};

/// Reason a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    /// Takeprofit level reached.
    TakeProfit,
    /// Stoploss level reached.
    StopLoss,
    /// Liquidation price reached.
    Liquidation,
    /// Still open when the price feed ran out.
    EndOfData,
}

/// A simulated margin position, open or closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Trade direction.
    pub direction: Direction,
    /// Total size including leverage.
    pub size: f64,
    /// Effective leverage (at least 1).
    pub leverage: u32,
    /// Collateral backing the position.
    pub margin: f64,
    /// Entry fill price.
    pub entry_price: f64,
    /// Exit fill price, set once the position closes.
    pub close_price: Option<f64>,
    /// Stoploss level.
    pub stoploss: Option<f64>,
    /// Takeprofit level.
    pub takeprofit: Option<f64>,
    /// Mark-to-market P&L at the last close, zero once closed.
    pub unrealized_pnl: f64,
    /// P&L after fees, set on close.
    pub realized_pnl: f64,
    /// Entry plus exit fees.
    pub total_fee_paid: f64,
    /// Isolated-margin liquidation price.
    pub liquidation_price: f64,
    /// Why the position closed.
    pub exit_reason: Option<ExitReason>,
    /// Index of the tick the position was opened on.
    pub opened_at_tick: usize,
    /// Index of the tick the position was closed on.
    pub closed_at_tick: Option<usize>,
}

impl Position {
    /// Create a fresh open position. The liquidation price is left for the
    /// market model to fill in.
    pub fn new(direction: Direction, entry_price: f64, margin: f64, leverage: u32) -> Self {
        let leverage = leverage.max(1);
        Self {
            direction,
            size: leverage as f64 * margin,
            leverage,
            margin,
            entry_price,
            close_price: None,
            stoploss: None,
            takeprofit: None,
            unrealized_pnl: 0.0,
            realized_pnl: 0.0,
            total_fee_paid: 0.0,
            liquidation_price: 0.0,
            exit_reason: None,
            opened_at_tick: 0,
            closed_at_tick: None,
        }
    }

    /// Is the position still open?
    pub fn is_open(&self) -> bool {
        self.exit_reason.is_none()
    }

    /// Price fees are charged against: the exit price once set, else the entry.
    pub fn reference_price(&self) -> f64 {
        self.close_price.unwrap_or(self.entry_price)
    }

    /// P&L before fees.
    pub fn gross_pnl(&self) -> f64 {
        self.realized_pnl + self.total_fee_paid
    }

    /// Did a trade count as a win?
    pub fn is_win(&self) -> bool {
        self.realized_pnl >= 0.0
    }

    /// Check if takeprofit is triggered within the candle.
    pub fn is_take_profit_hit(&self, tick: &DataPoint) -> bool {
        match (self.direction, self.takeprofit) {
            (Direction::Long, Some(tp)) => tick.high >= tp,
            (Direction::Short, Some(tp)) => tick.low <= tp,
            _ => false,
        }
    }

    /// Check if stoploss is triggered within the candle.
    pub fn is_stopped(&self, tick: &DataPoint) -> bool {
        match (self.direction, self.stoploss) {
            (Direction::Long, Some(stop)) => tick.low <= stop,
            (Direction::Short, Some(stop)) => tick.high >= stop,
            _ => false,
        }
    }

    /// Check if the candle reached the liquidation price.
    pub fn is_liquidated(&self, tick: &DataPoint) -> bool {
        match self.direction {
            Direction::Long => self.liquidation_price >= tick.low,
            Direction::Short => self.liquidation_price <= tick.high,
        }
    }

    /// First exit condition met by the candle.
    ///
    /// Checked in order: takeprofit, stoploss, liquidation.
    pub fn exit_trigger(&self, tick: &DataPoint) -> Option<ExitReason> {
        if self.is_take_profit_hit(tick) {
            Some(ExitReason::TakeProfit)
        } else if self.is_stopped(tick) {
            Some(ExitReason::StopLoss)
        } else if self.is_liquidated(tick) {
            Some(ExitReason::Liquidation)
        } else {
            None
        }
    }
}
