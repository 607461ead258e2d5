//! Strategy interface.
//!
//! Strategies are plugged into the backtester and consulted once per price
//! tick. Any request they return is queued and executed within the same tick.

use crate::position::Position;
use kate_core::{DataPoint, Direction};
use serde::{Deserialize, Serialize};

/// Request to open a market order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OpenPositionRequest {
    /// Direction of the new position.
    pub direction: Direction,
    /// Requested leverage, 0 is treated as 1.
    pub leverage: u32,
}

impl OpenPositionRequest {
    pub fn long(leverage: u32) -> Self {
        Self {
            direction: Direction::Long,
            leverage,
        }
    }

    pub fn short(leverage: u32) -> Self {
        Self {
            direction: Direction::Short,
            leverage,
        }
    }
}

/// Request to set the stoploss of the open position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StoplossRequest {
    pub price: f64,
}

/// Request to set the takeprofit of the open position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TakeProfitRequest {
    pub price: f64,
}

/// Trait implemented by every trading strategy.
pub trait Strategy {
    /// Called first on every tick, before any position check, so indicators can
    /// be updated once and reused.
    fn pre_process_indicators(&mut self, _latest: &DataPoint) {}

    /// Decide whether to open a position. Only called while flat.
    fn open_new_position(&mut self, latest: &DataPoint) -> Option<OpenPositionRequest>;

    /// Decide a stoploss. Only called while a position is open.
    fn set_stoploss(&mut self, _position: &Position) -> Option<StoplossRequest> {
        None
    }

    /// Decide a takeprofit. Only called while a position is open.
    fn set_take_profit(&mut self, _position: &Position) -> Option<TakeProfitRequest> {
        None
    }
}

impl<S: Strategy + ?Sized> Strategy for Box<S> {
    fn pre_process_indicators(&mut self, latest: &DataPoint) {
        (**self).pre_process_indicators(latest)
    }

    fn open_new_position(&mut self, latest: &DataPoint) -> Option<OpenPositionRequest> {
        (**self).open_new_position(latest)
    }

    fn set_stoploss(&mut self, position: &Position) -> Option<StoplossRequest> {
        (**self).set_stoploss(position)
    }

    fn set_take_profit(&mut self, position: &Position) -> Option<TakeProfitRequest> {
        (**self).set_take_profit(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysLong;

    impl Strategy for AlwaysLong {
        fn open_new_position(&mut self, _latest: &DataPoint) -> Option<OpenPositionRequest> {
            Some(OpenPositionRequest::long(3))
        }
    }

    #[test]
    fn test_default_hooks_do_nothing() {
        let mut strategy = AlwaysLong;
        let position = Position::new(Direction::Long, 100.0, 1.0, 3);

        strategy.pre_process_indicators(&DataPoint::flat(100.0));
        assert!(strategy.set_stoploss(&position).is_none());
        assert!(strategy.set_take_profit(&position).is_none());
    }

    #[test]
    fn test_boxed_strategy_delegates() {
        let mut strategy: Box<dyn Strategy> = Box::new(AlwaysLong);
        let request = strategy.open_new_position(&DataPoint::flat(1.0)).unwrap();

        assert_eq!(request.direction, Direction::Long);
        assert_eq!(request.leverage, 3);
        assert_eq!(OpenPositionRequest::short(2).direction, Direction::Short);
    }
}
