//! Simulated single-instrument margin exchange.
//!
//! Owns the balance, the (at most one) open position and the trade history.
//! Every rejected request returns an error and leaves the exchange untouched.

use crate::market::{market_model, FeeKind, MarketModel};
use crate::position::{ExitReason, Position};
use kate_core::{Config, DataPoint, Direction, Error, MarketType, Result};
use tracing::{debug, info, trace, warn};

/// Exchange state for one backtest run.
#[derive(Debug)]
pub struct ExchangeHandler {
    market: Box<dyn MarketModel>,
    balance: f64,
    /// Fraction of the balance used as margin per trade (0.01 = 1 %).
    trade_fraction: f64,
    fixed_trade_amount: Option<f64>,
    /// Adverse price move applied to market fills (0.001 = 0.1 %).
    slippage: f64,
    open_position: Option<Position>,
    trade_history: Vec<Position>,
    /// Close of the latest tick, used to validate orders.
    current_price: Option<f64>,
    ticks_seen: usize,
}

impl ExchangeHandler {
    /// Create an exchange from a run configuration.
    pub fn new(config: &Config) -> Self {
        let market = market_model(config.market, config.maker_fee_rate(), config.taker_fee_rate());
        Self::with_market(market, config)
    }

    /// Create an exchange with a custom market model.
    pub fn with_market(market: Box<dyn MarketModel>, config: &Config) -> Self {
        Self {
            market,
            balance: config.initial_balance,
            trade_fraction: config.trade_fraction(),
            fixed_trade_amount: config.fixed_trade_amount,
            slippage: config.slippage_rate(),
            open_position: None,
            trade_history: Vec::new(),
            current_price: None,
            ticks_seen: 0,
        }
    }

    /// Apply a new candle: check exits on the open position, then mark it to market.
    ///
    /// Exits are detected on the candle range and filled at its close. At most
    /// one exit happens per tick. Returns the exit reason if the position was
    /// closed.
    pub fn on_price_tick(&mut self, tick: &DataPoint) -> Option<ExitReason> {
        self.current_price = Some(tick.close);
        self.ticks_seen += 1;

        let position = self.open_position.as_mut()?;
        match position.exit_trigger(tick) {
            Some(reason) => {
                let (fill_price, fee_kind) = match reason {
                    ExitReason::TakeProfit => (tick.close, FeeKind::Maker),
                    ExitReason::StopLoss | ExitReason::EndOfData => {
                        (self.market_exit_price(tick.close), FeeKind::Taker)
                    }
                    ExitReason::Liquidation => {
                        (self.market_exit_price(tick.close), FeeKind::Liquidation)
                    }
                };
                self.close_position(fill_price, fee_kind, reason);
                Some(reason)
            }
            None => {
                position.unrealized_pnl = self.market.unrealized_pnl(position, tick.close);
                trace!(close = tick.close, pnl = position.unrealized_pnl, "marked position");
                None
            }
        }
    }

    /// Open a position at the current price with a market order.
    pub fn open_market_order(&mut self, direction: Direction, leverage: u32) -> Result<&Position> {
        if self.open_position.is_some() {
            return Err(Error::PositionAlreadyOpen);
        }
        if self.balance <= 1.0 {
            return Err(Error::InsufficientBalance {
                balance: self.balance,
            });
        }
        let current_price = self.current_price.ok_or(Error::NoMarketPrice)?;

        let (stake, fraction) = match self.fixed_trade_amount {
            Some(amount) => (amount, 1.0),
            None => (self.balance, self.trade_fraction),
        };
        let entry_price = current_price * (1.0 + direction.sign() * self.slippage);

        let mut position =
            self.market
                .create_position(direction, entry_price, stake, fraction, leverage.max(1));
        position.total_fee_paid = self.market.fee(&position, FeeKind::Taker);
        position.opened_at_tick = self.current_tick();

        info!(
            %direction,
            entry = position.entry_price,
            size = position.size,
            leverage = position.leverage,
            liquidation = position.liquidation_price,
            "opened position"
        );
        Ok(self.open_position.insert(position))
    }

    /// Set the stoploss of the open position.
    ///
    /// Longs need a stop at or below the current price, shorts at or above it.
    pub fn set_stoploss(&mut self, price: f64) -> Result<()> {
        let current = self.current_price.unwrap_or(0.0);
        let position = self.open_position.as_mut().ok_or(Error::NoOpenPosition)?;

        let valid = match position.direction {
            Direction::Long => price <= current,
            Direction::Short => price >= current,
        };
        if !valid {
            return Err(Error::InvalidStopPrice {
                price,
                current,
                direction: position.direction,
            });
        }

        position.stoploss = Some(price);
        debug!(price, "stoploss set");
        Ok(())
    }

    /// Set the takeprofit of the open position.
    ///
    /// Longs need a target at or above the current price, shorts at or below it.
    pub fn set_take_profit(&mut self, price: f64) -> Result<()> {
        let current = self.current_price.unwrap_or(0.0);
        let position = self.open_position.as_mut().ok_or(Error::NoOpenPosition)?;

        let valid = match position.direction {
            Direction::Long => price >= current,
            Direction::Short => price <= current,
        };
        if !valid {
            return Err(Error::InvalidTakeProfitPrice {
                price,
                current,
                direction: position.direction,
            });
        }

        position.takeprofit = Some(price);
        debug!(price, "takeprofit set");
        Ok(())
    }

    /// Close whatever is still open at the latest price with a market order.
    pub fn settle_open_position(&mut self) -> Option<&Position> {
        let current_price = self.current_price?;
        self.open_position.as_ref()?;

        warn!(price = current_price, "closing position left open at end of data");
        let fill_price = self.market_exit_price(current_price);
        self.close_position(fill_price, FeeKind::Taker, ExitReason::EndOfData);
        self.trade_history.last()
    }

    fn close_position(&mut self, close_price: f64, fee_kind: FeeKind, reason: ExitReason) {
        let Some(mut position) = self.open_position.take() else {
            return;
        };

        position.close_price = Some(close_price);
        position.unrealized_pnl = self.market.unrealized_pnl(&position, close_price);
        position.total_fee_paid += self.market.fee(&position, fee_kind);
        position.realized_pnl = position.unrealized_pnl - position.total_fee_paid;
        position.unrealized_pnl = 0.0;
        position.exit_reason = Some(reason);
        position.closed_at_tick = Some(self.current_tick());

        self.balance += position.realized_pnl;

        info!(
            ?reason,
            close = close_price,
            pnl = position.realized_pnl,
            fees = position.total_fee_paid,
            balance = self.balance,
            "closed position"
        );
        self.trade_history.push(position);
    }

    /// Exit price of a market order on the open position after slippage.
    fn market_exit_price(&self, price: f64) -> f64 {
        match &self.open_position {
            Some(position) => price * (1.0 - position.direction.sign() * self.slippage),
            None => price,
        }
    }

    fn current_tick(&self) -> usize {
        self.ticks_seen.saturating_sub(1)
    }

    /// Current balance.
    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// The open position, if any.
    pub fn open_position(&self) -> Option<&Position> {
        self.open_position.as_ref()
    }

    /// Closed positions in close order.
    pub fn trade_history(&self) -> &[Position] {
        &self.trade_history
    }

    /// Close of the latest tick.
    pub fn current_price(&self) -> Option<f64> {
        self.current_price
    }

    /// Number of ticks applied so far.
    pub fn ticks_seen(&self) -> usize {
        self.ticks_seen
    }

    /// Simulated market.
    pub fn market_type(&self) -> MarketType {
        self.market.market_type()
    }
}
