//! Backtest simulator.
//!
//! Replays a price feed through the event queue, the exchange and a strategy,
//! then computes end-of-run statistics.

use crate::events::{Event, EventQueue};
use crate::exchange::ExchangeHandler;
use crate::metrics::{MetricsCalculator, Statistics};
use crate::position::Position;
use crate::strategy::Strategy;
use kate_core::{Config, DataPoint, Result};
use kate_ingestion::PriceFeed;
use tracing::{debug, info};

/// Phase of a backtest run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No tick consumed yet.
    Priming,
    /// Replaying the feed.
    Running,
    /// Feed exhausted, statistics computed.
    Done,
}

/// Event-driven backtester over a single instrument.
pub struct Backtester<S: Strategy> {
    config: Config,
    strategy: S,
    feed: PriceFeed,
    queue: EventQueue,
    exchange: ExchangeHandler,
    state: RunState,
}

impl<S: Strategy> Backtester<S> {
    /// Create a backtester. Fails if the configuration is out of range.
    pub fn new(strategy: S, feed: PriceFeed, config: Config) -> Result<Self> {
        config.validate()?;
        let exchange = ExchangeHandler::new(&config);

        Ok(Self {
            config,
            strategy,
            feed,
            queue: EventQueue::new(),
            exchange,
            state: RunState::Priming,
        })
    }

    /// Replay the whole feed and return the statistics.
    ///
    /// Every call starts from a fresh exchange and a rewound feed. The
    /// strategy keeps whatever internal state it carries.
    pub fn run(&mut self) -> Result<Statistics> {
        self.reset();
        info!(
            points = self.feed.len(),
            market = ?self.config.market,
            balance = self.config.initial_balance,
            "starting backtest"
        );

        while let Some(tick) = self.feed.next_point() {
            if self.state == RunState::Priming {
                self.state = RunState::Running;
            }
            self.queue.enqueue(Event::PriceTick(tick));

            while self.queue.has_pending() {
                let event = self.queue.dequeue()?;
                self.dispatch(event)?;
            }
        }

        self.exchange.settle_open_position();
        self.state = RunState::Done;

        let stats = MetricsCalculator::new(self.config.initial_balance)
            .calculate(self.exchange.trade_history(), self.exchange.ticks_seen());

        info!(
            trades = stats.total_trades,
            net_profit = stats.net_profit,
            roi = stats.roi_percentage,
            max_drawdown = stats.max_drawdown,
            "backtest finished"
        );
        Ok(stats)
    }

    fn reset(&mut self) {
        self.queue.clear();
        self.feed.reset();
        self.exchange = ExchangeHandler::new(&self.config);
        self.state = RunState::Priming;
    }

    fn dispatch(&mut self, event: Event) -> Result<()> {
        let outcome = match event {
            Event::PriceTick(tick) => {
                self.on_price_tick(&tick);
                Ok(())
            }
            Event::OpenPosition(request) => self
                .exchange
                .open_market_order(request.direction, request.leverage)
                .map(|_| ()),
            Event::SetStoploss(request) => self.exchange.set_stoploss(request.price),
            Event::SetTakeProfit(request) => self.exchange.set_take_profit(request.price),
        };

        match outcome {
            Err(e) if e.is_recoverable() => {
                debug!(error = %e, "order rejected");
                Ok(())
            }
            other => other,
        }
    }

    fn on_price_tick(&mut self, tick: &DataPoint) {
        self.exchange.on_price_tick(tick);
        self.strategy.pre_process_indicators(tick);

        match self.exchange.open_position() {
            None => {
                if let Some(request) = self.strategy.open_new_position(tick) {
                    self.queue.enqueue(request);
                }
            }
            Some(position) => {
                let stoploss = self.strategy.set_stoploss(position);
                let takeprofit = self.strategy.set_take_profit(position);
                if let Some(request) = stoploss {
                    self.queue.enqueue(request);
                }
                if let Some(request) = takeprofit {
                    self.queue.enqueue(request);
                }
            }
        }
    }

    /// Closed trades of the latest run.
    pub fn trades(&self) -> &[Position] {
        self.exchange.trade_history()
    }

    /// Balance at the end of the latest run.
    pub fn balance(&self) -> f64 {
        self.exchange.balance()
    }

    /// The simulated exchange.
    pub fn exchange(&self) -> &ExchangeHandler {
        &self.exchange
    }

    /// Current phase.
    pub fn state(&self) -> RunState {
        self.state
    }
}

impl<S: Strategy> std::fmt::Debug for Backtester<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backtester")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("pending_events", &self.queue.len())
            .field("ticks_seen", &self.exchange.ticks_seen())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::ExitReason;
    use crate::strategy::{OpenPositionRequest, StoplossRequest, TakeProfitRequest};
    use approx::assert_relative_eq;
    use kate_core::{Direction, Error};

    /// Goes long with 30x when the close rises, with a 0.5 % bracket.
    #[derive(Default)]
    struct Momentum {
        last: Option<DataPoint>,
        current: Option<DataPoint>,
        ticks_seen: usize,
    }

    impl Strategy for Momentum {
        fn pre_process_indicators(&mut self, latest: &DataPoint) {
            self.last = self.current.replace(*latest);
            self.ticks_seen += 1;
        }

        fn open_new_position(&mut self, _latest: &DataPoint) -> Option<OpenPositionRequest> {
            match (self.last, self.current) {
                (Some(last), Some(current)) if current.close > last.close => {
                    Some(OpenPositionRequest::long(30))
                }
                _ => None,
            }
        }

        fn set_stoploss(&mut self, position: &Position) -> Option<StoplossRequest> {
            (position.direction == Direction::Long && position.stoploss.is_none()).then(|| {
                StoplossRequest {
                    price: position.entry_price * 0.995,
                }
            })
        }

        fn set_take_profit(&mut self, position: &Position) -> Option<TakeProfitRequest> {
            (position.direction == Direction::Long && position.takeprofit.is_none()).then(|| {
                TakeProfitRequest {
                    price: position.entry_price * 1.005,
                }
            })
        }
    }

    /// Opens one long at the first tick and never sets exit levels.
    struct BuyAndHold {
        leverage: u32,
    }

    impl Strategy for BuyAndHold {
        fn open_new_position(&mut self, _latest: &DataPoint) -> Option<OpenPositionRequest> {
            Some(OpenPositionRequest::long(self.leverage))
        }
    }

    fn candle(close: f64, spread: f64) -> DataPoint {
        DataPoint::new(close, close + spread, close - spread, close, 10.0)
    }

    fn wavy_feed() -> PriceFeed {
        let closes = [
            100.0, 100.4, 100.9, 101.2, 100.7, 100.1, 100.3, 100.8, 101.5, 101.1, 100.2, 99.6,
            99.9, 100.5, 100.9, 101.6, 101.0, 100.4, 100.6, 101.2, 101.9, 101.3,
        ];
        closes.iter().map(|&c| candle(c, 0.3)).collect::<Vec<_>>().into()
    }

    fn config(balance: f64) -> Config {
        Config {
            initial_balance: balance,
            fixed_trade_amount: Some(5.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_momentum_run_invariants() {
        let mut backtester = Backtester::new(Momentum::default(), wavy_feed(), config(1000.0)).unwrap();
        assert_eq!(backtester.state(), RunState::Priming);

        let stats = backtester.run().unwrap();

        assert_eq!(backtester.state(), RunState::Done);
        assert_eq!(stats.total_data_points, 22);
        assert_eq!(stats.total_trades, backtester.trades().len());
        assert!(stats.total_trades > 0);
        assert!(backtester.exchange().open_position().is_none());

        let realized: f64 = backtester.trades().iter().map(|t| t.realized_pnl).sum();
        assert_relative_eq!(backtester.balance(), 1000.0 + realized, epsilon = 1e-9);
        assert_relative_eq!(stats.net_profit, realized, epsilon = 1e-9);
        assert_relative_eq!(stats.roi_percentage, realized / 10.0, epsilon = 1e-9);
        assert!(stats.win_rate.is_some());

        for trade in backtester.trades() {
            assert!(trade.exit_reason.is_some());
            assert!(trade.closed_at_tick.unwrap() >= trade.opened_at_tick);
            assert_relative_eq!(trade.margin, 5.0);
            assert_relative_eq!(trade.size, 150.0);
        }
    }

    #[test]
    fn test_orders_execute_on_the_same_tick() {
        let feed: PriceFeed = vec![candle(100.0, 0.0), candle(101.0, 0.0)].into();
        let mut backtester = Backtester::new(Momentum::default(), feed, config(100.0)).unwrap();
        backtester.run().unwrap();

        // Rise on tick 1 opens at tick 1's close, then the feed ends
        let trade = &backtester.trades()[0];
        assert_eq!(trade.opened_at_tick, 1);
        assert_relative_eq!(trade.entry_price, 101.0);
        assert_eq!(trade.exit_reason, Some(ExitReason::EndOfData));
        assert_eq!(trade.closed_at_tick, Some(1));
    }

    #[test]
    fn test_exit_levels_set_on_next_tick() {
        let feed: PriceFeed = vec![
            candle(100.0, 0.0),
            candle(101.0, 0.0),
            candle(101.2, 0.0),
            DataPoint::new(101.2, 101.6, 101.1, 101.15, 1.0),
        ]
        .into();
        let mut backtester = Backtester::new(Momentum::default(), feed, config(100.0)).unwrap();
        let stats = backtester.run().unwrap();

        assert_eq!(stats.total_trades, 1);
        let trade = &backtester.trades()[0];
        assert_relative_eq!(trade.stoploss.unwrap(), 101.0 * 0.995, epsilon = 1e-9);
        assert_relative_eq!(trade.takeprofit.unwrap(), 101.0 * 1.005, epsilon = 1e-9);
        assert_eq!(trade.exit_reason, Some(ExitReason::TakeProfit));
        // Target 101.505 is touched by the high, the fill is the close
        assert_eq!(trade.close_price, Some(101.15));
        assert_eq!(trade.closed_at_tick, Some(3));
        assert_eq!(stats.win_rate, Some(1.0));
    }

    #[test]
    fn test_open_position_settled_at_end() {
        let feed: PriceFeed = vec![candle(100.0, 1.0), candle(102.0, 1.0), candle(104.0, 1.0)].into();
        let mut backtester =
            Backtester::new(BuyAndHold { leverage: 2 }, feed, Config::default()).unwrap();
        let stats = backtester.run().unwrap();

        assert_eq!(stats.total_trades, 1);
        let trade = &backtester.trades()[0];
        assert_eq!(trade.exit_reason, Some(ExitReason::EndOfData));
        assert_eq!(trade.close_price, Some(104.0));
        assert!(stats.net_profit > 0.0);
    }

    #[test]
    fn test_empty_feed() {
        let mut backtester =
            Backtester::new(BuyAndHold { leverage: 1 }, PriceFeed::default(), Config::default()).unwrap();
        let stats = backtester.run().unwrap();

        assert_eq!(backtester.state(), RunState::Done);
        assert_eq!(stats.total_data_points, 0);
        assert_eq!(stats.total_trades, 0);
        assert_eq!(stats.win_rate, None);
        assert_eq!(stats.sharpe_ratio, None);
    }

    #[test]
    fn test_rerun_is_deterministic() {
        let mut backtester = Backtester::new(Momentum::default(), wavy_feed(), config(1000.0)).unwrap();
        let first = backtester.run().unwrap();
        let first_trades = backtester.trades().to_vec();

        let second = backtester.run().unwrap();
        assert_eq!(first, second);
        assert_eq!(first_trades, backtester.trades());
        assert_eq!(backtester.strategy.ticks_seen, 44);
    }

    #[test]
    fn test_rejected_orders_do_not_abort() {
        // Short stop below the price is rejected on every tick
        struct BadStop;

        impl Strategy for BadStop {
            fn open_new_position(&mut self, _latest: &DataPoint) -> Option<OpenPositionRequest> {
                Some(OpenPositionRequest::short(1))
            }

            fn set_stoploss(&mut self, position: &Position) -> Option<StoplossRequest> {
                Some(StoplossRequest {
                    price: position.entry_price * 0.5,
                })
            }
        }

        let mut backtester = Backtester::new(BadStop, wavy_feed(), Config::default()).unwrap();
        let stats = backtester.run().unwrap();

        assert_eq!(stats.total_trades, 1);
        assert_eq!(backtester.trades()[0].stoploss, None);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = Config {
            initial_balance: -5.0,
            ..Default::default()
        };
        let result = Backtester::new(BuyAndHold { leverage: 1 }, wavy_feed(), config);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
