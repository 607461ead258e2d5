//! Event-driven backtesting engine for kate.
//!
//! This crate provides:
//! - Ordered event queue and replay driver
//! - USD-margined and coin-margined market models
//! - Simulated margin exchange with stoploss, takeprofit and liquidation
//! - End-of-run statistics

pub mod events;
pub mod exchange;
pub mod market;
pub mod metrics;
pub mod position;
pub mod simulator;
pub mod strategy;

pub use events::{Event, EventQueue};
pub use exchange::ExchangeHandler;
pub use market::{market_model, CoinMargined, FeeKind, MarketModel, UsdMargined};
pub use metrics::{MetricsCalculator, Statistics};
pub use position::{ExitReason, Position};
pub use simulator::{Backtester, RunState};
pub use strategy::{OpenPositionRequest, StoplossRequest, Strategy, TakeProfitRequest};
