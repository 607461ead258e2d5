//! Backtest performance metrics.
//!
//! Calculates end-of-run statistics from the closed trade history.

use crate::position::Position;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics as _;

/// End-of-run statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Return on the initial balance, in percent.
    pub roi_percentage: f64,
    /// Final balance minus initial balance.
    pub net_profit: f64,
    /// Net profit over the standard deviation of the balance curve.
    /// `None` without trades or when the curve is flat.
    pub sharpe_ratio: Option<f64>,
    /// Share of trades with a non-negative realized P&L (0-1).
    /// `None` without trades.
    pub win_rate: Option<f64>,
    /// Largest peak-to-trough decline as a fraction of the peak.
    pub max_drawdown: f64,
    /// Number of closed trades.
    pub total_trades: usize,
    /// Number of price ticks replayed.
    pub total_data_points: usize,
    /// Number of winning trades.
    pub winning_trades: usize,
    /// Balance after the last trade.
    pub final_balance: f64,
    /// Total fees paid.
    pub total_fees: f64,
}

/// Metrics calculator.
#[derive(Debug, Clone, Copy)]
pub struct MetricsCalculator {
    initial_balance: f64,
}

impl MetricsCalculator {
    /// Create a new metrics calculator.
    pub fn new(initial_balance: f64) -> Self {
        Self { initial_balance }
    }

    /// Calculate statistics from closed trades in close order.
    pub fn calculate(&self, trades: &[Position], total_data_points: usize) -> Statistics {
        let curve = self.balance_curve(trades);
        let final_balance = curve.last().copied().unwrap_or(self.initial_balance);
        let net_profit = final_balance - self.initial_balance;

        let winning_trades = trades.iter().filter(|t| t.is_win()).count();
        let total_trades = trades.len();

        let (win_rate, sharpe_ratio) = if total_trades == 0 {
            (None, None)
        } else {
            let deviation = std_dev(&curve);
            let sharpe = (deviation.is_finite() && deviation > 0.0).then(|| net_profit / deviation);
            (Some(winning_trades as f64 / total_trades as f64), sharpe)
        };

        Statistics {
            roi_percentage: 100.0 * net_profit / self.initial_balance,
            net_profit,
            sharpe_ratio,
            win_rate,
            max_drawdown: max_drawdown(&curve),
            total_trades,
            total_data_points,
            winning_trades,
            final_balance,
            total_fees: trades.iter().map(|t| t.total_fee_paid).sum(),
        }
    }

    /// Balance after each trade, starting with the initial balance.
    pub fn balance_curve(&self, trades: &[Position]) -> Vec<f64> {
        let mut curve = Vec::with_capacity(trades.len() + 1);
        let mut balance = self.initial_balance;
        curve.push(balance);

        for trade in trades {
            balance += trade.realized_pnl;
            curve.push(balance);
        }

        curve
    }
}

/// Largest `(peak - trough) / peak`, where the trough is the lowest balance
/// seen since that peak.
pub fn max_drawdown(curve: &[f64]) -> f64 {
    let Some(&first) = curve.first() else {
        return 0.0;
    };

    let mut peak = first;
    let mut trough = first;
    let mut worst = 0.0_f64;

    for &balance in &curve[1..] {
        if balance > peak {
            peak = balance;
            trough = balance;
        } else if balance < trough {
            trough = balance;
            if peak > 0.0 {
                worst = worst.max((peak - trough) / peak);
            }
        }
    }

    worst
}

/// Arithmetic mean (divides by n). NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    values.mean()
}

/// Sample standard deviation (variance divides by n - 1). NaN for fewer than
/// two values.
pub fn std_dev(values: &[f64]) -> f64 {
    values.std_dev()
}
