//! Performance metrics over closed signals.
//!
//! A summary is always recomputed from the full set of closed signals of one
//! run. Every ratio has a defined neutral value so an empty or degenerate
//! run never yields NaN.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use yieldsense_core::{stats, BacktestConfig, Direction, Signal};

/// Aggregate performance of one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    // Counts
    /// Closed signals with both fills.
    pub total_trades: usize,
    /// Closed signals with `pnl > 0`.
    pub winning_trades: usize,
    /// Closed signals with `pnl < 0`.
    pub losing_trades: usize,
    /// Signals whose exit lies beyond the price history.
    pub open_positions: usize,

    // Ratios
    /// `winning_trades / total_trades`, as a fraction.
    pub win_rate: f64,
    /// Mean of per-trade `return_pct`.
    pub avg_return: f64,
    /// `mean / std * sqrt(trades_per_year)` of per-trade returns.
    pub sharpe_ratio: f64,
    /// Gross profit over gross loss; the configured sentinel with no losers.
    pub profit_factor: f64,

    // Money
    pub total_pnl: Decimal,
    /// Most negative gap between cumulative P&L and its running peak (<= 0).
    pub max_drawdown: Decimal,

    // Trade shape
    pub avg_hold_hours: f64,
    pub best_trade: Option<f64>,
    pub worst_trade: Option<f64>,

    /// Per-direction breakdown, long first.
    pub by_direction: Vec<DirectionBreakdown>,
}

/// Performance of the trades taken in one direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionBreakdown {
    pub direction: Direction,
    pub trades: usize,
    pub win_rate: f64,
    pub avg_return: f64,
    pub total_pnl: Decimal,
}

impl PerformanceSummary {
    /// Summary of a run with no closed trades.
    #[must_use]
    pub fn empty(open_positions: usize) -> Self {
        Self {
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            open_positions,
            win_rate: 0.0,
            avg_return: 0.0,
            sharpe_ratio: 0.0,
            profit_factor: 0.0,
            total_pnl: Decimal::ZERO,
            max_drawdown: Decimal::ZERO,
            avg_hold_hours: 0.0,
            best_trade: None,
            worst_trade: None,
            by_direction: Vec::new(),
        }
    }

    /// Computes the summary from closed signals.
    ///
    /// Signals without a `pnl` are ignored. Drawdown replays the rest in
    /// `generated_at` order regardless of input order.
    #[must_use]
    pub fn from_signals(signals: &[Signal], open_positions: usize, config: &BacktestConfig) -> Self {
        let mut closed: Vec<&Signal> = signals
            .iter()
            .filter(|s| s.direction.is_directional() && s.pnl.is_some())
            .collect();
        if closed.is_empty() {
            return Self::empty(open_positions);
        }
        closed.sort_by_key(|s| s.generated_at);

        let pnls: Vec<Decimal> = closed.iter().filter_map(|s| s.pnl).collect();
        let returns: Vec<f64> = closed.iter().filter_map(|s| s.return_pct).collect();
        let holds: Vec<f64> = closed.iter().filter_map(|s| s.hold_hours()).collect();

        let total_trades = closed.len();
        let winning_trades = pnls.iter().filter(|p| **p > Decimal::ZERO).count();
        let losing_trades = pnls.iter().filter(|p| **p < Decimal::ZERO).count();

        let by_direction = [Direction::Long, Direction::Short]
            .into_iter()
            .filter_map(|direction| {
                let subset: Vec<&Signal> = closed
                    .iter()
                    .copied()
                    .filter(|s| s.direction == direction)
                    .collect();
                DirectionBreakdown::from_closed(direction, &subset)
            })
            .collect();

        Self {
            total_trades,
            winning_trades,
            losing_trades,
            open_positions,
            win_rate: winning_trades as f64 / total_trades as f64,
            avg_return: stats::mean(&returns),
            sharpe_ratio: sharpe_ratio(&returns, config.trades_per_year),
            profit_factor: profit_factor(&pnls, config.profit_factor_sentinel),
            total_pnl: pnls.iter().copied().sum(),
            max_drawdown: max_drawdown(&pnls),
            avg_hold_hours: stats::mean(&holds),
            best_trade: returns.iter().copied().reduce(f64::max),
            worst_trade: returns.iter().copied().reduce(f64::min),
            by_direction,
        }
    }
}

impl DirectionBreakdown {
    fn from_closed(direction: Direction, closed: &[&Signal]) -> Option<Self> {
        if closed.is_empty() {
            return None;
        }
        let returns: Vec<f64> = closed.iter().filter_map(|s| s.return_pct).collect();
        let wins = closed
            .iter()
            .filter(|s| s.pnl.is_some_and(|p| p > Decimal::ZERO))
            .count();
        Some(Self {
            direction,
            trades: closed.len(),
            win_rate: wins as f64 / closed.len() as f64,
            avg_return: stats::mean(&returns),
            total_pnl: closed.iter().filter_map(|s| s.pnl).sum(),
        })
    }
}

/// Annualised Sharpe ratio of per-trade returns.
///
/// Zero with fewer than two returns or zero standard deviation.
#[must_use]
pub fn sharpe_ratio(returns: &[f64], trades_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std_dev = stats::std_dev(returns);
    if std_dev < stats::EPSILON {
        return 0.0;
    }
    stats::mean(returns) / std_dev * trades_per_year.sqrt()
}

/// Maximum drawdown of the cumulative P&L curve, reported as a value <= 0.
///
/// The curve starts at zero, so an opening loss is a drawdown.
#[must_use]
pub fn max_drawdown(pnls: &[Decimal]) -> Decimal {
    let mut peak = Decimal::ZERO;
    let mut equity = Decimal::ZERO;
    let mut max_dd = Decimal::ZERO;

    for pnl in pnls {
        equity += *pnl;
        if equity > peak {
            peak = equity;
        }
        let drawdown = equity - peak;
        if drawdown < max_dd {
            max_dd = drawdown;
        }
    }

    max_dd
}

/// Gross profit divided by gross loss.
///
/// Returns `sentinel` whenever there are trades but no losing one, breakeven
/// runs included. An empty slice is zero.
#[must_use]
pub fn profit_factor(pnls: &[Decimal], sentinel: f64) -> f64 {
    if pnls.is_empty() {
        return 0.0;
    }
    let gross_profit: Decimal = pnls.iter().filter(|p| **p > Decimal::ZERO).sum();
    let gross_loss: Decimal = pnls.iter().filter(|p| **p < Decimal::ZERO).map(|p| -*p).sum();

    if gross_loss.is_zero() {
        return sentinel;
    }
    (gross_profit / gross_loss).to_f64().unwrap_or(sentinel)
}
