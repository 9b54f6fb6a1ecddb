//! Offline backtesting of sentiment signals.
//!
//! [`Backtester::run`] fills each signal from a price series and returns the
//! filled signals with a [`PerformanceSummary`].

pub mod engine;
pub mod formatter;
pub mod metrics;

pub use engine::{BacktestReport, Backtester};
pub use formatter::SummaryFormatter;
pub use metrics::{
    max_drawdown, profit_factor, sharpe_ratio, DirectionBreakdown, PerformanceSummary,
};
