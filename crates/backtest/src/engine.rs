//! Offline replay of signals against a price series.
//!
//! Fills never look ahead: the entry is the first price at or after
//! `generated_at`, the exit the first price at or after
//! `generated_at + holding_hours`. A signal whose exit falls past the end
//! of the series stays open and is not scored.

use chrono::Duration;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use yieldsense_core::{
    AnalyticsError, BacktestConfig, Direction, MarketObservation, MarketSeries, Result, Signal,
};

use crate::metrics::PerformanceSummary;

/// Filled signals and their aggregate performance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    /// Input signals in input order, with fills where available
    pub signals: Vec<Signal>,
    pub summary: PerformanceSummary,
}

impl BacktestReport {
    /// Signals with both fills.
    pub fn closed(&self) -> impl Iterator<Item = &Signal> {
        self.signals.iter().filter(|s| s.is_closed())
    }
}

/// Replays signals against a single-instrument price series.
#[derive(Debug, Clone)]
pub struct Backtester {
    config: BacktestConfig,
    cost_rate: Decimal,
}

impl Backtester {
    /// # Errors
    /// Returns `InvalidConfiguration` if the section does not validate.
    pub fn new(config: BacktestConfig) -> Result<Self> {
        config.validate()?;
        let cost_rate = Decimal::try_from(config.transaction_cost_pct).map_err(|e| {
            AnalyticsError::invalid_config(format!("backtest.transaction_cost_pct: {e}"))
        })?;
        Ok(Self { config, cost_rate })
    }

    #[must_use]
    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Fills every signal and summarises the closed ones.
    ///
    /// `holding_hours` overrides the horizon stamped on each signal.
    ///
    /// # Errors
    /// * `InvalidConfiguration` for a zero holding period
    /// * `InvalidInput` if a price cannot be represented as a decimal
    /// * `OutOfRange` if an exit time falls outside the calendar
    pub fn run(
        &self,
        signals: &[Signal],
        prices: &MarketSeries,
        holding_hours: u32,
    ) -> Result<BacktestReport> {
        if holding_hours == 0 {
            return Err(AnalyticsError::invalid_config(
                "holding_hours must be positive",
            ));
        }

        let mut filled = Vec::with_capacity(signals.len());
        let mut open_positions = 0;

        for signal in signals {
            let mut signal = signal.clone();
            signal.holding_hours = holding_hours;

            if !signal.direction.is_directional() {
                debug!(at = %signal.generated_at, "flat signal, no trade");
                filled.push(signal);
                continue;
            }

            let Some(entry) = prices.at_or_after(signal.generated_at) else {
                debug!(at = %signal.generated_at, "no price at or after signal, position never opened");
                open_positions += 1;
                filled.push(signal);
                continue;
            };
            let entry_price = to_decimal(entry)?;
            signal.entry_price = Some(entry_price);
            signal.entry_time = Some(entry.timestamp);

            let exit_due = Duration::try_hours(i64::from(holding_hours))
                .and_then(|hold| signal.generated_at.checked_add_signed(hold))
                .ok_or_else(|| {
                    AnalyticsError::out_of_range(format!(
                        "{holding_hours}h holding period from {} is past the representable range",
                        signal.generated_at
                    ))
                })?;
            let Some(exit) = prices.at_or_after(exit_due) else {
                debug!(at = %signal.generated_at, exit_due = %exit_due, "exit beyond price history, left open");
                open_positions += 1;
                filled.push(signal);
                continue;
            };
            let exit_price = to_decimal(exit)?;
            signal.exit_price = Some(exit_price);
            signal.exit_time = Some(exit.timestamp);

            let gross = match signal.direction {
                Direction::Long => exit_price - entry_price,
                Direction::Short => entry_price - exit_price,
                Direction::Flat => Decimal::ZERO,
            };
            let pnl = gross - entry_price.abs() * self.cost_rate;
            signal.pnl = Some(pnl);
            signal.return_pct = if entry_price.is_zero() {
                warn!(at = %signal.generated_at, "zero entry price, return not defined");
                None
            } else {
                (pnl / entry_price).to_f64()
            };

            filled.push(signal);
        }

        let summary = PerformanceSummary::from_signals(&filled, open_positions, &self.config);
        info!(
            signals = signals.len(),
            closed = summary.total_trades,
            open = open_positions,
            total_pnl = %summary.total_pnl,
            "backtest replay complete"
        );

        Ok(BacktestReport {
            signals: filled,
            summary,
        })
    }
}

fn to_decimal(obs: &MarketObservation) -> Result<Decimal> {
    Decimal::try_from(obs.value).map_err(|e| {
        AnalyticsError::invalid_input(format!(
            "price {} at {} is not representable: {e}",
            obs.value, obs.timestamp
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn at(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 19, 0, 0, 0).unwrap() + Duration::hours(hour)
    }

    fn prices(points: &[(i64, f64)]) -> MarketSeries {
        let obs: Vec<_> = points
            .iter()
            .map(|&(h, v)| MarketObservation::new(at(h), "TLT", v))
            .collect();
        MarketSeries::from_observations(&obs).unwrap()
    }

    fn backtester() -> Backtester {
        Backtester::new(BacktestConfig::default()).unwrap()
    }

    #[test]
    fn single_long_winner() {
        let series = prices(&[(0, 100.0), (24, 105.0)]);
        let signal = Signal::new(at(0), Direction::Long, 0.8, 0.7, 24);
        let report = backtester().run(&[signal], &series, 24).unwrap();

        let filled = &report.signals[0];
        assert_eq!(filled.entry_price, Some(dec!(100)));
        assert_eq!(filled.exit_price, Some(dec!(105)));
        assert_eq!(filled.pnl, Some(dec!(5)));
        assert!((filled.return_pct.unwrap() - 0.05).abs() < 1e-12);

        let summary = &report.summary;
        assert_eq!(summary.total_trades, 1);
        assert!((summary.win_rate - 1.0).abs() < f64::EPSILON);
        assert!((summary.profit_factor - 1_000_000.0).abs() < f64::EPSILON);
        assert_eq!(summary.total_pnl, dec!(5));
    }

    #[test]
    fn short_profits_from_decline() {
        let series = prices(&[(0, 100.0), (24, 97.0)]);
        let signal = Signal::new(at(0), Direction::Short, 0.8, -0.7, 24);
        let report = backtester().run(&[signal], &series, 24).unwrap();
        assert_eq!(report.signals[0].pnl, Some(dec!(3)));
    }

    #[test]
    fn entry_never_uses_earlier_price() {
        let series = prices(&[(0, 90.0), (2, 100.0), (26, 110.0), (30, 120.0)]);
        let signal = Signal::new(at(1), Direction::Long, 0.5, 0.5, 24);
        let report = backtester().run(&[signal], &series, 24).unwrap();

        let filled = &report.signals[0];
        assert_eq!(filled.entry_time, Some(at(2)));
        assert_eq!(filled.entry_price, Some(dec!(100)));
        // exit due at 25 -> first price at or after is 26
        assert_eq!(filled.exit_time, Some(at(26)));
        assert_eq!(filled.pnl, Some(dec!(10)));
    }

    #[test]
    fn exit_beyond_history_stays_open() {
        let series = prices(&[(0, 100.0), (10, 101.0)]);
        let signal = Signal::new(at(0), Direction::Long, 0.5, 0.5, 24);
        let report = backtester().run(&[signal], &series, 24).unwrap();

        assert!(report.signals[0].entry_price.is_some());
        assert!(report.signals[0].exit_price.is_none());
        assert!(report.signals[0].pnl.is_none());
        assert_eq!(report.summary.total_trades, 0);
        assert_eq!(report.summary.open_positions, 1);
        assert_eq!(report.closed().count(), 0);
    }

    #[test]
    fn flat_signals_are_not_traded() {
        let series = prices(&[(0, 100.0), (24, 105.0)]);
        let signal = Signal::new(at(0), Direction::Flat, 0.0, 0.0, 24);
        let report = backtester().run(&[signal], &series, 24).unwrap();

        assert!(report.signals[0].entry_price.is_none());
        assert_eq!(report.summary.total_trades, 0);
        assert_eq!(report.summary.open_positions, 0);
    }

    #[test]
    fn zero_closed_signals_are_neutral() {
        let series = prices(&[(0, 100.0)]);
        let report = backtester().run(&[], &series, 24).unwrap();
        let summary = &report.summary;

        assert_eq!(summary.total_trades, 0);
        assert_eq!(summary.win_rate, 0.0);
        assert_eq!(summary.sharpe_ratio, 0.0);
        assert_eq!(summary.profit_factor, 0.0);
        assert!(!summary.avg_return.is_nan());
    }

    #[test]
    fn transaction_cost_reduces_pnl() {
        let config = BacktestConfig {
            transaction_cost_pct: 0.001,
            ..BacktestConfig::default()
        };
        let series = prices(&[(0, 100.0), (24, 105.0)]);
        let signal = Signal::new(at(0), Direction::Long, 0.8, 0.7, 24);
        let report = Backtester::new(config).unwrap().run(&[signal], &series, 24).unwrap();

        assert_eq!(report.signals[0].pnl, Some(dec!(4.9)));
    }

    #[test]
    fn holding_hours_override_signal_horizon() {
        let series = prices(&[(0, 100.0), (4, 102.0), (24, 90.0)]);
        let signal = Signal::new(at(0), Direction::Long, 0.5, 0.5, 24);
        let report = backtester().run(&[signal], &series, 4).unwrap();

        assert_eq!(report.signals[0].holding_hours, 4);
        assert_eq!(report.signals[0].pnl, Some(dec!(2)));
        assert!(backtester().run(&[], &series, 0).is_err());
    }

    #[test]
    fn breakeven_trade_reports_sentinel_profit_factor() {
        let series = prices(&[(0, 100.0), (24, 100.0)]);
        let signal = Signal::new(at(0), Direction::Long, 0.5, 0.5, 24);
        let report = backtester().run(&[signal], &series, 24).unwrap();

        let summary = &report.summary;
        assert_eq!(summary.total_trades, 1);
        assert_eq!(summary.total_pnl, Decimal::ZERO);
        assert_eq!(summary.win_rate, 0.0);
        assert!((summary.profit_factor - 1_000_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unrepresentable_exit_time_is_out_of_range() {
        let series = prices(&[(0, 100.0), (24, 105.0)]);
        let signal = Signal::new(at(0), Direction::Long, 0.5, 0.5, 24);
        let err = backtester().run(&[signal], &series, u32::MAX).unwrap_err();
        assert!(matches!(err, AnalyticsError::OutOfRange(_)));
    }

    #[test]
    fn report_serializes_decimals_as_strings() {
        let series = prices(&[(0, 100.0), (24, 105.0)]);
        let signal = Signal::new(at(0), Direction::Long, 0.8, 0.7, 24);
        let report = backtester().run(&[signal], &series, 24).unwrap();

        let json = serde_json::to_value(&report).unwrap();
        let pnl = json["signals"][0]["pnl"].as_str().unwrap();
        assert_eq!(pnl.parse::<Decimal>().unwrap(), dec!(5));
        assert_eq!(json["summary"]["total_trades"], 1);

        let back: BacktestReport = serde_json::from_value(json).unwrap();
        assert_eq!(back.signals[0].exit_time, report.signals[0].exit_time);
        assert_eq!(back.summary.total_pnl, dec!(5));
    }
}
