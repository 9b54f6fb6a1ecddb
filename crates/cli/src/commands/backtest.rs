//! Backtest CLI command.
//!
//! Generates threshold signals from the sentiment file and replays them
//! against the market series.

use anyhow::Result;
use clap::Args;

use yieldsense_backtest::{BacktestReport, Backtester, SummaryFormatter};
use yieldsense_core::{AnalysisConfig, MarketSeries, SentimentObservation};
use yieldsense_signals::SentimentSignalGenerator;

use super::common::{print_json, InputArgs, Inputs, OutputFormat};

/// Arguments for the backtest command.
#[derive(Args, Debug, Clone)]
pub struct BacktestArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Signal threshold (overrides signals.threshold)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Cooldown between signals in hours (overrides signals.cooldown_hours)
    #[arg(long)]
    pub cooldown_hours: Option<i64>,

    /// Holding period in hours (overrides backtest.holding_hours)
    #[arg(long)]
    pub holding_hours: Option<u32>,
}

/// Applies command-line overrides on top of the loaded configuration.
pub fn apply_overrides(config: &mut AnalysisConfig, args: &BacktestArgs) {
    if let Some(threshold) = args.threshold {
        config.signals.threshold = threshold;
    }
    if let Some(cooldown) = args.cooldown_hours {
        config.signals.cooldown_hours = cooldown;
    }
    if let Some(holding) = args.holding_hours {
        config.backtest.holding_hours = holding;
        config.signals.holding_hours = holding;
    }
}

/// Generates signals and replays them.
pub fn run_replay(
    config: &AnalysisConfig,
    sentiment: &[SentimentObservation],
    market: &MarketSeries,
) -> Result<BacktestReport> {
    let generator = SentimentSignalGenerator::new(config.signals.clone())?;
    let signals = generator.generate(sentiment)?;

    let backtester = Backtester::new(config.backtest.clone())?;
    let report = backtester.run(&signals, market, config.backtest.holding_hours)?;
    Ok(report)
}

/// Runs the backtest command.
pub async fn run_backtest(args: BacktestArgs) -> Result<()> {
    let mut inputs = Inputs::load(&args.input)?;
    apply_overrides(&mut inputs.config, &args);
    inputs.config.validate()?;

    tracing::info!(
        "Replaying sentiment signals: threshold={}, cooldown={}h, holding={}h",
        inputs.config.signals.threshold,
        inputs.config.signals.cooldown_hours,
        inputs.config.backtest.holding_hours
    );

    let report = run_replay(&inputs.config, &inputs.sentiment, &inputs.market)?;

    match inputs.format {
        OutputFormat::Text => print!("{}", SummaryFormatter::format(&report.summary)),
        OutputFormat::Json => print_json(&report)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use clap::Parser;
    use yieldsense_core::{Direction, MarketObservation, SentimentLabel};

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: BacktestArgs,
    }

    fn at(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap() + Duration::hours(hour)
    }

    #[test]
    fn overrides_replace_config_values() {
        let cli = TestCli::parse_from([
            "test",
            "--sentiment",
            "s.csv",
            "--market",
            "m.csv",
            "--threshold",
            "0.4",
            "--holding-hours",
            "6",
        ]);
        let mut config = AnalysisConfig::default();
        apply_overrides(&mut config, &cli.args);

        assert!((config.signals.threshold - 0.4).abs() < f64::EPSILON);
        assert_eq!(config.signals.cooldown_hours, 4);
        assert_eq!(config.backtest.holding_hours, 6);
    }

    #[test]
    fn replay_closes_long_on_bullish_burst() {
        let sentiment = vec![
            SentimentObservation {
                timestamp: at(0),
                score: 0.0,
                label: SentimentLabel::Neutral,
                confidence: 0.8,
                is_high_impact: false,
            },
            SentimentObservation {
                timestamp: at(10),
                score: 0.9,
                label: SentimentLabel::Bullish,
                confidence: 0.8,
                is_high_impact: false,
            },
        ];
        let market: Vec<_> = (0..48)
            .map(|h| MarketObservation::new(at(h), "TLT", 100.0 + h as f64))
            .collect();
        let market = MarketSeries::from_observations(&market).unwrap();

        let report = run_replay(&AnalysisConfig::default(), &sentiment, &market).unwrap();
        assert_eq!(report.signals.len(), 1);
        assert_eq!(report.signals[0].direction, Direction::Long);
        assert_eq!(report.summary.total_trades, 1);
        assert_eq!(report.summary.winning_trades, 1);
    }
}
