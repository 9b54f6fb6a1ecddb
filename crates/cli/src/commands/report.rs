//! Full report CLI command.
//!
//! Runs correlation, event study and backtest on the same inputs. The three
//! analyses share no state, so each runs on its own blocking task.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use yieldsense_backtest::{BacktestReport, SummaryFormatter};

use super::backtest::run_replay;
use super::common::{print_json, InputArgs, Inputs, OutputFormat};
use super::correlate::CorrelationReport;
use super::event_study::EventStudyReport;

/// Arguments for the report command.
#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

/// Combined output of every analysis.
#[derive(Debug, Clone, Serialize)]
pub struct FullReport {
    pub correlation: CorrelationReport,
    pub event_study: EventStudyReport,
    pub backtest: BacktestReport,
}

/// Runs the three analyses concurrently.
pub async fn build_report(inputs: Arc<Inputs>) -> Result<FullReport> {
    let i = Arc::clone(&inputs);
    let correlation = tokio::task::spawn_blocking(move || {
        CorrelationReport::build(&i.config, &i.sentiment, &i.market, None)
    });

    let i = Arc::clone(&inputs);
    let event_study = tokio::task::spawn_blocking(move || {
        EventStudyReport::build(&i.config, &i.sentiment, &i.market)
    });

    let i = inputs;
    let backtest =
        tokio::task::spawn_blocking(move || run_replay(&i.config, &i.sentiment, &i.market));

    let (correlation, event_study, backtest) = tokio::try_join!(correlation, event_study, backtest)
        .context("Analysis task panicked")?;

    Ok(FullReport {
        correlation: correlation.context("Correlation analysis failed")?,
        event_study: event_study.context("Event study failed")?,
        backtest: backtest.context("Backtest failed")?,
    })
}

/// Runs the report command.
pub async fn run_report(args: ReportArgs) -> Result<()> {
    let inputs = Arc::new(Inputs::load(&args.input)?);
    let format = inputs.format;
    let report = build_report(inputs).await?;

    tracing::info!("Report complete");

    match format {
        OutputFormat::Text => {
            println!("{}", report.correlation.to_text());
            println!("{}", report.event_study.to_text(false));
            print!("{}", SummaryFormatter::format(&report.backtest.summary));
        }
        OutputFormat::Json => print_json(&report)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use yieldsense_core::{
        derive_changes, AnalysisConfig, MarketObservation, MarketSeries, SentimentLabel,
        SentimentObservation,
    };

    fn at(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap() + Duration::hours(hour)
    }

    fn inputs() -> Inputs {
        let scores: Vec<f64> = (0..96).map(|h| ((h * 7 % 13) as f64 - 6.0) / 7.0).collect();
        let sentiment = scores
            .iter()
            .enumerate()
            .map(|(h, &s)| SentimentObservation {
                timestamp: at(h as i64),
                score: s,
                label: SentimentLabel::from_score(s, 0.1),
                confidence: 0.7,
                is_high_impact: h % 24 == 12,
            })
            .collect();

        let mut value = 100.0;
        let mut market = Vec::new();
        for h in 0..120 {
            if h > 0 && h <= 96 {
                value += scores[h as usize - 1];
            }
            market.push(MarketObservation::new(at(h), "TLT", value));
        }

        Inputs {
            config: AnalysisConfig::default(),
            sentiment,
            market: MarketSeries::from_observations(&derive_changes(&market)).unwrap(),
            format: OutputFormat::Json,
        }
    }

    #[tokio::test]
    async fn report_runs_every_analysis() {
        let report = build_report(Arc::new(inputs())).await.unwrap();

        assert!(!report.correlation.scan.results.is_empty());
        assert!(!report.event_study.sentiment_events.records.is_empty());
        assert!(!report.backtest.signals.is_empty());

        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("correlation").is_some());
        assert!(json.get("backtest").is_some());
    }
}
