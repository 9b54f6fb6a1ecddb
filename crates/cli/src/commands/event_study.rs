//! Event study CLI command.
//!
//! Measures the market response around sentiment events, and around large
//! market moves when `event_study.market_move_threshold` is set.

#![allow(clippy::format_push_string)]

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use yieldsense_core::{AnalysisConfig, MarketSeries, SentimentObservation};
use yieldsense_signals::{aggregate_by_label, EventStudy, EventStudyEngine, LabelImpact};

use super::common::{print_json, InputArgs, Inputs, OutputFormat};

/// Arguments for the event-study command.
#[derive(Args, Debug, Clone)]
pub struct EventStudyArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Print every event record in text output
    #[arg(long)]
    pub verbose: bool,
}

/// Sentiment events, their label breakdown and optional market-move events.
#[derive(Debug, Clone, Serialize)]
pub struct EventStudyReport {
    pub instrument: String,
    /// Score threshold in effect, if any observation was supplied
    pub score_threshold: Option<f64>,
    pub sentiment_events: EventStudy,
    pub by_label: Vec<LabelImpact>,
    pub market_moves: Option<EventStudy>,
}

impl EventStudyReport {
    /// Runs the whole event study.
    pub fn build(
        config: &AnalysisConfig,
        sentiment: &[SentimentObservation],
        market: &MarketSeries,
    ) -> Result<Self> {
        let engine = EventStudyEngine::new(config.event_study.clone())?;

        let events = engine.find_events(sentiment, market)?;
        let sentiment_events = engine.study(&events, market)?;
        let by_label = aggregate_by_label(&sentiment_events.records);

        let market_moves = match config.event_study.market_move_threshold {
            Some(threshold) => {
                let moves = engine.find_market_move_events(
                    market,
                    config.event_study.market_move_horizon,
                    threshold,
                )?;
                Some(engine.study(&moves, market)?)
            }
            None => None,
        };

        Ok(Self {
            instrument: market.instrument().to_string(),
            score_threshold: engine.score_threshold(sentiment),
            sentiment_events,
            by_label,
            market_moves,
        })
    }

    /// Renders the report as plain text.
    pub fn to_text(&self, verbose: bool) -> String {
        let mut out = String::new();
        out.push_str(&format!("Event study: {}\n", self.instrument));
        out.push_str(&"─".repeat(63));
        out.push('\n');
        if let Some(threshold) = self.score_threshold {
            out.push_str(&format!("Score threshold:       |s| >= {threshold:.3}\n"));
        }

        out.push_str(&study_text("Sentiment events", &self.sentiment_events));

        if !self.by_label.is_empty() {
            out.push_str("By label:\n");
            for group in &self.by_label {
                let consistency = group
                    .consistent_direction_pct
                    .map_or_else(|| "-".to_string(), |pct| format!("{pct:.1}%"));
                out.push_str(&format!(
                    "  {:<8} n={:<4} mean={:+.4} median={:+.4} vol ratio={:.2} consistent={}\n",
                    group.label.as_str(),
                    group.count,
                    group.mean_impact,
                    group.median_impact,
                    group.mean_volatility_ratio,
                    consistency
                ));
            }
        }

        if verbose {
            out.push_str("Events:\n");
            for record in &self.sentiment_events.records {
                out.push_str(&format!(
                    "  {}  {:?}  impact={:+.4}  p={:.4}\n",
                    record.event_timestamp.format("%Y-%m-%d %H:%M"),
                    record.trigger_reason,
                    record.impact,
                    record.significance.p_value
                ));
            }
        }

        if let Some(moves) = &self.market_moves {
            out.push('\n');
            out.push_str(&study_text("Market-move events", moves));
        }

        out
    }
}

fn study_text(title: &str, study: &EventStudy) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}: {} measured, {} excluded\n",
        title,
        study.records.len(),
        study.excluded
    ));
    if study.records.is_empty() {
        return out;
    }
    out.push_str(&format!(
        "  Mean impact:         {:+.4} (t={:.3}, p={:.4})\n",
        study.mean_impact, study.impact_test.t_statistic, study.impact_test.p_value
    ));
    match &study.baseline {
        Some(b) => out.push_str(&format!(
            "  Baseline:            {:+.4} over {} samples, abnormal {:+.4} (p={:.4}{})\n",
            b.baseline_mean_impact,
            b.samples,
            b.abnormal_impact,
            b.test.p_value,
            if b.is_significant { ", significant" } else { "" }
        )),
        None => out.push_str("  Baseline:            unavailable\n"),
    }
    out
}

/// Runs the event-study command.
pub async fn run_event_study(args: EventStudyArgs) -> Result<()> {
    let inputs = Inputs::load(&args.input)?;
    let report = EventStudyReport::build(&inputs.config, &inputs.sentiment, &inputs.market)?;

    tracing::info!(
        "Event study complete: {} sentiment events measured",
        report.sentiment_events.records.len()
    );

    match inputs.format {
        OutputFormat::Text => println!("{}", report.to_text(args.verbose)),
        OutputFormat::Json => print_json(&report)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use yieldsense_core::{EventThreshold, MarketObservation, SentimentLabel, WindowStat};

    fn at(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap() + Duration::hours(hour)
    }

    fn market() -> MarketSeries {
        // flat at 100, jump to 108 for the 12h after hour 50
        let obs: Vec<_> = (0..120)
            .map(|h| {
                let value = if (50..=62).contains(&h) { 108.0 } else { 100.0 };
                MarketObservation::new(at(h), "TLT", value)
            })
            .collect();
        MarketSeries::from_observations(&obs).unwrap()
    }

    fn sentiment() -> Vec<SentimentObservation> {
        vec![
            SentimentObservation {
                timestamp: at(50),
                score: 0.9,
                label: SentimentLabel::Bullish,
                confidence: 0.9,
                is_high_impact: true,
            },
            SentimentObservation {
                timestamp: at(90),
                score: 0.05,
                label: SentimentLabel::Neutral,
                confidence: 0.5,
                is_high_impact: false,
            },
        ]
    }

    fn config() -> AnalysisConfig {
        let mut config = AnalysisConfig::default();
        config.event_study.threshold = EventThreshold::Fixed(0.5);
        config.event_study.window_stat = WindowStat::Mean;
        config
    }

    #[test]
    fn report_measures_high_impact_event() {
        let report = EventStudyReport::build(&config(), &sentiment(), &market()).unwrap();

        assert_eq!(report.sentiment_events.records.len(), 1);
        let record = &report.sentiment_events.records[0];
        assert_eq!(record.event_timestamp, at(50));
        assert!((record.impact - 8.0).abs() < 1e-9);
        assert!(report.market_moves.is_none());

        assert_eq!(report.by_label.len(), 1);
        assert_eq!(report.by_label[0].label, SentimentLabel::Bullish);

        let text = report.to_text(true);
        assert!(text.contains("Sentiment events: 1 measured"));
        assert!(text.contains("bullish"));
    }

    #[test]
    fn market_move_events_reported_when_enabled() {
        let mut config = config();
        config.event_study.market_move_threshold = Some(5.0);
        let report = EventStudyReport::build(&config, &sentiment(), &market()).unwrap();

        let moves = report.market_moves.unwrap();
        assert!(!moves.records.is_empty());
        assert!(moves.records.iter().all(|r| r.label.is_none()));
    }
}
