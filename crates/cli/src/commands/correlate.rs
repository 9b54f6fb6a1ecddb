//! Correlate CLI command.
//!
//! Scans the configured lags, then reports the rolling correlation and the
//! strength breakdown at the best lag (lag 0 when nothing is significant).

#![allow(clippy::format_push_string)]

use anyhow::Result;
use chrono::Duration;
use clap::Args;
use serde::Serialize;

use yieldsense_core::{AnalysisConfig, MarketSeries, SentimentObservation};
use yieldsense_signals::{
    CorrelationEngine, CorrelationResult, LagScan, StrengthBreakdown, TemporalAligner,
};

use super::common::{print_json, InputArgs, Inputs, OutputFormat};

/// Arguments for the correlate command.
#[derive(Args, Debug, Clone)]
pub struct CorrelateArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Rolling window in days (overrides correlation.rolling_window_days)
    #[arg(long)]
    pub window_days: Option<i64>,
}

/// Lag scan plus the detail views at the chosen lag.
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationReport {
    pub instrument: String,
    pub scan: LagScan,
    /// Lag used for the rolling and strength views
    pub detail_lag_secs: i64,
    /// Empty when the window is longer than the aligned history
    pub rolling: Vec<CorrelationResult>,
    pub strength: Option<StrengthBreakdown>,
}

impl CorrelationReport {
    /// Runs the whole correlation analysis.
    pub fn build(
        config: &AnalysisConfig,
        sentiment: &[SentimentObservation],
        market: &MarketSeries,
        window_days: Option<i64>,
    ) -> Result<Self> {
        let aligner = TemporalAligner::from_config(&config.alignment)?;
        let engine = CorrelationEngine::new(config.correlation.clone())?;

        let scan = engine.lag_scan(&aligner, sentiment, market, &config.alignment.lags())?;
        let detail_lag_secs = scan.best.as_ref().map_or(0, |best| best.lag_secs);

        let (rolling, strength) =
            match aligner.align(sentiment, market, Duration::seconds(detail_lag_secs)) {
                Ok(series) => {
                    let window = window_days.unwrap_or(config.correlation.rolling_window_days);
                    let rolling = match engine.rolling_correlate(&series, window) {
                        Ok(rolling) => rolling,
                        Err(e) if e.is_data_shortfall() => {
                            tracing::warn!("Rolling correlation skipped: {}", e);
                            Vec::new()
                        }
                        Err(e) => return Err(e.into()),
                    };
                    let strength = match engine.correlate_by_strength(&series) {
                        Ok(strength) => Some(strength),
                        Err(e) if e.is_data_shortfall() => None,
                        Err(e) => return Err(e.into()),
                    };
                    (rolling, strength)
                }
                Err(e) if e.is_data_shortfall() => {
                    tracing::warn!("No aligned data at lag {}s: {}", detail_lag_secs, e);
                    (Vec::new(), None)
                }
                Err(e) => return Err(e.into()),
            };

        Ok(Self {
            instrument: market.instrument().to_string(),
            scan,
            detail_lag_secs,
            rolling,
            strength,
        })
    }

    /// Renders the report as plain text.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Correlation: sentiment vs {}\n", self.instrument));
        out.push_str(&"─".repeat(63));
        out.push('\n');

        out.push_str("  Lag      r        p-value   n      significant\n");
        for result in &self.scan.results {
            out.push_str(&format!(
                "  {:>4.0}h  {:>+7.3}  {:>9.4}  {:>5}  {}\n",
                result.lag_hours(),
                result.correlation,
                result.p_value,
                result.sample_size,
                if result.is_significant { "yes" } else { "no" }
            ));
        }
        for lag in &self.scan.skipped_lags_secs {
            out.push_str(&format!("  {:>4}h  skipped (insufficient data)\n", lag / 3600));
        }
        out.push_str(&format!("\n{}\n", self.scan.summary()));

        if !self.rolling.is_empty() {
            let values: Vec<f64> = self.rolling.iter().map(|r| r.correlation).collect();
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let significant = self.rolling.iter().filter(|r| r.is_significant).count();
            out.push_str(&format!(
                "Rolling ({} windows at lag {}h): r in [{:+.3}, {:+.3}], {} significant\n",
                self.rolling.len(),
                self.detail_lag_secs / 3600,
                min,
                max,
                significant
            ));
        }

        if let Some(strength) = &self.strength {
            out.push_str("Strength subsets:\n");
            let rows = [
                ("all", Some(&strength.all)),
                ("strong positive", strength.strong_positive.as_ref()),
                ("strong negative", strength.strong_negative.as_ref()),
                ("extreme", strength.extreme.as_ref()),
            ];
            for (name, result) in rows {
                match result {
                    Some(r) => out.push_str(&format!(
                        "  {:<16} r={:+.3} p={:.4} n={}\n",
                        name, r.correlation, r.p_value, r.sample_size
                    )),
                    None => out.push_str(&format!("  {:<16} too few samples\n", name)),
                }
            }
        }

        out
    }
}

/// Runs the correlate command.
pub async fn run_correlate(args: CorrelateArgs) -> Result<()> {
    let inputs = Inputs::load(&args.input)?;
    let report = CorrelationReport::build(
        &inputs.config,
        &inputs.sentiment,
        &inputs.market,
        args.window_days,
    )?;

    tracing::info!("{}", report.scan.summary());

    match inputs.format {
        OutputFormat::Text => println!("{}", report.to_text()),
        OutputFormat::Json => print_json(&report)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use yieldsense_core::{derive_changes, MarketObservation, SentimentLabel};

    fn at(hour: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap() + Duration::hours(hour)
    }

    fn fixture(hours: i64) -> (Vec<SentimentObservation>, MarketSeries) {
        let scores: Vec<f64> = (0..hours)
            .map(|h| ((h * 37 % 11) as f64 - 5.0) / 6.0)
            .collect();
        let sentiment = scores
            .iter()
            .enumerate()
            .map(|(h, &s)| SentimentObservation {
                timestamp: at(h as i64),
                score: s,
                label: SentimentLabel::from_score(s, 0.1),
                confidence: 0.8,
                is_high_impact: false,
            })
            .collect();

        // market moves with sentiment one hour later
        let mut value = 100.0;
        let mut market = vec![MarketObservation::new(at(0), "TLT", value)];
        for h in 1..=hours {
            value += scores[(h - 1) as usize];
            market.push(MarketObservation::new(at(h), "TLT", value));
        }
        let series = MarketSeries::from_observations(&derive_changes(&market)).unwrap();
        (sentiment, series)
    }

    #[test]
    fn report_finds_one_hour_lead() {
        let (sentiment, market) = fixture(72);
        let report =
            CorrelationReport::build(&AnalysisConfig::default(), &sentiment, &market, Some(1))
                .unwrap();

        let best = report.scan.best.as_ref().unwrap();
        assert_eq!(best.lag_secs, 3600);
        assert!(best.correlation > 0.99);
        assert_eq!(report.detail_lag_secs, 3600);
        assert!(!report.rolling.is_empty());
        assert!(report.strength.is_some());

        let text = report.to_text();
        assert!(text.contains("Correlation: sentiment vs TLT"));
        assert!(text.contains("best lag 1h"));
    }

    #[test]
    fn window_longer_than_history_omits_rolling() {
        let (sentiment, market) = fixture(48);
        let report =
            CorrelationReport::build(&AnalysisConfig::default(), &sentiment, &market, Some(30))
                .unwrap();
        assert!(report.rolling.is_empty());
    }
}
