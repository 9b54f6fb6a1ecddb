//! Event study: market response around discrete sentiment or market events.
//!
//! ## Windows
//!
//! For an event at `t` the pre-event window is `[t - pre, t)` and the
//! post-event window is `[t, t + post]`. Events whose windows are not fully
//! inside the market history are dropped, never truncated.
//!
//! ## Baseline
//!
//! Impacts are compared against a null sample measured with the same
//! windows on the same series at randomly chosen non-event timestamps.
//! A timestamp is non-event when no event falls inside its own
//! `[t - pre, t + post]` span. Draws use a seeded ChaCha8 generator so a
//! study is reproducible.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use yieldsense_core::{
    stats::{self, TTest},
    validate_observations, AnalyticsError, ChangeHorizon, EventStudyConfig, EventThreshold,
    ImpactUnit, MarketSeries, Result, SentimentLabel, SentimentObservation, WindowStat,
};

// ============================================
// Detection
// ============================================

/// Why a timestamp qualified as an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventTrigger {
    /// Observation flagged high-impact upstream
    HighImpact,
    /// |score| at or above the sentiment threshold
    SentimentThreshold,
    /// |market change| at or above the move threshold
    MarketMove,
}

/// A detected event, before its impact is measured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedEvent {
    pub timestamp: DateTime<Utc>,
    pub trigger: EventTrigger,
    /// Score of the strongest observation at this timestamp
    pub score: Option<f64>,
    pub label: Option<SentimentLabel>,
    /// Triggering market change for market-move events
    pub market_change: Option<f64>,
}

// ============================================
// Measurement
// ============================================

/// Measured market response to one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_timestamp: DateTime<Utc>,
    pub trigger_reason: EventTrigger,
    pub score: Option<f64>,
    pub label: Option<SentimentLabel>,
    /// Mean or last value over `[t - pre, t)`
    pub pre_window_stat: f64,
    /// Mean or last value over `[t, t + post]`
    pub post_window_stat: f64,
    /// `post - pre` in the configured unit
    pub impact: f64,
    /// Impact minus the baseline mean impact, when a baseline exists
    pub abnormal_impact: Option<f64>,
    /// `(post - pre) / pre * 100`, `None` when pre is zero
    pub percent_change: Option<f64>,
    pub pre_observations: usize,
    pub post_observations: usize,
    pub pre_volatility: f64,
    pub post_volatility: f64,
    /// `post_volatility / pre_volatility`, 1.0 when pre-volatility is zero
    pub volatility_ratio: f64,
    /// Welch test of post-window against pre-window observations
    pub significance: TTest,
}

/// Event impacts compared against the random-timestamp null sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineComparison {
    pub samples: usize,
    pub baseline_mean_impact: f64,
    pub baseline_std_impact: f64,
    pub event_mean_impact: f64,
    /// `event_mean_impact - baseline_mean_impact`
    pub abnormal_impact: f64,
    /// Welch test of event impacts against baseline impacts
    pub test: TTest,
    pub is_significant: bool,
}

/// Output of [`EventStudyEngine::study`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventStudy {
    pub records: Vec<EventRecord>,
    /// Events dropped because a window had no market data
    pub excluded: usize,
    pub mean_impact: f64,
    /// One-sample test of impacts against zero
    pub impact_test: TTest,
    pub baseline: Option<BaselineComparison>,
}

/// Impact statistics for one sentiment label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelImpact {
    pub label: SentimentLabel,
    pub count: usize,
    pub mean_impact: f64,
    pub median_impact: f64,
    pub mean_volatility_ratio: f64,
    /// Share (0-100) of events moving the way the label implies: bullish
    /// expects a positive impact, bearish a negative one. `None` for neutral.
    pub consistent_direction_pct: Option<f64>,
}

#[derive(Debug, Clone)]
struct WindowMeasure {
    pre: Vec<f64>,
    post: Vec<f64>,
    pre_stat: f64,
    post_stat: f64,
    impact: f64,
    percent_change: Option<f64>,
}

/// Detects events and measures the market response around them.
#[derive(Debug, Clone)]
pub struct EventStudyEngine {
    config: EventStudyConfig,
}

impl EventStudyEngine {
    /// # Errors
    /// Returns `InvalidConfiguration` if the section does not validate.
    pub fn new(config: EventStudyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &EventStudyConfig {
        &self.config
    }

    /// Resolves the configured |score| cut-off for these observations.
    ///
    /// Returns `None` for a quantile threshold over no observations.
    #[must_use]
    pub fn score_threshold(&self, sentiment: &[SentimentObservation]) -> Option<f64> {
        match self.config.threshold {
            EventThreshold::Fixed(t) => Some(t),
            EventThreshold::Quantile(q) => {
                let magnitudes: Vec<f64> = sentiment.iter().map(|o| o.score.abs()).collect();
                stats::quantile(&magnitudes, q)
            }
        }
    }

    /// Measurement and baseline arithmetic on `t` is only safe once this holds.
    fn window_fits(&self, market: &MarketSeries, t: DateTime<Utc>) -> bool {
        let start = t.checked_sub_signed(self.config.pre_window());
        let end = t.checked_add_signed(self.config.post_window());
        match (start, end) {
            (Some(start), Some(end)) => market.covers(start, end),
            _ => false,
        }
    }

    /// Sentiment events: high-impact observations or `|score| >= threshold`.
    ///
    /// Observations sharing a timestamp form one event. Events whose pre- or
    /// post-window leaves the market history are not returned.
    ///
    /// # Errors
    /// Returns `InvalidInput` for observations outside their domain.
    pub fn find_events(
        &self,
        sentiment: &[SentimentObservation],
        market: &MarketSeries,
    ) -> Result<Vec<DetectedEvent>> {
        validate_observations(sentiment)?;
        let Some(threshold) = self.score_threshold(sentiment) else {
            return Ok(Vec::new());
        };

        let mut by_time: BTreeMap<DateTime<Utc>, DetectedEvent> = BTreeMap::new();
        for obs in sentiment {
            let trigger = if obs.is_high_impact {
                EventTrigger::HighImpact
            } else if obs.score.abs() >= threshold {
                EventTrigger::SentimentThreshold
            } else {
                continue;
            };

            let candidate = DetectedEvent {
                timestamp: obs.timestamp,
                trigger,
                score: Some(obs.score),
                label: Some(obs.label),
                market_change: None,
            };
            by_time
                .entry(obs.timestamp)
                .and_modify(|existing| {
                    let stronger = existing.score.map_or(true, |s| obs.score.abs() > s.abs());
                    let high_impact = existing.trigger == EventTrigger::HighImpact
                        || trigger == EventTrigger::HighImpact;
                    if stronger {
                        existing.score = Some(obs.score);
                        existing.label = Some(obs.label);
                    }
                    if high_impact {
                        existing.trigger = EventTrigger::HighImpact;
                    }
                })
                .or_insert(candidate);
        }

        let detected = by_time.len();
        let events: Vec<DetectedEvent> = by_time
            .into_values()
            .filter(|e| {
                let fits = self.window_fits(market, e.timestamp);
                if !fits {
                    debug!(event = %e.timestamp, "event window outside market history, dropped");
                }
                fits
            })
            .collect();

        info!(
            threshold,
            detected,
            kept = events.len(),
            "sentiment events detected"
        );
        Ok(events)
    }

    /// Market-move events: `|change over horizon| >= threshold`.
    ///
    /// Uses the observation's own change when present, otherwise derives it
    /// from the series. Window filtering is the same as [`Self::find_events`].
    ///
    /// # Errors
    /// Returns `InvalidConfiguration` for a non-positive threshold.
    pub fn find_market_move_events(
        &self,
        market: &MarketSeries,
        horizon: ChangeHorizon,
        threshold: f64,
    ) -> Result<Vec<DetectedEvent>> {
        if !(threshold.is_finite() && threshold > 0.0) {
            return Err(AnalyticsError::invalid_config(format!(
                "market move threshold must be positive, got {threshold}"
            )));
        }

        let events: Vec<DetectedEvent> = market
            .observations()
            .iter()
            .filter_map(|obs| {
                let change = obs.change(horizon).or_else(|| {
                    market
                        .last_at_or_before(obs.timestamp - horizon.duration())
                        .map(|reference| obs.value - reference.value)
                })?;
                (change.abs() >= threshold && self.window_fits(market, obs.timestamp)).then(|| {
                    DetectedEvent {
                        timestamp: obs.timestamp,
                        trigger: EventTrigger::MarketMove,
                        score: None,
                        label: None,
                        market_change: Some(change),
                    }
                })
            })
            .collect();

        info!(
            threshold,
            horizon = ?horizon,
            kept = events.len(),
            "market move events detected"
        );
        Ok(events)
    }

    fn measure(&self, market: &MarketSeries, t: DateTime<Utc>) -> Option<WindowMeasure> {
        if !self.window_fits(market, t) {
            return None;
        }
        let pre = market.values_between(t - self.config.pre_window(), t, false);
        let post = market.values_between(t, t + self.config.post_window(), true);

        let summarize = |values: &[f64]| match self.config.window_stat {
            WindowStat::Mean => (!values.is_empty()).then(|| stats::mean(values)),
            WindowStat::Last => values.last().copied(),
        };
        let pre_stat = summarize(&pre)?;
        let post_stat = summarize(&post)?;

        let raw = post_stat - pre_stat;
        let percent_change = (pre_stat.abs() > stats::EPSILON).then(|| raw / pre_stat * 100.0);
        let impact = match self.config.impact_unit {
            ImpactUnit::Native => raw,
            ImpactUnit::Percent => percent_change?,
        };

        Some(WindowMeasure {
            pre,
            post,
            pre_stat,
            post_stat,
            impact,
            percent_change,
        })
    }

    /// Measures every event and compares impacts with the baseline.
    ///
    /// Events whose windows leave the market history are counted in
    /// `excluded`. No events yields an empty study.
    ///
    /// # Errors
    /// Does not fail for a valid series.
    pub fn study(&self, events: &[DetectedEvent], market: &MarketSeries) -> Result<EventStudy> {
        let mut records = Vec::with_capacity(events.len());
        let mut excluded = 0;

        for event in events {
            let Some(m) = self.measure(market, event.timestamp) else {
                debug!(event = %event.timestamp, "event window lacks market data, excluded");
                excluded += 1;
                continue;
            };

            let pre_volatility = stats::std_dev(&m.pre);
            let post_volatility = stats::std_dev(&m.post);
            let volatility_ratio = if pre_volatility < stats::EPSILON {
                1.0
            } else {
                post_volatility / pre_volatility
            };

            records.push(EventRecord {
                event_timestamp: event.timestamp,
                trigger_reason: event.trigger,
                score: event.score,
                label: event.label,
                pre_window_stat: m.pre_stat,
                post_window_stat: m.post_stat,
                impact: m.impact,
                abnormal_impact: None,
                percent_change: m.percent_change,
                pre_observations: m.pre.len(),
                post_observations: m.post.len(),
                pre_volatility,
                post_volatility,
                volatility_ratio,
                significance: stats::welch_t_test(&m.post, &m.pre),
            });
        }

        let impacts: Vec<f64> = records.iter().map(|r| r.impact).collect();
        let baseline = self.baseline(events, market, &impacts);
        if let Some(b) = &baseline {
            for record in &mut records {
                record.abnormal_impact = Some(record.impact - b.baseline_mean_impact);
            }
        }

        info!(
            events = events.len(),
            measured = records.len(),
            excluded,
            baseline_samples = baseline.as_ref().map_or(0, |b| b.samples),
            "event study complete"
        );

        Ok(EventStudy {
            mean_impact: stats::mean(&impacts),
            impact_test: stats::one_sample_t_test(&impacts, 0.0),
            records,
            excluded,
            baseline,
        })
    }

    fn baseline(
        &self,
        events: &[DetectedEvent],
        market: &MarketSeries,
        event_impacts: &[f64],
    ) -> Option<BaselineComparison> {
        if self.config.baseline_samples == 0 || event_impacts.is_empty() {
            return None;
        }

        let pre = self.config.pre_window();
        let post = self.config.post_window();
        let mut event_times: Vec<DateTime<Utc>> = events.iter().map(|e| e.timestamp).collect();
        event_times.sort_unstable();

        let candidates: Vec<DateTime<Utc>> = market
            .observations()
            .iter()
            .map(|o| o.timestamp)
            .filter(|&t| self.window_fits(market, t))
            .filter(|&t| {
                let lo = event_times.partition_point(|&e| e < t - pre);
                event_times.get(lo).map_or(true, |&e| e > t + post)
            })
            .collect();

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.baseline_seed);
        let baseline_impacts: Vec<f64> = candidates
            .choose_multiple(&mut rng, self.config.baseline_samples)
            .filter_map(|&t| self.measure(market, t).map(|m| m.impact))
            .collect();

        if baseline_impacts.len() < 2 {
            warn!(
                candidates = candidates.len(),
                "too few non-event timestamps for a baseline"
            );
            return None;
        }

        let baseline_mean_impact = stats::mean(&baseline_impacts);
        let event_mean_impact = stats::mean(event_impacts);
        let test = stats::welch_t_test(event_impacts, &baseline_impacts);

        Some(BaselineComparison {
            samples: baseline_impacts.len(),
            baseline_mean_impact,
            baseline_std_impact: stats::std_dev(&baseline_impacts),
            event_mean_impact,
            abnormal_impact: event_mean_impact - baseline_mean_impact,
            is_significant: test.is_significant(self.config.alpha),
            test,
        })
    }
}

/// Groups records by sentiment label. Records without a label (market-move
/// events) are ignored. Output is ordered bullish, bearish, neutral.
#[must_use]
pub fn aggregate_by_label(records: &[EventRecord]) -> Vec<LabelImpact> {
    let mut groups: BTreeMap<SentimentLabel, Vec<&EventRecord>> = BTreeMap::new();
    for record in records {
        if let Some(label) = record.label {
            groups.entry(label).or_default().push(record);
        }
    }

    groups
        .into_iter()
        .map(|(label, group)| {
            let impacts: Vec<f64> = group.iter().map(|r| r.impact).collect();
            let ratios: Vec<f64> = group.iter().map(|r| r.volatility_ratio).collect();
            let consistent = match label {
                SentimentLabel::Bullish => Some(impacts.iter().filter(|&&i| i > 0.0).count()),
                SentimentLabel::Bearish => Some(impacts.iter().filter(|&&i| i < 0.0).count()),
                SentimentLabel::Neutral => None,
            };

            LabelImpact {
                label,
                count: group.len(),
                mean_impact: stats::mean(&impacts),
                median_impact: stats::median(&impacts),
                mean_volatility_ratio: stats::mean(&ratios),
                consistent_direction_pct: consistent
                    .map(|c| c as f64 / group.len() as f64 * 100.0),
            }
        })
        .collect()
}
