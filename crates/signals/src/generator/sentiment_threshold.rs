//! Threshold signal generator over aggregated sentiment.
//!
//! At every distinct observation timestamp `t` the generator aggregates the
//! sentiment in the trailing window `(t - lookback, t]` and classifies it:
//!
//! - **Above**: aggregate strictly greater than `+threshold`
//! - **Below**: aggregate strictly less than `-threshold`
//! - **Between**: anything else, including exactly `+/- threshold`
//!
//! In crossing mode a signal fires when the regime changes into Above
//! (long) or Below (short); in level mode it fires whenever the regime is
//! Above or Below. In both modes no signal fires within `cooldown` of the
//! previous one, whatever its direction. A crossing that lands inside the
//! cooldown still updates the regime, so it is not replayed afterwards.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use yieldsense_core::{
    stats::EPSILON, validate_observations, Direction, Result, SentimentAggregation,
    SentimentObservation, Signal, SignalConfig, TriggerMode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Regime {
    Above,
    Below,
    Between,
}

/// Aggregated sentiment over one lookback window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowAggregate {
    pub value: f64,
    pub count: usize,
    pub high_impact: bool,
}

/// Converts a sentiment stream into long/short signals.
#[derive(Debug, Clone)]
pub struct SentimentSignalGenerator {
    config: SignalConfig,
}

impl SentimentSignalGenerator {
    /// # Errors
    /// Returns `InvalidConfiguration` if the section does not validate.
    pub fn new(config: SignalConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Strength for an aggregate beyond the threshold.
    ///
    /// Linear in `(|aggregate| - threshold) / (saturation - threshold)`,
    /// multiplied by the high-impact boost when applicable, clamped to [0, 1].
    #[must_use]
    pub fn strength(&self, aggregate: f64, high_impact: bool) -> f64 {
        let span = self.config.saturation - self.config.threshold;
        let base = (aggregate.abs() - self.config.threshold) / span;
        let boosted = if high_impact {
            base * self.config.high_impact_boost
        } else {
            base
        };
        boosted.clamp(0.0, 1.0)
    }

    fn aggregate(&self, window: &[&SentimentObservation]) -> Option<WindowAggregate> {
        if window.is_empty() {
            return None;
        }
        let value = match self.config.aggregation {
            SentimentAggregation::Mean => {
                window.iter().map(|o| o.score).sum::<f64>() / window.len() as f64
            }
            SentimentAggregation::ConfidenceWeighted => {
                let weight: f64 = window.iter().map(|o| o.confidence).sum();
                if weight < EPSILON {
                    return None;
                }
                window.iter().map(|o| o.score * o.confidence).sum::<f64>() / weight
            }
        };
        Some(WindowAggregate {
            value,
            count: window.len(),
            high_impact: window.iter().any(|o| o.is_high_impact),
        })
    }

    fn regime(&self, aggregate: f64) -> Regime {
        if aggregate > self.config.threshold {
            Regime::Above
        } else if aggregate < -self.config.threshold {
            Regime::Below
        } else {
            Regime::Between
        }
    }

    /// Generates signals in chronological order.
    ///
    /// # Errors
    /// Returns `InvalidInput` for observations outside their domain.
    pub fn generate(&self, sentiment: &[SentimentObservation]) -> Result<Vec<Signal>> {
        validate_observations(sentiment)?;

        let mut sorted: Vec<&SentimentObservation> = sentiment.iter().collect();
        sorted.sort_by_key(|o| o.timestamp);

        let lookback = self.config.lookback();
        let cooldown = self.config.cooldown();

        let mut signals = Vec::new();
        let mut regime = Regime::Between;
        let mut last_fired: Option<DateTime<Utc>> = None;
        let mut suppressed = 0usize;
        let mut lo = 0;
        let mut hi = 0;

        while hi < sorted.len() {
            let t = sorted[hi].timestamp;
            while hi < sorted.len() && sorted[hi].timestamp == t {
                hi += 1;
            }
            if let Some(window_start) = t.checked_sub_signed(lookback) {
                while sorted[lo].timestamp <= window_start {
                    lo += 1;
                }
            }

            let Some(agg) = self.aggregate(&sorted[lo..hi]) else {
                continue;
            };
            let next = self.regime(agg.value);
            let entered = next != Regime::Between
                && (self.config.trigger == TriggerMode::Level || next != regime);
            regime = next;

            if !entered {
                continue;
            }
            if last_fired.is_some_and(|fired| {
                fired
                    .checked_add_signed(cooldown)
                    .map_or(true, |until| t < until)
            }) {
                debug!(at = %t, aggregate = agg.value, "signal suppressed by cooldown");
                suppressed += 1;
                continue;
            }

            let direction = if next == Regime::Above {
                Direction::Long
            } else {
                Direction::Short
            };
            signals.push(
                Signal::new(
                    t,
                    direction,
                    self.strength(agg.value, agg.high_impact),
                    agg.value,
                    self.config.holding_hours,
                )
                .with_window(agg.count, agg.high_impact),
            );
            last_fired = Some(t);
        }

        info!(
            observations = sentiment.len(),
            signals = signals.len(),
            suppressed,
            threshold = self.config.threshold,
            "signals generated"
        );
        Ok(signals)
    }
}

/// Generates crossing signals with the given threshold and cooldown and
/// defaults for everything else.
///
/// # Errors
/// Returns `InvalidConfiguration` for a threshold outside [0, 1) or a
/// negative cooldown, and `InvalidInput` for bad observations.
pub fn generate(
    sentiment: &[SentimentObservation],
    threshold: f64,
    cooldown_hours: i64,
) -> Result<Vec<Signal>> {
    let config = SignalConfig {
        threshold,
        cooldown_hours,
        ..SignalConfig::default()
    };
    SentimentSignalGenerator::new(config)?.generate(sentiment)
}

/// Time between consecutive signals.
#[must_use]
pub fn signal_gaps(signals: &[Signal]) -> Vec<Duration> {
    signals
        .windows(2)
        .map(|w| w[1].generated_at - w[0].generated_at)
        .collect()
}
