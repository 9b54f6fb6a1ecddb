//! Temporal alignment of sentiment and market series.
//!
//! Sentiment observations are grouped into fixed-width buckets anchored to
//! the Unix epoch, so the same width always produces the same boundaries no
//! matter how the input is ordered. The market side of bucket `t` is read
//! from the lagged interval `[t + lag, t + lag + width)`:
//!
//! - `market_value` is the last observation inside that interval
//! - `market_change` is either `market_value` minus the last observation
//!   before the interval, or that observation's own fixed-horizon change
//!
//! A bucket whose lagged interval holds no market observation (or no
//! reference value for the change) is left out. Nothing is interpolated.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use yieldsense_core::{
    stats::EPSILON, validate_observations, AlignmentConfig, AnalyticsError, EmptyBucketPolicy,
    MarketChangeSource, MarketSeries, Result, SentimentLabel, SentimentObservation,
    SentimentWeighting,
};

/// One fixed-width interval of aligned sentiment and market data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedBucket {
    /// Inclusive start of the sentiment interval
    pub bucket_start: DateTime<Utc>,
    /// Mean sentiment, `None` when the bucket holds no usable observation
    pub avg_sentiment: Option<f64>,
    pub sentiment_count: usize,
    pub bullish_count: usize,
    pub bearish_count: usize,
    pub neutral_count: usize,
    /// True if any observation in the bucket was flagged high-impact
    pub has_high_impact: bool,
    /// Last market value in the lagged interval
    pub market_value: f64,
    /// Market change attributed to the lagged interval
    pub market_change: f64,
}

/// Buckets produced for one lag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedSeries {
    pub lag_secs: i64,
    pub bucket_width_secs: i64,
    /// Strictly increasing, non-overlapping buckets
    pub buckets: Vec<AlignedBucket>,
}

impl AlignedSeries {
    /// Returns the lag as a Duration.
    #[must_use]
    pub fn lag(&self) -> Duration {
        Duration::seconds(self.lag_secs)
    }

    /// Returns the bucket width as a Duration.
    #[must_use]
    pub fn bucket_width(&self) -> Duration {
        Duration::seconds(self.bucket_width_secs)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Buckets carrying both a sentiment average and a market change.
    pub fn complete_buckets(&self) -> impl Iterator<Item = &AlignedBucket> {
        self.buckets.iter().filter(|b| b.avg_sentiment.is_some())
    }

    /// Pairwise-complete `(avg_sentiment, market_change)` columns.
    #[must_use]
    pub fn pairs(&self) -> (Vec<f64>, Vec<f64>) {
        complete_pairs(&self.buckets)
    }
}

/// Splits buckets into pairwise-complete sentiment and change columns.
pub(crate) fn complete_pairs(buckets: &[AlignedBucket]) -> (Vec<f64>, Vec<f64>) {
    buckets
        .iter()
        .filter_map(|b| b.avg_sentiment.map(|s| (s, b.market_change)))
        .unzip()
}

#[derive(Debug, Default)]
struct BucketAccumulator {
    score_sum: f64,
    weighted_sum: f64,
    weight_sum: f64,
    count: usize,
    bullish: usize,
    bearish: usize,
    neutral: usize,
    high_impact: bool,
}

impl BucketAccumulator {
    fn add(&mut self, obs: &SentimentObservation) {
        self.score_sum += obs.score;
        self.weighted_sum += obs.score * obs.confidence;
        self.weight_sum += obs.confidence;
        self.count += 1;
        match obs.label {
            SentimentLabel::Bullish => self.bullish += 1,
            SentimentLabel::Bearish => self.bearish += 1,
            SentimentLabel::Neutral => self.neutral += 1,
        }
        self.high_impact |= obs.is_high_impact;
    }

    fn average(&self, weighting: SentimentWeighting) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        match weighting {
            SentimentWeighting::Unweighted => Some(self.score_sum / self.count as f64),
            SentimentWeighting::Confidence if self.weight_sum < EPSILON => None,
            SentimentWeighting::Confidence => Some(self.weighted_sum / self.weight_sum),
        }
    }
}

/// Joins sentiment and market series into aligned buckets.
#[derive(Debug, Clone)]
pub struct TemporalAligner {
    bucket_width: Duration,
    empty_buckets: EmptyBucketPolicy,
    weighting: SentimentWeighting,
    change_source: MarketChangeSource,
}

impl TemporalAligner {
    /// Creates an aligner with unweighted averaging, bucket-delta changes
    /// and empty buckets dropped.
    ///
    /// # Errors
    /// Returns `InvalidConfiguration` if the width is not a positive whole
    /// number of seconds.
    pub fn new(bucket_width: Duration) -> Result<Self> {
        if bucket_width <= Duration::zero() {
            return Err(AnalyticsError::invalid_config(format!(
                "bucket width must be positive, got {}s",
                bucket_width.num_seconds()
            )));
        }
        if bucket_width != Duration::seconds(bucket_width.num_seconds()) {
            return Err(AnalyticsError::invalid_config(format!(
                "bucket width must be whole seconds, got {}ms",
                bucket_width.num_milliseconds()
            )));
        }
        Ok(Self {
            bucket_width,
            empty_buckets: EmptyBucketPolicy::Drop,
            weighting: SentimentWeighting::Unweighted,
            change_source: MarketChangeSource::BucketDelta,
        })
    }

    /// Creates an aligner from the alignment section of the configuration.
    ///
    /// # Errors
    /// Returns `InvalidConfiguration` if the section does not validate.
    pub fn from_config(config: &AlignmentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.bucket_width())?
            .with_empty_buckets(config.empty_buckets)
            .with_weighting(config.weighting)
            .with_change_source(config.change_source))
    }

    #[must_use]
    pub fn with_empty_buckets(mut self, policy: EmptyBucketPolicy) -> Self {
        self.empty_buckets = policy;
        self
    }

    #[must_use]
    pub fn with_weighting(mut self, weighting: SentimentWeighting) -> Self {
        self.weighting = weighting;
        self
    }

    #[must_use]
    pub fn with_change_source(mut self, source: MarketChangeSource) -> Self {
        self.change_source = source;
        self
    }

    #[must_use]
    pub fn bucket_width(&self) -> Duration {
        self.bucket_width
    }

    fn width_secs(&self) -> i64 {
        self.bucket_width.num_seconds()
    }

    fn bucket_index(&self, t: DateTime<Utc>) -> i64 {
        t.timestamp().div_euclid(self.width_secs())
    }

    fn index_start(&self, index: i64) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(index * self.width_secs(), 0).single()
    }

    /// Start of the epoch-anchored bucket containing `t`.
    #[must_use]
    pub fn bucket_start(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        self.index_start(self.bucket_index(t)).unwrap_or(t)
    }

    /// Aligns sentiment with the market series shifted forward by `lag`.
    ///
    /// # Errors
    /// * `InvalidConfiguration` for a negative lag
    /// * `InvalidInput` for observations outside their domain
    /// * `OutOfRange` if every lagged bucket starts after the market history
    /// * `InsufficientData` if fewer than two buckets carry both sides
    pub fn align(
        &self,
        sentiment: &[SentimentObservation],
        market: &MarketSeries,
        lag: Duration,
    ) -> Result<AlignedSeries> {
        if lag < Duration::zero() {
            return Err(AnalyticsError::invalid_config(format!(
                "lag must be non-negative, got {}s",
                lag.num_seconds()
            )));
        }
        validate_observations(sentiment)?;

        let mut accumulators: BTreeMap<i64, BucketAccumulator> = BTreeMap::new();
        for obs in sentiment {
            accumulators
                .entry(self.bucket_index(obs.timestamp))
                .or_default()
                .add(obs);
        }

        let (first, last) = match (accumulators.keys().next(), accumulators.keys().next_back()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => {
                return Err(AnalyticsError::insufficient_data(
                    2,
                    0,
                    "temporal alignment (no sentiment observations)",
                ))
            }
        };

        let earliest_lagged = self
            .index_start(first)
            .and_then(|t| t.checked_add_signed(lag));
        if earliest_lagged.map_or(true, |t| t > market.end()) {
            return Err(AnalyticsError::out_of_range(format!(
                "lag {}h pushes every bucket past the market history ending {}",
                lag.num_hours(),
                market.end()
            )));
        }

        let indices: Vec<i64> = match self.empty_buckets {
            EmptyBucketPolicy::Drop => accumulators.keys().copied().collect(),
            EmptyBucketPolicy::Keep => (first..=last).collect(),
        };

        let empty = BucketAccumulator::default();
        let mut buckets = Vec::with_capacity(indices.len());
        for index in indices {
            let Some(bucket_start) = self.index_start(index) else {
                continue;
            };
            let acc = accumulators.get(&index).unwrap_or(&empty);

            let Some((market_value, market_change)) = bucket_start
                .checked_add_signed(lag)
                .and_then(|t| self.market_side(market, t))
            else {
                debug!(bucket = %bucket_start, lag_secs = lag.num_seconds(), "no market data for lagged bucket, excluded");
                continue;
            };

            buckets.push(AlignedBucket {
                bucket_start,
                avg_sentiment: acc.average(self.weighting),
                sentiment_count: acc.count,
                bullish_count: acc.bullish,
                bearish_count: acc.bearish,
                neutral_count: acc.neutral,
                has_high_impact: acc.high_impact,
                market_value,
                market_change,
            });
        }

        let valid = buckets.iter().filter(|b| b.avg_sentiment.is_some()).count();
        if valid < 2 {
            return Err(AnalyticsError::insufficient_data(
                2,
                valid,
                format!("temporal alignment at lag {}h", lag.num_hours()),
            ));
        }

        info!(
            buckets = buckets.len(),
            valid,
            lag_secs = lag.num_seconds(),
            width_secs = self.width_secs(),
            "aligned sentiment with market series"
        );

        Ok(AlignedSeries {
            lag_secs: lag.num_seconds(),
            bucket_width_secs: self.width_secs(),
            buckets,
        })
    }

    /// Market value and change for the interval starting at `from`.
    fn market_side(&self, market: &MarketSeries, from: DateTime<Utc>) -> Option<(f64, f64)> {
        let to = from.checked_add_signed(self.bucket_width)?;
        let last = market.between(from, to, false).last()?;

        let change = match self.change_source.horizon() {
            None => last.value - market.last_before(from)?.value,
            Some(horizon) => last.change(horizon)?,
        };

        change.is_finite().then_some((last.value, change))
    }
}

/// Aligns with default settings: unweighted means, bucket deltas, empty
/// buckets dropped.
///
/// # Errors
/// See [`TemporalAligner::new`] and [`TemporalAligner::align`].
pub fn align(
    sentiment: &[SentimentObservation],
    market: &MarketSeries,
    bucket_width: Duration,
    lag: Duration,
) -> Result<AlignedSeries> {
    TemporalAligner::new(bucket_width)?.align(sentiment, market, lag)
}
