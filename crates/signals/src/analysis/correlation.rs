//! Lead-lag correlation between aligned sentiment and market changes.
//!
//! Correlations are computed on pairwise-complete buckets only. Degenerate
//! inputs (a constant side) report `correlation = 0` and `p_value = 1`
//! instead of failing, while genuinely missing data (fewer than two pairs)
//! is an error for point estimates and an omitted window for rolling ones.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use yieldsense_core::{
    stats, AnalyticsError, CorrelationConfig, CorrelationMethod, MarketSeries, Result,
    SentimentObservation,
};

use super::align::{complete_pairs, AlignedBucket, AlignedSeries, TemporalAligner};

/// Correlation of one lag over one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    /// Market-side lag in seconds
    pub lag_secs: i64,
    /// Trailing window length for rolling results, `None` for the full series
    pub window_days: Option<i64>,
    /// First bucket start inside the window
    pub window_start: DateTime<Utc>,
    /// Last bucket start inside the window
    pub window_end: DateTime<Utc>,
    pub method: CorrelationMethod,
    /// Coefficient in [-1, 1]
    pub correlation: f64,
    /// Two-tailed p-value in [0, 1]
    pub p_value: f64,
    /// Number of pairwise-complete buckets, at least 2
    pub sample_size: usize,
    /// `p_value < alpha`
    pub is_significant: bool,
}

impl CorrelationResult {
    /// Lag in fractional hours.
    #[must_use]
    pub fn lag_hours(&self) -> f64 {
        self.lag_secs as f64 / 3600.0
    }
}

/// Result of scanning several lags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LagScan {
    /// One entry per lag that could be computed, in request order
    pub results: Vec<CorrelationResult>,
    /// Largest |r| among significant results, ties to the smallest lag
    pub best: Option<CorrelationResult>,
    /// Lags (seconds) that were skipped for lack of data
    pub skipped_lags_secs: Vec<i64>,
}

impl LagScan {
    /// One-line human description of the scan.
    #[must_use]
    pub fn summary(&self) -> String {
        match &self.best {
            Some(best) => format!(
                "best lag {:.0}h: r={:.3} (p={:.4}, n={}) - sentiment {} market changes",
                best.lag_hours(),
                best.correlation,
                best.p_value,
                best.sample_size,
                if best.correlation > 0.0 { "leads" } else { "inversely leads" }
            ),
            None => format!(
                "no significant correlation among {} scanned lag(s)",
                self.results.len()
            ),
        }
    }
}

/// Correlation on all buckets and on sentiment-strength subsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrengthBreakdown {
    pub all: CorrelationResult,
    /// Buckets at or above the 75th percentile of sentiment
    pub strong_positive: Option<CorrelationResult>,
    /// Buckets at or below the 25th percentile of sentiment
    pub strong_negative: Option<CorrelationResult>,
    /// Buckets in the top or bottom decile of sentiment
    pub extreme: Option<CorrelationResult>,
}

/// Computes point, rolling and lag-scanned correlations.
#[derive(Debug, Clone)]
pub struct CorrelationEngine {
    config: CorrelationConfig,
}

impl CorrelationEngine {
    /// # Errors
    /// Returns `InvalidConfiguration` if the section does not validate.
    pub fn new(config: CorrelationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &CorrelationConfig {
        &self.config
    }

    /// Correlates every pairwise-complete bucket of the series.
    ///
    /// # Errors
    /// Returns `InsufficientData` with fewer than two complete pairs.
    pub fn correlate(&self, series: &AlignedSeries) -> Result<CorrelationResult> {
        self.correlate_buckets(&series.buckets, series.lag_secs, None)
            .ok_or_else(|| {
                AnalyticsError::insufficient_data(
                    2,
                    series.complete_buckets().count(),
                    "correlation",
                )
            })
    }

    /// Recomputes the correlation on every complete trailing window of
    /// `window_days`, sliding one bucket at a time.
    ///
    /// The window ending at bucket `t` covers buckets starting in
    /// `[t + width - window, t]`. Windows that would begin before the first
    /// bucket are not emitted, nor are windows with fewer than two pairs.
    ///
    /// # Errors
    /// * `InvalidConfiguration` for a non-positive window
    /// * `OutOfRange` if the window is longer than the series
    pub fn rolling_correlate(
        &self,
        series: &AlignedSeries,
        window_days: i64,
    ) -> Result<Vec<CorrelationResult>> {
        if window_days <= 0 {
            return Err(AnalyticsError::invalid_config(format!(
                "rolling window must be positive, got {window_days} days"
            )));
        }
        let (Some(first), Some(last)) = (series.buckets.first(), series.buckets.last()) else {
            return Ok(Vec::new());
        };

        let window = Duration::try_days(window_days).ok_or_else(|| {
            AnalyticsError::out_of_range(format!(
                "{window_days}-day window is not a representable duration"
            ))
        })?;
        let width = series.bucket_width();
        let span = last.bucket_start + width - first.bucket_start;
        if window > span {
            return Err(AnalyticsError::out_of_range(format!(
                "{window_days}-day window exceeds the {}h of aligned history",
                span.num_hours()
            )));
        }

        let mut results = Vec::new();
        for (end_idx, end) in series.buckets.iter().enumerate() {
            let window_start = end.bucket_start + width - window;
            if window_start < first.bucket_start {
                continue;
            }
            let start_idx = series
                .buckets
                .partition_point(|b| b.bucket_start < window_start);

            match self.correlate_buckets(
                &series.buckets[start_idx..=end_idx],
                series.lag_secs,
                Some(window_days),
            ) {
                Some(result) => results.push(result),
                None => debug!(window_end = %end.bucket_start, "rolling window has fewer than 2 pairs, skipped"),
            }
        }

        info!(
            windows = results.len(),
            window_days,
            lag_secs = series.lag_secs,
            "rolling correlation computed"
        );
        Ok(results)
    }

    /// Aligns at every lag and correlates each.
    ///
    /// Lags without enough data are skipped and listed in
    /// `skipped_lags_secs`; any other error is returned.
    ///
    /// # Errors
    /// Returns configuration or input errors raised by the aligner.
    pub fn lag_scan(
        &self,
        aligner: &TemporalAligner,
        sentiment: &[SentimentObservation],
        market: &MarketSeries,
        lags: &[Duration],
    ) -> Result<LagScan> {
        let mut results = Vec::with_capacity(lags.len());
        let mut skipped_lags_secs = Vec::new();

        for &lag in lags {
            let outcome = aligner
                .align(sentiment, market, lag)
                .and_then(|series| self.correlate(&series));
            match outcome {
                Ok(result) => results.push(result),
                Err(e) if e.is_data_shortfall() => {
                    debug!(lag_secs = lag.num_seconds(), error = %e, "lag skipped");
                    skipped_lags_secs.push(lag.num_seconds());
                }
                Err(e) => return Err(e),
            }
        }

        let best = best_lag(&results).cloned();
        info!(
            scanned = lags.len(),
            computed = results.len(),
            best_lag_secs = best.as_ref().map(|b| b.lag_secs),
            "lag scan complete"
        );

        Ok(LagScan {
            results,
            best,
            skipped_lags_secs,
        })
    }

    /// Correlation on all buckets and on strong-sentiment subsets.
    ///
    /// Subsets with fewer than `min_strength_samples` pairs are `None`.
    ///
    /// # Errors
    /// Returns `InsufficientData` with fewer than two complete pairs overall.
    pub fn correlate_by_strength(&self, series: &AlignedSeries) -> Result<StrengthBreakdown> {
        let all = self.correlate(series)?;

        let complete: Vec<AlignedBucket> = series.complete_buckets().cloned().collect();
        let scores: Vec<f64> = complete.iter().filter_map(|b| b.avg_sentiment).collect();
        let cut = |q: f64| stats::quantile(&scores, q).unwrap_or(0.0);
        let (q10, q25, q75, q90) = (cut(0.10), cut(0.25), cut(0.75), cut(0.90));

        let subset = |keep: &dyn Fn(f64) -> bool, name: &str| {
            let buckets: Vec<AlignedBucket> = complete
                .iter()
                .filter(|b| b.avg_sentiment.is_some_and(keep))
                .cloned()
                .collect();
            if buckets.len() < self.config.min_strength_samples {
                debug!(
                    subset = name,
                    samples = buckets.len(),
                    required = self.config.min_strength_samples,
                    "strength subset too small, omitted"
                );
                return None;
            }
            self.correlate_buckets(&buckets, series.lag_secs, None)
        };

        Ok(StrengthBreakdown {
            all,
            strong_positive: subset(&|s| s >= q75, "strong_positive"),
            strong_negative: subset(&|s| s <= q25, "strong_negative"),
            extreme: subset(&|s| s >= q90 || s <= q10, "extreme"),
        })
    }

    fn correlate_buckets(
        &self,
        buckets: &[AlignedBucket],
        lag_secs: i64,
        window_days: Option<i64>,
    ) -> Option<CorrelationResult> {
        let (sentiment, change) = complete_pairs(buckets);
        let n = sentiment.len();
        if n < 2 {
            return None;
        }

        let mut complete = buckets.iter().filter(|b| b.avg_sentiment.is_some());
        let window_start = complete.next()?.bucket_start;
        let window_end = complete.last().map_or(window_start, |b| b.bucket_start);

        let (correlation, p_value) = if stats::is_constant(&sentiment) || stats::is_constant(&change) {
            warn!(lag_secs, n, "zero variance on one side, correlation reported as 0");
            (0.0, 1.0)
        } else {
            let r = match self.config.method {
                CorrelationMethod::Pearson => stats::pearson(&sentiment, &change),
                CorrelationMethod::Spearman => stats::spearman(&sentiment, &change),
            };
            (r, stats::correlation_p_value(r, n))
        };

        Some(CorrelationResult {
            lag_secs,
            window_days,
            window_start,
            window_end,
            method: self.config.method,
            correlation,
            p_value,
            sample_size: n,
            is_significant: p_value < self.config.alpha,
        })
    }
}

/// Picks the significant result with the largest |r|; ties go to the
/// smallest lag.
#[must_use]
pub fn best_lag(results: &[CorrelationResult]) -> Option<&CorrelationResult> {
    results
        .iter()
        .filter(|r| r.is_significant)
        .fold(None, |best: Option<&CorrelationResult>, candidate| match best {
            None => Some(candidate),
            Some(current) => {
                let diff = candidate.correlation.abs() - current.correlation.abs();
                let wins = diff > stats::EPSILON
                    || (diff.abs() <= stats::EPSILON && candidate.lag_secs < current.lag_secs);
                Some(if wins { candidate } else { current })
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use yieldsense_core::{MarketObservation, SentimentLabel};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()
    }

    fn bucket(hour: i64, sentiment: Option<f64>, change: f64) -> AlignedBucket {
        AlignedBucket {
            bucket_start: start() + Duration::hours(hour),
            avg_sentiment: sentiment,
            sentiment_count: usize::from(sentiment.is_some()),
            bullish_count: 0,
            bearish_count: 0,
            neutral_count: 0,
            has_high_impact: false,
            market_value: 4.0,
            market_change: change,
        }
    }

    fn series(buckets: Vec<AlignedBucket>) -> AlignedSeries {
        AlignedSeries {
            lag_secs: 0,
            bucket_width_secs: 3600,
            buckets,
        }
    }

    fn engine() -> CorrelationEngine {
        CorrelationEngine::new(CorrelationConfig::default()).unwrap()
    }

    /// Deterministic pseudo-noise in [-1, 1].
    fn wiggle(i: i64) -> f64 {
        ((i * 37 + 11) % 23) as f64 / 11.0 - 1.0
    }

    #[test]
    fn mirrored_series_is_perfect_and_significant() {
        let buckets = (0..6).map(|i| bucket(i, Some(wiggle(i)), wiggle(i))).collect();
        let result = engine().correlate(&series(buckets)).unwrap();

        assert!((result.correlation - 1.0).abs() < 1e-9, "r={}", result.correlation);
        assert!(result.is_significant);
        assert_eq!(result.sample_size, 6);
    }

    #[test]
    fn constant_side_yields_zero_and_p_one() {
        let buckets = (0..8).map(|i| bucket(i, Some(wiggle(i)), 0.25)).collect();
        let result = engine().correlate(&series(buckets)).unwrap();

        assert_eq!(result.correlation, 0.0);
        assert_eq!(result.p_value, 1.0);
        assert!(!result.is_significant);
    }

    #[test]
    fn pairs_missing_sentiment_are_dropped() {
        let buckets = vec![
            bucket(0, Some(0.1), 0.01),
            bucket(1, None, 9.0),
            bucket(2, Some(0.3), 0.03),
            bucket(3, Some(-0.2), -0.02),
        ];
        let result = engine().correlate(&series(buckets)).unwrap();
        assert_eq!(result.sample_size, 3);
        assert!((result.correlation - 1.0).abs() < 1e-9);
    }

    #[test]
    fn single_pair_is_insufficient() {
        let buckets = vec![bucket(0, Some(0.1), 0.01), bucket(1, None, 0.02)];
        let err = engine().correlate(&series(buckets)).unwrap_err();
        assert!(matches!(err, AnalyticsError::InsufficientData { actual: 1, .. }));
    }

    #[test]
    fn two_pairs_have_no_degrees_of_freedom() {
        let buckets = vec![bucket(0, Some(0.1), 0.01), bucket(1, Some(0.2), 0.05)];
        let result = engine().correlate(&series(buckets)).unwrap();
        assert_eq!(result.p_value, 1.0);
        assert!(!result.is_significant);
    }

    #[test]
    fn full_span_rolling_window_equals_point_correlation() {
        // 48 hourly buckets = exactly 2 days
        let buckets: Vec<_> = (0..48)
            .map(|i| bucket(i, Some(wiggle(i)), wiggle(i + 3) * 0.5 + wiggle(i) * 0.5))
            .collect();
        let s = series(buckets);

        let point = engine().correlate(&s).unwrap();
        let rolling = engine().rolling_correlate(&s, 2).unwrap();

        assert_eq!(rolling.len(), 1);
        assert!((rolling[0].correlation - point.correlation).abs() < 1e-12);
        assert!((rolling[0].p_value - point.p_value).abs() < 1e-12);
        assert_eq!(rolling[0].sample_size, point.sample_size);
        assert_eq!(rolling[0].window_days, Some(2));
    }

    #[test]
    fn rolling_slides_one_bucket_at_a_time() {
        let buckets: Vec<_> = (0..72).map(|i| bucket(i, Some(wiggle(i)), wiggle(i + 1))).collect();
        let rolling = engine().rolling_correlate(&series(buckets), 1).unwrap();

        // first complete 24h window ends at bucket 23
        assert_eq!(rolling.len(), 72 - 23);
        assert!(rolling.iter().all(|r| r.sample_size == 24));
        assert_eq!(rolling[0].window_end, start() + Duration::hours(23));
    }

    #[test]
    fn rolling_skips_sparse_windows() {
        let mut buckets: Vec<_> = (0..48).map(|i| bucket(i, None, 0.0)).collect();
        buckets[30] = bucket(30, Some(0.2), 0.1);
        buckets[40] = bucket(40, Some(0.5), 0.3);
        buckets[45] = bucket(45, Some(-0.1), -0.2);

        let rolling = engine().rolling_correlate(&series(buckets), 1).unwrap();
        // windows ending at 40..=47 and containing 30 or 40,45 have at least 2 pairs
        assert!(rolling.iter().all(|r| r.sample_size >= 2));
        assert!(rolling.len() < 48 - 23);
    }

    #[test]
    fn rolling_window_longer_than_history_is_out_of_range() {
        let buckets: Vec<_> = (0..10).map(|i| bucket(i, Some(wiggle(i)), wiggle(i))).collect();
        let err = engine().rolling_correlate(&series(buckets), 1).unwrap_err();
        assert!(matches!(err, AnalyticsError::OutOfRange(_)));

        let buckets: Vec<_> = (0..10).map(|i| bucket(i, Some(wiggle(i)), wiggle(i))).collect();
        let err = engine().rolling_correlate(&series(buckets), 0).unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidConfiguration(_)));
    }

    #[test]
    fn unrepresentable_rolling_window_is_out_of_range() {
        let buckets: Vec<_> = (0..10).map(|i| bucket(i, Some(wiggle(i)), wiggle(i))).collect();
        let err = engine()
            .rolling_correlate(&series(buckets), i64::MAX)
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::OutOfRange(_)));
    }

    #[test]
    fn best_lag_prefers_largest_significant_then_smallest_lag() {
        let make = |lag_h: i64, r: f64, significant: bool| CorrelationResult {
            lag_secs: lag_h * 3600,
            window_days: None,
            window_start: start(),
            window_end: start(),
            method: CorrelationMethod::Pearson,
            correlation: r,
            p_value: if significant { 0.01 } else { 0.5 },
            sample_size: 30,
            is_significant: significant,
        };
        let results = vec![
            make(0, 0.3, true),
            make(1, -0.6, true),
            make(4, 0.6, true),
            make(24, 0.9, false),
        ];

        let best = best_lag(&results).unwrap();
        assert_eq!(best.lag_secs, 3600);
        assert!(best_lag(&[make(0, 0.9, false)]).is_none());
    }

    #[test]
    fn spearman_method_is_rank_based() {
        let config = CorrelationConfig {
            method: CorrelationMethod::Spearman,
            ..CorrelationConfig::default()
        };
        let engine = CorrelationEngine::new(config).unwrap();
        let buckets = (0..8)
            .map(|i| bucket(i, Some(i as f64 / 10.0), (i as f64).powi(3)))
            .collect();
        let result = engine.correlate(&series(buckets)).unwrap();

        assert!((result.correlation - 1.0).abs() < 1e-12);
        assert_eq!(result.method, CorrelationMethod::Spearman);
    }

    #[test]
    fn strength_subsets_respect_minimum_samples() {
        let buckets: Vec<_> = (0..40)
            .map(|i| bucket(i, Some(wiggle(i)), wiggle(i) * 0.1))
            .collect();
        let breakdown = engine().correlate_by_strength(&series(buckets)).unwrap();

        assert_eq!(breakdown.all.sample_size, 40);
        // top quartile of 40 holds about 10 buckets
        if let Some(strong) = &breakdown.strong_positive {
            assert!(strong.sample_size >= 10);
        }
        // deciles are unioned: about 8 buckets, below the minimum of 10
        assert!(breakdown.extreme.is_none() || breakdown.extreme.as_ref().unwrap().sample_size >= 10);
    }

    #[test]
    fn lag_scan_skips_lags_without_data() {
        let t0 = Utc.with_ymd_and_hms(2025, 3, 19, 0, 0, 0).unwrap();
        let sentiment: Vec<_> = (0..12)
            .map(|h| SentimentObservation {
                timestamp: t0 + Duration::hours(h),
                score: wiggle(h),
                label: SentimentLabel::Neutral,
                confidence: 0.9,
                is_high_impact: false,
            })
            .collect();
        // market value follows the sentiment of the bucket one hour earlier
        let mut level = 4.0;
        let mut market = vec![MarketObservation::new(t0 - Duration::minutes(30), "US10Y", level)];
        for h in 0..14 {
            level += wiggle(h - 1) * 0.01;
            market.push(MarketObservation::new(
                t0 + Duration::hours(h) + Duration::minutes(30),
                "US10Y",
                level,
            ));
        }
        let market = MarketSeries::from_observations(&market).unwrap();
        let aligner = TemporalAligner::new(Duration::hours(1)).unwrap();

        let scan = engine()
            .lag_scan(
                &aligner,
                &sentiment,
                &market,
                &[Duration::zero(), Duration::hours(1), Duration::hours(48)],
            )
            .unwrap();

        assert_eq!(scan.results.len(), 2);
        assert_eq!(scan.skipped_lags_secs, vec![48 * 3600]);
        assert!(scan.summary().contains("best lag 1h"));
        let best = scan.best.expect("lag 1h should be significant");
        assert_eq!(best.lag_secs, 3600);
        assert!((best.correlation - 1.0).abs() < 1e-9);
    }
}
