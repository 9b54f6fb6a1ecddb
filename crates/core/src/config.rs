//! Analysis configuration.
//!
//! Every tunable of the engines lives here with an explicit default. All
//! sections are `#[serde(default)]` so a partial TOML file or a single
//! environment variable only overrides what it names.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};
use crate::market::ChangeHorizon;

/// Longest window, lag or holding period any section accepts: one century.
pub const MAX_SPAN_HOURS: i64 = 100 * 366 * 24;

/// Top-level configuration for every engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub alignment: AlignmentConfig,
    pub correlation: CorrelationConfig,
    pub event_study: EventStudyConfig,
    pub signals: SignalConfig,
    pub backtest: BacktestConfig,
}

impl AnalysisConfig {
    /// Validates every section.
    ///
    /// # Errors
    /// Returns `InvalidConfiguration` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.alignment.validate()?;
        self.correlation.validate()?;
        self.event_study.validate()?;
        self.signals.validate()?;
        self.backtest.validate()?;
        Ok(())
    }
}

/// What to do with buckets that contain no sentiment observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyBucketPolicy {
    /// Leave them out of the output
    #[default]
    Drop,
    /// Emit them with `avg_sentiment = None`
    Keep,
}

/// How scores inside a bucket are averaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentWeighting {
    /// Arithmetic mean of scores
    #[default]
    Unweighted,
    /// Mean of scores weighted by classifier confidence
    #[serde(alias = "confidence_weighted")]
    Confidence,
}

/// Where a bucket's market change comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketChangeSource {
    /// Lagged bucket value minus the last value before the lagged bucket
    #[default]
    BucketDelta,
    /// The observation's own 1h change
    Change1h,
    /// The observation's own 4h change
    Change4h,
    /// The observation's own 24h change
    Change24h,
}

impl MarketChangeSource {
    /// Horizon of a pre-computed change, `None` for bucket deltas.
    #[must_use]
    pub const fn horizon(self) -> Option<ChangeHorizon> {
        match self {
            Self::BucketDelta => None,
            Self::Change1h => Some(ChangeHorizon::OneHour),
            Self::Change4h => Some(ChangeHorizon::FourHours),
            Self::Change24h => Some(ChangeHorizon::OneDay),
        }
    }
}

/// Temporal aligner settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    /// Bucket width in hours, anchored to the UTC epoch
    pub bucket_width_hours: i64,
    /// Lags to scan, market side shifted forward by each
    pub lags_hours: Vec<i64>,
    pub empty_buckets: EmptyBucketPolicy,
    pub weighting: SentimentWeighting,
    pub change_source: MarketChangeSource,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            bucket_width_hours: 1,
            lags_hours: vec![0, 1, 4, 24],
            empty_buckets: EmptyBucketPolicy::Drop,
            weighting: SentimentWeighting::Unweighted,
            change_source: MarketChangeSource::BucketDelta,
        }
    }
}

impl AlignmentConfig {
    /// Returns the bucket width as a Duration.
    #[must_use]
    pub fn bucket_width(&self) -> Duration {
        Duration::hours(self.bucket_width_hours)
    }

    /// Returns the configured lags as Durations.
    #[must_use]
    pub fn lags(&self) -> Vec<Duration> {
        self.lags_hours.iter().map(|&h| Duration::hours(h)).collect()
    }

    /// # Errors
    /// Returns `InvalidConfiguration` for a non-positive width, an empty
    /// lag set or a negative lag.
    pub fn validate(&self) -> Result<()> {
        if self.bucket_width_hours <= 0 {
            return Err(AnalyticsError::invalid_config(format!(
                "alignment.bucket_width_hours must be positive, got {}",
                self.bucket_width_hours
            )));
        }
        if self.lags_hours.is_empty() {
            return Err(AnalyticsError::invalid_config(
                "alignment.lags_hours must name at least one lag",
            ));
        }
        if let Some(lag) = self.lags_hours.iter().find(|&&h| h < 0) {
            return Err(AnalyticsError::invalid_config(format!(
                "alignment.lags_hours must be non-negative, got {lag}"
            )));
        }
        validate_span("alignment.bucket_width_hours", self.bucket_width_hours)?;
        for &lag in &self.lags_hours {
            validate_span("alignment.lags_hours", lag)?;
        }
        Ok(())
    }
}

/// Correlation coefficient to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMethod {
    #[default]
    Pearson,
    Spearman,
}

impl CorrelationMethod {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pearson => "pearson",
            Self::Spearman => "spearman",
        }
    }
}

/// Correlation engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Significance level
    pub alpha: f64,
    pub method: CorrelationMethod,
    /// Trailing window for rolling correlation
    pub rolling_window_days: i64,
    /// Minimum pairs for a strength-subset correlation to be reported
    pub min_strength_samples: usize,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            method: CorrelationMethod::Pearson,
            rolling_window_days: 30,
            min_strength_samples: 10,
        }
    }
}

impl CorrelationConfig {
    /// # Errors
    /// Returns `InvalidConfiguration` for alpha outside (0, 1), a
    /// non-positive window or a strength minimum below 2.
    pub fn validate(&self) -> Result<()> {
        validate_alpha("correlation.alpha", self.alpha)?;
        if self.rolling_window_days <= 0 {
            return Err(AnalyticsError::invalid_config(format!(
                "correlation.rolling_window_days must be positive, got {}",
                self.rolling_window_days
            )));
        }
        validate_span(
            "correlation.rolling_window_days",
            self.rolling_window_days.saturating_mul(24),
        )?;
        if self.min_strength_samples < 2 {
            return Err(AnalyticsError::invalid_config(format!(
                "correlation.min_strength_samples must be at least 2, got {}",
                self.min_strength_samples
            )));
        }
        Ok(())
    }
}

/// How |score| is compared when detecting sentiment events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventThreshold {
    /// Absolute score cut-off in [0, 1]
    Fixed(f64),
    /// Quantile of |score| over the supplied observations, in (0, 1)
    Quantile(f64),
}

impl Default for EventThreshold {
    /// Top decile of |score|.
    fn default() -> Self {
        Self::Quantile(0.9)
    }
}

/// Statistic summarising a pre- or post-event window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStat {
    /// Average of the window's observations
    #[default]
    Mean,
    /// Last observation in the window (level)
    Last,
}

/// Unit in which event impact is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactUnit {
    /// post - pre in the series' own unit
    #[default]
    Native,
    /// (post - pre) / pre * 100
    Percent,
}

/// Event study settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventStudyConfig {
    pub threshold: EventThreshold,
    pub pre_window_hours: i64,
    pub post_window_hours: i64,
    pub window_stat: WindowStat,
    pub impact_unit: ImpactUnit,
    /// Random non-event timestamps drawn for the baseline; 0 disables it
    pub baseline_samples: usize,
    pub baseline_seed: u64,
    pub alpha: f64,
    /// |change| that makes a market observation an event; `None` disables
    /// market-move detection
    pub market_move_threshold: Option<f64>,
    pub market_move_horizon: ChangeHorizon,
}

impl Default for EventStudyConfig {
    fn default() -> Self {
        Self {
            threshold: EventThreshold::default(),
            pre_window_hours: 12,
            post_window_hours: 12,
            window_stat: WindowStat::Mean,
            impact_unit: ImpactUnit::Native,
            baseline_samples: 200,
            baseline_seed: 42,
            alpha: 0.05,
            market_move_threshold: None,
            market_move_horizon: ChangeHorizon::OneHour,
        }
    }
}

impl EventStudyConfig {
    /// Returns the pre-event window as a Duration.
    #[must_use]
    pub fn pre_window(&self) -> Duration {
        Duration::hours(self.pre_window_hours)
    }

    /// Returns the post-event window as a Duration.
    #[must_use]
    pub fn post_window(&self) -> Duration {
        Duration::hours(self.post_window_hours)
    }

    /// # Errors
    /// Returns `InvalidConfiguration` for thresholds or quantiles outside
    /// their domain, non-positive windows or alpha outside (0, 1).
    pub fn validate(&self) -> Result<()> {
        match self.threshold {
            EventThreshold::Fixed(t) if !(0.0..=1.0).contains(&t) => {
                return Err(AnalyticsError::invalid_config(format!(
                    "event_study.threshold.fixed must be in [0, 1], got {t}"
                )));
            }
            EventThreshold::Quantile(q) if !(q > 0.0 && q < 1.0) => {
                return Err(AnalyticsError::invalid_config(format!(
                    "event_study.threshold.quantile must be in (0, 1), got {q}"
                )));
            }
            _ => {}
        }
        if self.pre_window_hours <= 0 || self.post_window_hours <= 0 {
            return Err(AnalyticsError::invalid_config(format!(
                "event_study windows must be positive, got pre={}h post={}h",
                self.pre_window_hours, self.post_window_hours
            )));
        }
        validate_span("event_study.pre_window_hours", self.pre_window_hours)?;
        validate_span("event_study.post_window_hours", self.post_window_hours)?;
        validate_alpha("event_study.alpha", self.alpha)?;
        if let Some(t) = self.market_move_threshold {
            if !(t.is_finite() && t > 0.0) {
                return Err(AnalyticsError::invalid_config(format!(
                    "event_study.market_move_threshold must be positive, got {t}"
                )));
            }
        }
        Ok(())
    }
}

/// When a signal fires relative to the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    /// Only on the evaluation where aggregated sentiment enters a regime
    #[default]
    Crossing,
    /// Whenever aggregated sentiment is beyond the threshold
    Level,
}

/// How sentiment in the lookback window is aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentAggregation {
    #[default]
    Mean,
    ConfidenceWeighted,
}

/// Signal generator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    /// Aggregated sentiment must be strictly beyond +/- threshold
    pub threshold: f64,
    pub cooldown_hours: i64,
    pub lookback_hours: i64,
    /// Aggregated |sentiment| at which strength reaches 1
    pub saturation: f64,
    pub trigger: TriggerMode,
    pub aggregation: SentimentAggregation,
    /// Strength multiplier when the window holds a high-impact observation
    pub high_impact_boost: f64,
    /// Holding horizon stamped on every signal
    pub holding_hours: u32,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            cooldown_hours: 4,
            lookback_hours: 4,
            saturation: 1.0,
            trigger: TriggerMode::Crossing,
            aggregation: SentimentAggregation::Mean,
            high_impact_boost: 1.5,
            holding_hours: 24,
        }
    }
}

impl SignalConfig {
    /// Returns the cooldown as a Duration.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::hours(self.cooldown_hours)
    }

    /// Returns the lookback window as a Duration.
    #[must_use]
    pub fn lookback(&self) -> Duration {
        Duration::hours(self.lookback_hours)
    }

    /// # Errors
    /// Returns `InvalidConfiguration` for a threshold outside [0, 1], a
    /// saturation not above the threshold, a negative cooldown, a
    /// non-positive lookback or holding period, or a non-positive boost.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(AnalyticsError::invalid_config(format!(
                "signals.threshold must be in [0, 1], got {}",
                self.threshold
            )));
        }
        if !(self.saturation.is_finite() && self.saturation > self.threshold) {
            return Err(AnalyticsError::invalid_config(format!(
                "signals.saturation must exceed the threshold {}, got {}",
                self.threshold, self.saturation
            )));
        }
        if self.cooldown_hours < 0 {
            return Err(AnalyticsError::invalid_config(format!(
                "signals.cooldown_hours must be non-negative, got {}",
                self.cooldown_hours
            )));
        }
        if self.lookback_hours <= 0 {
            return Err(AnalyticsError::invalid_config(format!(
                "signals.lookback_hours must be positive, got {}",
                self.lookback_hours
            )));
        }
        if self.holding_hours == 0 {
            return Err(AnalyticsError::invalid_config(
                "signals.holding_hours must be positive",
            ));
        }
        validate_span("signals.cooldown_hours", self.cooldown_hours)?;
        validate_span("signals.lookback_hours", self.lookback_hours)?;
        validate_span("signals.holding_hours", i64::from(self.holding_hours))?;
        if !(self.high_impact_boost.is_finite() && self.high_impact_boost > 0.0) {
            return Err(AnalyticsError::invalid_config(format!(
                "signals.high_impact_boost must be positive, got {}",
                self.high_impact_boost
            )));
        }
        Ok(())
    }
}

/// Backtester settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub holding_hours: u32,
    /// Annualisation factor for Sharpe: mean / std * sqrt(trades_per_year)
    pub trades_per_year: f64,
    /// Round-trip cost as a fraction of entry price (0.001 = 0.1%)
    pub transaction_cost_pct: f64,
    /// Profit factor reported when there are no losing trades
    pub profit_factor_sentinel: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            holding_hours: 24,
            trades_per_year: 252.0,
            transaction_cost_pct: 0.0,
            profit_factor_sentinel: 1_000_000.0,
        }
    }
}

impl BacktestConfig {
    /// # Errors
    /// Returns `InvalidConfiguration` for a zero holding period, a
    /// non-positive annualisation factor or sentinel, or a cost outside [0, 1).
    pub fn validate(&self) -> Result<()> {
        if self.holding_hours == 0 {
            return Err(AnalyticsError::invalid_config(
                "backtest.holding_hours must be positive",
            ));
        }
        validate_span("backtest.holding_hours", i64::from(self.holding_hours))?;
        if !(self.trades_per_year.is_finite() && self.trades_per_year > 0.0) {
            return Err(AnalyticsError::invalid_config(format!(
                "backtest.trades_per_year must be positive, got {}",
                self.trades_per_year
            )));
        }
        if !(0.0..1.0).contains(&self.transaction_cost_pct) {
            return Err(AnalyticsError::invalid_config(format!(
                "backtest.transaction_cost_pct must be in [0, 1), got {}",
                self.transaction_cost_pct
            )));
        }
        if !(self.profit_factor_sentinel.is_finite() && self.profit_factor_sentinel > 0.0) {
            return Err(AnalyticsError::invalid_config(format!(
                "backtest.profit_factor_sentinel must be positive, got {}",
                self.profit_factor_sentinel
            )));
        }
        Ok(())
    }
}

fn validate_alpha(field: &str, alpha: f64) -> Result<()> {
    if alpha > 0.0 && alpha < 1.0 {
        Ok(())
    } else {
        Err(AnalyticsError::invalid_config(format!(
            "{field} must be in (0, 1), got {alpha}"
        )))
    }
}

fn validate_span(field: &str, hours: i64) -> Result<()> {
    if hours > MAX_SPAN_HOURS {
        return Err(AnalyticsError::invalid_config(format!(
            "{field} must be at most {MAX_SPAN_HOURS}h, got {hours}h"
        )));
    }
    Ok(())
}
