//! Market observations (yields or prices) and point-in-time lookups.
//!
//! Every lookup here is expressed relative to a query instant so that
//! callers can state exactly which side of the instant they are allowed to
//! see. The backtester only ever asks for `at_or_after`, the aligner and
//! event study ask for half-open ranges.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};

/// Fixed horizons at which the upstream feed reports changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeHorizon {
    #[serde(alias = "1h")]
    OneHour,
    #[serde(alias = "4h")]
    FourHours,
    #[serde(alias = "24h", alias = "1d")]
    OneDay,
}

impl ChangeHorizon {
    /// All supported horizons, shortest first.
    pub const ALL: [ChangeHorizon; 3] = [Self::OneHour, Self::FourHours, Self::OneDay];

    /// Length of the horizon.
    #[must_use]
    pub fn duration(self) -> Duration {
        match self {
            Self::OneHour => Duration::hours(1),
            Self::FourHours => Duration::hours(4),
            Self::OneDay => Duration::hours(24),
        }
    }
}

/// One value of one instrument at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketObservation {
    /// Observation time
    pub timestamp: DateTime<Utc>,
    /// Instrument identifier (e.g. "US10Y", "TLT")
    pub instrument: String,
    /// Yield in percent for Treasuries, price for ETFs
    pub value: f64,
    /// value(t) - value(t - 1h)
    #[serde(default)]
    pub change_1h: Option<f64>,
    /// value(t) - value(t - 4h)
    #[serde(default)]
    pub change_4h: Option<f64>,
    /// value(t) - value(t - 24h)
    #[serde(default)]
    pub change_24h: Option<f64>,
}

impl MarketObservation {
    /// Creates an observation without derived changes.
    pub fn new(timestamp: DateTime<Utc>, instrument: impl Into<String>, value: f64) -> Self {
        Self {
            timestamp,
            instrument: instrument.into(),
            value,
            change_1h: None,
            change_4h: None,
            change_24h: None,
        }
    }

    /// Returns the derived change at the given horizon, if known.
    #[must_use]
    pub fn change(&self, horizon: ChangeHorizon) -> Option<f64> {
        match horizon {
            ChangeHorizon::OneHour => self.change_1h,
            ChangeHorizon::FourHours => self.change_4h,
            ChangeHorizon::OneDay => self.change_24h,
        }
    }

    fn set_change(&mut self, horizon: ChangeHorizon, change: Option<f64>) {
        match horizon {
            ChangeHorizon::OneHour => self.change_1h = change,
            ChangeHorizon::FourHours => self.change_4h = change,
            ChangeHorizon::OneDay => self.change_24h = change,
        }
    }
}

/// Fills the fixed-horizon changes of every observation from the series
/// itself.
///
/// For each instrument the change at horizon `h` is
/// `value(t) - value(last observation at or before t - h)`. Observations
/// without enough history keep `None`. Input order is preserved.
#[must_use]
pub fn derive_changes(observations: &[MarketObservation]) -> Vec<MarketObservation> {
    let mut by_instrument: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, obs) in observations.iter().enumerate() {
        by_instrument.entry(obs.instrument.as_str()).or_default().push(idx);
    }

    let mut derived = observations.to_vec();

    for indices in by_instrument.values_mut() {
        indices.sort_by_key(|&i| observations[i].timestamp);

        for &idx in indices.iter() {
            let current = &observations[idx];
            for horizon in ChangeHorizon::ALL {
                let cutoff = current.timestamp - horizon.duration();
                let reference = indices
                    .partition_point(|&j| observations[j].timestamp <= cutoff)
                    .checked_sub(1)
                    .map(|pos| observations[indices[pos]].value);
                derived[idx].set_change(horizon, reference.map(|r| current.value - r));
            }
        }
    }

    derived
}

/// Validated, time-sorted observations of a single instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSeries {
    instrument: String,
    points: Vec<MarketObservation>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl MarketSeries {
    /// Builds a series from the observations of `instrument`.
    ///
    /// Observations of other instruments are ignored. When two observations
    /// share a timestamp the later one in input order wins.
    ///
    /// # Errors
    /// * `InvalidInput` if any selected value is not finite
    /// * `InsufficientData` if no observation matches the instrument
    pub fn for_instrument(
        instrument: impl Into<String>,
        observations: &[MarketObservation],
    ) -> Result<Self> {
        let instrument = instrument.into();
        let mut points: Vec<MarketObservation> = observations
            .iter()
            .filter(|o| o.instrument == instrument)
            .cloned()
            .collect();

        if let Some(bad) = points.iter().find(|o| !o.value.is_finite()) {
            return Err(AnalyticsError::invalid_input(format!(
                "non-finite market value for {} at {}",
                bad.instrument, bad.timestamp
            )));
        }

        // Stable sort keeps input order among equal timestamps; keep the last.
        points.sort_by_key(|o| o.timestamp);
        points.reverse();
        points.dedup_by_key(|o| o.timestamp);
        points.reverse();

        let (start, end) = match (points.first(), points.last()) {
            (Some(first), Some(last)) => (first.timestamp, last.timestamp),
            _ => {
                return Err(AnalyticsError::insufficient_data(
                    1,
                    0,
                    format!("market series for {instrument}"),
                ))
            }
        };

        Ok(Self {
            instrument,
            points,
            start,
            end,
        })
    }

    /// Builds a series from observations that must all share one instrument.
    ///
    /// # Errors
    /// * `InvalidInput` if more than one instrument is present
    /// * the errors of [`MarketSeries::for_instrument`]
    pub fn from_observations(observations: &[MarketObservation]) -> Result<Self> {
        let instrument = match observations.first() {
            Some(first) => first.instrument.clone(),
            None => return Err(AnalyticsError::insufficient_data(1, 0, "market series")),
        };
        if let Some(other) = observations.iter().find(|o| o.instrument != instrument) {
            return Err(AnalyticsError::invalid_input(format!(
                "mixed instruments in one series: {} and {}",
                instrument, other.instrument
            )));
        }
        Self::for_instrument(instrument, observations)
    }

    /// Instrument identifier.
    #[must_use]
    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Number of observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; a series holds at least one observation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Time-sorted observations.
    #[must_use]
    pub fn observations(&self) -> &[MarketObservation] {
        &self.points
    }

    /// Timestamp of the earliest observation.
    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Timestamp of the latest observation.
    #[must_use]
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Returns true if `[from, to]` lies inside the observed history.
    #[must_use]
    pub fn covers(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        from >= self.start && to <= self.end
    }

    /// First observation at or after `t`. Never returns anything earlier.
    #[must_use]
    pub fn at_or_after(&self, t: DateTime<Utc>) -> Option<&MarketObservation> {
        let idx = self.points.partition_point(|p| p.timestamp < t);
        self.points.get(idx)
    }

    /// Most recent observation strictly before `t`.
    #[must_use]
    pub fn last_before(&self, t: DateTime<Utc>) -> Option<&MarketObservation> {
        let idx = self.points.partition_point(|p| p.timestamp < t);
        idx.checked_sub(1).and_then(|i| self.points.get(i))
    }

    /// Most recent observation at or before `t`. Never returns anything later.
    #[must_use]
    pub fn last_at_or_before(&self, t: DateTime<Utc>) -> Option<&MarketObservation> {
        let idx = self.points.partition_point(|p| p.timestamp <= t);
        idx.checked_sub(1).and_then(|i| self.points.get(i))
    }

    /// Observations in `[from, to)`, or `[from, to]` when `inclusive_end`.
    #[must_use]
    pub fn between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        inclusive_end: bool,
    ) -> &[MarketObservation] {
        let lo = self.points.partition_point(|p| p.timestamp < from);
        let hi = if inclusive_end {
            self.points.partition_point(|p| p.timestamp <= to)
        } else {
            self.points.partition_point(|p| p.timestamp < to)
        };
        if lo >= hi {
            return &[];
        }
        &self.points[lo..hi]
    }

    /// Values in `[from, to)`, or `[from, to]` when `inclusive_end`.
    #[must_use]
    pub fn values_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        inclusive_end: bool,
    ) -> Vec<f64> {
        self.between(from, to, inclusive_end)
            .iter()
            .map(|o| o.value)
            .collect()
    }
}
