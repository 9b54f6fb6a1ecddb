//! Directional trading signals and their backtest fills.
//!
//! A [`Signal`] is created by the generator with no prices attached. The
//! backtester returns a copy with `entry_*`, `exit_*`, `pnl` and
//! `return_pct` filled once the holding horizon has been replayed.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a trading signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Expect the instrument to rise
    Long,
    /// Expect the instrument to fall
    Short,
    /// No trade
    Flat,
}

impl Direction {
    /// Returns the opposite direction.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Long => Self::Short,
            Self::Short => Self::Long,
            Self::Flat => Self::Flat,
        }
    }

    /// Returns true if this direction opens a position.
    #[must_use]
    pub const fn is_directional(self) -> bool {
        !matches!(self, Self::Flat)
    }

    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Long => "long",
            Self::Short => "short",
            Self::Flat => "flat",
        }
    }
}

/// A signal emitted by the generator, optionally filled by a backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Evaluation instant at which the signal fired
    pub generated_at: DateTime<Utc>,
    /// Trade direction
    pub direction: Direction,
    /// Strength in [0, 1]
    pub strength: f64,
    /// Aggregated sentiment that triggered the signal
    pub triggering_sentiment: f64,
    /// Number of observations in the aggregation window
    pub observation_count: usize,
    /// True if any observation in the window was flagged high-impact
    pub high_impact: bool,
    /// Intended holding horizon
    pub holding_hours: u32,
    /// First price at or after `generated_at`
    pub entry_price: Option<Decimal>,
    /// Timestamp of the entry price
    pub entry_time: Option<DateTime<Utc>>,
    /// First price at or after `generated_at + holding_hours`
    pub exit_price: Option<Decimal>,
    /// Timestamp of the exit price
    pub exit_time: Option<DateTime<Utc>>,
    /// Net profit and loss per unit
    pub pnl: Option<Decimal>,
    /// `pnl / entry_price`
    pub return_pct: Option<f64>,
}

impl Signal {
    /// Creates an unfilled signal.
    #[must_use]
    pub fn new(
        generated_at: DateTime<Utc>,
        direction: Direction,
        strength: f64,
        triggering_sentiment: f64,
        holding_hours: u32,
    ) -> Self {
        Self {
            generated_at,
            direction,
            strength: strength.clamp(0.0, 1.0),
            triggering_sentiment,
            observation_count: 0,
            high_impact: false,
            holding_hours,
            entry_price: None,
            entry_time: None,
            exit_price: None,
            exit_time: None,
            pnl: None,
            return_pct: None,
        }
    }

    /// Sets the aggregation window details.
    #[must_use]
    pub fn with_window(mut self, observation_count: usize, high_impact: bool) -> Self {
        self.observation_count = observation_count;
        self.high_impact = high_impact;
        self
    }

    /// Instant at which the position is scheduled to close.
    #[must_use]
    pub fn exit_due(&self) -> DateTime<Utc> {
        self.generated_at + Duration::hours(i64::from(self.holding_hours))
    }

    /// Returns true once an exit price has been filled.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.exit_price.is_some() && self.pnl.is_some()
    }

    /// Hours between entry and exit fills, if both are known.
    #[must_use]
    pub fn hold_hours(&self) -> Option<f64> {
        match (self.entry_time, self.exit_time) {
            (Some(entry), Some(exit)) => Some((exit - entry).num_seconds() as f64 / 3600.0),
            _ => None,
        }
    }
}
