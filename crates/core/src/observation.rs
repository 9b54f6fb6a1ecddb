//! Sentiment observations produced by the external classifier.
//!
//! The classifier itself is a black box: it hands us a score in [-1, 1],
//! a label and a confidence in [0, 1]. Observations are immutable once built.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};

/// Sentiment classification attached to an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    /// Risk-on / positive tone
    #[serde(alias = "risk-on", alias = "positive")]
    Bullish,
    /// Risk-off / negative tone
    #[serde(alias = "risk-off", alias = "negative")]
    Bearish,
    /// No directional tone
    Neutral,
}

impl SentimentLabel {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Bullish => "bullish",
            Self::Bearish => "bearish",
            Self::Neutral => "neutral",
        }
    }

    /// Derives a label from a raw score using a symmetric dead zone.
    #[must_use]
    pub fn from_score(score: f64, dead_zone: f64) -> Self {
        if score > dead_zone {
            Self::Bullish
        } else if score < -dead_zone {
            Self::Bearish
        } else {
            Self::Neutral
        }
    }
}

/// A single scored news item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentObservation {
    /// When the underlying item was published
    pub timestamp: DateTime<Utc>,
    /// Sentiment score in [-1, 1]
    pub score: f64,
    /// Classifier label
    pub label: SentimentLabel,
    /// Classifier confidence in [0, 1]
    pub confidence: f64,
    /// Flagged upstream as market-moving (FOMC, CPI, NFP, Fed speakers, ...)
    #[serde(default)]
    pub is_high_impact: bool,
}

impl SentimentObservation {
    /// Creates a validated observation.
    ///
    /// # Errors
    /// Returns `InvalidInput` if score or confidence fall outside their domain.
    pub fn new(
        timestamp: DateTime<Utc>,
        score: f64,
        label: SentimentLabel,
        confidence: f64,
        is_high_impact: bool,
    ) -> Result<Self> {
        let observation = Self {
            timestamp,
            score,
            label,
            confidence,
            is_high_impact,
        };
        observation.validate()?;
        Ok(observation)
    }

    /// Checks the score and confidence domains.
    ///
    /// Useful for observations that arrive through deserialization and
    /// never passed through [`SentimentObservation::new`].
    ///
    /// # Errors
    /// Returns `InvalidInput` describing the first violation found.
    pub fn validate(&self) -> Result<()> {
        if !self.score.is_finite() || !(-1.0..=1.0).contains(&self.score) {
            return Err(AnalyticsError::invalid_input(format!(
                "sentiment score must be in [-1, 1], got {} at {}",
                self.score, self.timestamp
            )));
        }
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(AnalyticsError::invalid_input(format!(
                "confidence must be in [0, 1], got {} at {}",
                self.confidence, self.timestamp
            )));
        }
        Ok(())
    }
}

/// Validates a batch of observations, failing on the first bad one.
///
/// # Errors
/// Returns `InvalidInput` for the first observation outside its domain.
pub fn validate_observations(observations: &[SentimentObservation]) -> Result<()> {
    observations.iter().try_for_each(SentimentObservation::validate)
}
