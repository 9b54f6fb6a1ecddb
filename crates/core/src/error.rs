//! Error types for the analytics engines.
//!
//! Every engine fails synchronously with one of these kinds. Nothing is
//! retried internally; callers decide whether to re-query with different
//! windows or lags.

use thiserror::Error;

/// Errors raised by alignment, correlation, event-study, signal and
/// backtest computations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalyticsError {
    /// Fewer valid points than the requested statistic needs.
    #[error("insufficient data for {context}: need at least {required}, got {actual}")]
    InsufficientData {
        /// Minimum number of valid points required.
        required: usize,
        /// Number of valid points available.
        actual: usize,
        /// What was being computed.
        context: String,
    },

    /// A configuration value is outside its allowed domain.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A requested lag or window reaches beyond the supplied history.
    #[error("out of range: {0}")]
    OutOfRange(String),

    /// An input observation violates its domain (non-finite value,
    /// score outside [-1, 1], mixed instruments, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl AnalyticsError {
    /// Creates an insufficient-data error.
    pub fn insufficient_data(required: usize, actual: usize, context: impl Into<String>) -> Self {
        Self::InsufficientData {
            required,
            actual,
            context: context.into(),
        }
    }

    /// Creates an invalid-configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Creates an out-of-range error.
    pub fn out_of_range(message: impl Into<String>) -> Self {
        Self::OutOfRange(message.into())
    }

    /// Creates an invalid-input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Returns true for errors a caller can recover from by supplying more
    /// history or a shorter window.
    #[must_use]
    pub fn is_data_shortfall(&self) -> bool {
        matches!(self, Self::InsufficientData { .. } | Self::OutOfRange(_))
    }
}

/// Result alias used across the library crates.
pub type Result<T> = std::result::Result<T, AnalyticsError>;
