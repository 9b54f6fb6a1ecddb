//! Core types for sentiment/market analytics.
//!
//! Holds the data model shared by every engine, the error kinds they raise,
//! their configuration and the statistics they are built on.

pub mod config;
pub mod config_loader;
pub mod error;
pub mod market;
pub mod observation;
pub mod signal;
pub mod stats;

pub use config::{
    AlignmentConfig, AnalysisConfig, BacktestConfig, CorrelationConfig, CorrelationMethod,
    EmptyBucketPolicy, EventStudyConfig, EventThreshold, ImpactUnit, MarketChangeSource,
    SentimentAggregation, SentimentWeighting, SignalConfig, TriggerMode, WindowStat,
    MAX_SPAN_HOURS,
};
pub use config_loader::ConfigLoader;
pub use error::{AnalyticsError, Result};
pub use market::{derive_changes, ChangeHorizon, MarketObservation, MarketSeries};
pub use observation::{validate_observations, SentimentLabel, SentimentObservation};
pub use signal::{Direction, Signal};
pub use stats::TTest;
