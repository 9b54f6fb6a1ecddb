//! Sentiment/market analysis engines and the sentiment signal generator.
//!
//! - [`analysis::TemporalAligner`] buckets sentiment against a lagged market series
//! - [`analysis::CorrelationEngine`] computes point, rolling and lag-scanned correlation
//! - [`analysis::EventStudyEngine`] measures market response around events
//! - [`generator::SentimentSignalGenerator`] turns sentiment into long/short signals

pub mod analysis;
pub mod generator;

pub use analysis::{
    aggregate_by_label, align, best_lag, AlignedBucket, AlignedSeries, BaselineComparison,
    CorrelationEngine, CorrelationResult, DetectedEvent, EventRecord, EventStudy,
    EventStudyEngine, EventTrigger, LabelImpact, LagScan, StrengthBreakdown, TemporalAligner,
};
pub use generator::{generate, SentimentSignalGenerator};
