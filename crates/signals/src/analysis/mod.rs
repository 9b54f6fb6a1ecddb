//! Statistical analysis of sentiment against market series.
//!
//! The aligner feeds both the correlation engine and the event study; all
//! three are stateless and can be called concurrently on separate inputs.

pub mod align;
pub mod correlation;
pub mod event_study;

pub use align::{align, AlignedBucket, AlignedSeries, TemporalAligner};
pub use correlation::{
    best_lag, CorrelationEngine, CorrelationResult, LagScan, StrengthBreakdown,
};
pub use event_study::{
    aggregate_by_label, BaselineComparison, DetectedEvent, EventRecord, EventStudy,
    EventStudyEngine, EventTrigger, LabelImpact,
};
