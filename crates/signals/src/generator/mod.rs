//! Signal generators.
//!
//! Generators turn an observation stream into [`yieldsense_core::Signal`]s
//! with entry and exit prices unset; fills are the backtester's job.

pub mod sentiment_threshold;

pub use sentiment_threshold::{generate, signal_gaps, SentimentSignalGenerator, WindowAggregate};
