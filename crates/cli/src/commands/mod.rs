//! CLI commands for the sentiment analytics toolkit.

pub mod backtest;
pub mod common;
pub mod correlate;
pub mod event_study;
pub mod report;

pub use backtest::{run_backtest, BacktestArgs};
pub use correlate::{run_correlate, CorrelateArgs};
pub use event_study::{run_event_study, EventStudyArgs};
pub use report::{run_report, ReportArgs};
