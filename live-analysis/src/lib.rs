//! Live Analysis - turns pasted live-stream numbers into a scored report.
//!
//! # Pipeline
//!
//! ```text
//! raw text ─ strip_mentions ─ extract ─▶ PartialMetrics
//!                                          │ validate
//!                                          ▼
//!                                   ValidatedMetrics ─ analyze ─▶ AnalysisResult
//!                                                                   │ format
//!                                                                   ▼
//!                                                                 Report
//! ```
//!
//! # Usage
//!
//! ```
//! use live_analysis::{AnalysisPipeline, PipelineOutcome};
//!
//! let pipeline = AnalysisPipeline::default();
//! match pipeline.run("GMV=1000, 观众=5000, 订单=50") {
//!     PipelineOutcome::Report(report) => assert_eq!(report.headline.orders, 50),
//!     PipelineOutcome::InsufficientData { missing, .. } => panic!("missing {missing:?}"),
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod analyzer;
pub mod error;
pub mod extractor;
pub mod pipeline;
pub mod report;
pub mod types;
pub mod validator;

pub use analyzer::MetricsAnalyzer;
pub use error::AnalysisError;
pub use extractor::{extract, strip_mentions};
pub use pipeline::{AnalysisPipeline, PipelineOutcome};
pub use report::{
    DerivedRatios, HeadlineMetrics, Insight, Recommendation, Report, ReportFormatter,
    ScoreSummary,
};
pub use types::{
    AnalysisResult, Issue, MetricField, PartialMetrics, Rating, ScoreBreakdown, Severity,
    ValidatedMetrics,
};
pub use validator::is_complete;
