//! End-to-end pipeline: raw message text in, report (or the list of missing
//! metrics) out.

use live_common::config::AnalysisConfig;

use crate::analyzer::MetricsAnalyzer;
use crate::error::AnalysisError;
use crate::extractor::{extract, strip_mentions};
use crate::report::{Report, ReportFormatter};
use crate::types::{MetricField, PartialMetrics};

/// What the pipeline produced for one message.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// All metrics found; the report is ready to render.
    Report(Box<Report>),
    /// The message is missing metrics; the caller should ask for them.
    InsufficientData {
        missing: Vec<MetricField>,
        partial: PartialMetrics,
    },
}

/// Stateless composition of extractor, validator, analyzer, and formatter.
#[derive(Debug, Clone, Default)]
pub struct AnalysisPipeline {
    analyzer: MetricsAnalyzer,
    formatter: ReportFormatter,
}

impl AnalysisPipeline {
    pub fn new(analyzer: MetricsAnalyzer, formatter: ReportFormatter) -> Self {
        Self {
            analyzer,
            formatter,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            MetricsAnalyzer::from_config(config),
            ReportFormatter::from_config(config),
        )
    }

    /// Run the whole pipeline on one message.
    pub fn run(&self, text: &str) -> PipelineOutcome {
        let cleaned = strip_mentions(text);
        self.run_partial(extract(&cleaned))
    }

    /// Run from already-extracted metrics (e.g. from an image extractor).
    pub fn run_partial(&self, partial: PartialMetrics) -> PipelineOutcome {
        match partial.validate() {
            Ok(metrics) => {
                let result = self.analyzer.analyze(&metrics);
                PipelineOutcome::Report(Box::new(self.formatter.format(&result)))
            }
            Err(AnalysisError::IncompleteMetrics { missing }) => {
                tracing::info!(?missing, "Message is missing metrics");
                PipelineOutcome::InsufficientData { missing, partial }
            }
            Err(e @ AnalysisError::InvalidValue { field, .. }) => {
                tracing::warn!(error = %e, "Metric rejected, treating as missing");
                PipelineOutcome::InsufficientData {
                    missing: vec![field],
                    partial,
                }
            }
        }
    }
}
