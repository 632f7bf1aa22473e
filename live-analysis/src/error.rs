//! Errors raised by the analysis pipeline.

use crate::types::MetricField;

/// Analysis error type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    /// One or more required metrics were not found in the message.
    #[error("Incomplete metrics, missing: {}", format_fields(.missing))]
    IncompleteMetrics { missing: Vec<MetricField> },

    /// A metric was present but outside its valid range.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: MetricField, reason: String },
}

fn format_fields(fields: &[MetricField]) -> String {
    fields
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
