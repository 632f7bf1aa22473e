//! Metric and analysis types.
//!
//! Data moves through these types in one direction:
//! [`PartialMetrics`] (whatever the message mentioned) →
//! [`ValidatedMetrics`] (all three present) → [`AnalysisResult`].

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

// ============================================================================
// Metric Fields
// ============================================================================

/// One of the three metrics a message has to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricField {
    /// Gross merchandise value (成交额)
    Gmv,
    /// Viewer count (观众数)
    Viewers,
    /// Order count (订单数)
    Orders,
}

impl MetricField {
    pub const ALL: [MetricField; 3] = [Self::Gmv, Self::Viewers, Self::Orders];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Gmv => "gmv",
            Self::Viewers => "viewers",
            Self::Orders => "orders",
        }
    }

    /// Label used in user-facing replies.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Gmv => "GMV",
            Self::Viewers => "观众数",
            Self::Orders => "订单数",
        }
    }
}

impl std::fmt::Display for MetricField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Partial / Validated Metrics
// ============================================================================

/// Metrics found in a message. `None` means the message did not mention the
/// field, which is different from a mentioned zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gmv: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewers: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orders: Option<u64>,
}

/// A complete, range-checked set of metrics.
///
/// Fields are private: the only ways in are [`ValidatedMetrics::new`] and
/// [`PartialMetrics::validate`], so analysis never sees a missing field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValidatedMetrics {
    gmv: f64,
    viewers: u64,
    orders: u64,
}

impl ValidatedMetrics {
    /// Build a validated record. GMV must be finite and non-negative.
    pub fn new(gmv: f64, viewers: u64, orders: u64) -> Result<Self, AnalysisError> {
        if !gmv.is_finite() {
            return Err(AnalysisError::InvalidValue {
                field: MetricField::Gmv,
                reason: "must be a finite number".to_string(),
            });
        }
        if gmv < 0.0 {
            return Err(AnalysisError::InvalidValue {
                field: MetricField::Gmv,
                reason: "must be non-negative".to_string(),
            });
        }
        Ok(Self {
            gmv,
            viewers,
            orders,
        })
    }

    pub fn gmv(&self) -> f64 {
        self.gmv
    }

    pub fn viewers(&self) -> u64 {
        self.viewers
    }

    pub fn orders(&self) -> u64 {
        self.orders
    }
}

impl From<ValidatedMetrics> for PartialMetrics {
    fn from(m: ValidatedMetrics) -> Self {
        Self {
            gmv: Some(m.gmv),
            viewers: Some(m.viewers),
            orders: Some(m.orders),
        }
    }
}

// ============================================================================
// Rating
// ============================================================================

/// Letter rating derived from the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rating {
    S,
    A,
    B,
    C,
}

impl Rating {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::S => "S",
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
        }
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Severity of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Needs immediate attention (严重)
    Severe,
    /// Below benchmark (待提升)
    Warning,
    /// Nothing flagged (良好)
    Positive,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Severe => write!(f, "严重"),
            Self::Warning => write!(f, "待提升"),
            Self::Positive => write!(f, "良好"),
        }
    }
}

/// A diagnosed problem (or, in reports, the positive placeholder).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub title: String,
    pub description: String,
    /// Metric line backing the issue, e.g. "转化率: 0.40%"
    pub metric: Option<String>,
}

// ============================================================================
// Analysis Result
// ============================================================================

/// The four capped sub-scores that make up the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub viewer_value: f64,
    pub conversion: f64,
    pub order_value: f64,
    pub gmv: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.viewer_value + self.conversion + self.order_value + self.gmv
    }
}

/// Everything derived from one set of metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub gmv: f64,
    pub viewers: u64,
    pub orders: u64,
    /// orders / viewers, as a fraction
    pub conversion_rate: f64,
    /// gmv / orders
    pub average_order_value: f64,
    /// gmv / viewers
    pub value_per_viewer: f64,
    pub breakdown: ScoreBreakdown,
    /// Composite score in [0, 100]
    pub score: f64,
    pub rating: Rating,
    pub issues: Vec<Issue>,
}
